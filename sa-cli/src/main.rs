//! satrace
//!
//! Connects to one spectrum analyzer, fetches a single trace and prints it
//! as `frequency,amplitude` pairs, one per line.
//!
//! ```text
//! satrace -family:tek -address:/dev/ttyUSB0@1 -points:500 -op:max -out:trace.csv
//! ```
//!
//! Besides the acquisition options the binary understands `-list` (show
//! serial ports), `-sim` (use a simulated instrument), `-port:NAME` and
//! `-baud:N` (controller port), and `-save` (persist the controller settings).
//! Without a configured port the first GPIB controller found is used.

mod settings;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use sa_detect::{PortScanner, PrologixTransport};
use sa_engine::{AcquireOptions, InstrumentHandle, TraceBuffer};
use sa_protocol::{Dialect, Transport};
use sa_sim::{VirtualAnalyzer, VirtualReceiver};
use settings::Settings;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Instrument simulated by `-sim` when no dialect is forced
const SIMULATED_DIALECT: Dialect = Dialect::Hp8566;

/// Serial number of the simulated receiver
const SIMULATED_SERIAL: &str = "SIM0001";

/// Flags handled by the binary itself
#[derive(Debug, Default, PartialEq)]
struct CliFlags {
    list: bool,
    simulate: bool,
    save: bool,
    port: Option<String>,
    baud_rate: Option<u32>,
}

/// Separate binary flags from acquisition option tokens
fn split_args(args: &[String]) -> Result<(CliFlags, Vec<&str>)> {
    let mut flags = CliFlags::default();
    let mut tokens = Vec::new();

    for arg in args {
        match arg.split_once(':') {
            Some(("-port", port)) => flags.port = Some(port.to_string()),
            Some(("-baud", baud)) => {
                flags.baud_rate = Some(
                    baud.parse()
                        .with_context(|| format!("invalid baud rate {:?}", baud))?,
                )
            }
            _ => match arg.as_str() {
                "-list" => flags.list = true,
                "-sim" => flags.simulate = true,
                "-save" => flags.save = true,
                _ => tokens.push(arg.as_str()),
            },
        }
    }
    Ok((flags, tokens))
}

fn main() -> ExitCode {
    // stdout carries the trace, so logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "satrace=info,sa_protocol=info,sa_detect=info,sa_engine=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    match run() {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (flags, tokens) = split_args(&args)?;

    let mut settings = Settings::load();
    if let Some(port) = flags.port {
        settings.prologix.port = Some(port);
    }
    if let Some(baud_rate) = flags.baud_rate {
        settings.prologix.baud_rate = baud_rate;
    }
    if flags.save {
        let path = settings.save().map_err(anyhow::Error::msg)?;
        info!("Settings saved to {}", path.display());
    }

    if flags.list {
        list_ports()?;
        return Ok(ExitCode::SUCCESS);
    }

    let mut options = AcquireOptions::default();
    options
        .apply_tokens(settings.default_options.split_whitespace())
        .context("invalid default options in settings file")?;
    options.apply_tokens(tokens).context("invalid options")?;

    let trace = if flags.simulate {
        acquire_simulated(&mut options)?
    } else {
        discover_controller(&mut settings, &options.address)?;
        acquire(
            InstrumentHandle::startup(PrologixTransport::new(settings.prologix.clone())),
            &options,
        )?
    };

    if trace.is_empty() {
        error!("No trace points acquired");
        return Ok(ExitCode::FAILURE);
    }

    let trace = match options.resample_points {
        Some(points) => trace.resampled(points, options.resample_op),
        None => trace,
    };

    if let Some(peak) = trace.peak() {
        info!(
            "{} points, peak {:.2} dBm at {:.0} Hz (point {})",
            trace.len(),
            peak.dbm,
            peak.freq_hz,
            peak.index
        );
    }

    write_trace(&trace, options.output.as_deref())?;
    Ok(ExitCode::SUCCESS)
}

/// Connect, fetch one trace and hand the instrument back to local control
fn acquire<T: Transport>(
    mut handle: InstrumentHandle<T>,
    options: &AcquireOptions,
) -> Result<TraceBuffer> {
    handle.connect(options).context("connect failed")?;

    let trace = handle.fetch_trace();
    if let Some(message) = &handle.state().error {
        warn!("Fetch reported: {}", message);
    }
    if handle.reconnect_required() {
        warn!("Instrument setup changed during the fetch; run again to pick it up");
    }

    handle.shutdown();
    Ok(trace)
}

/// Use the first GPIB controller found when neither settings nor address name a port
fn discover_controller(settings: &mut Settings, address: &str) -> Result<()> {
    let names_port = !address.chars().all(|c| c.is_ascii_digit());
    if settings.prologix.port.is_some() || names_port {
        return Ok(());
    }

    match PortScanner::new()
        .find_controller()
        .context("cannot enumerate serial ports")?
    {
        Some(controller) => {
            info!("Using GPIB controller on {}", controller.port);
            settings.prologix.port = Some(controller.port);
        }
        None => warn!("No GPIB controller found; name its port with -port:NAME"),
    }
    Ok(())
}

fn acquire_simulated(options: &mut AcquireOptions) -> Result<TraceBuffer> {
    let dialect = options.dialect.unwrap_or(SIMULATED_DIALECT);
    options.family = dialect.family();
    info!("Simulating {}", dialect.name());

    let mut handle = InstrumentHandle::startup(VirtualAnalyzer::new(dialect));
    if dialect == Dialect::DirectReceiver {
        let serial = options
            .receiver_serial
            .clone()
            .unwrap_or_else(|| SIMULATED_SERIAL.to_string());
        handle.set_receiver_backend(Box::new(VirtualReceiver::new(serial)));
    }
    acquire(handle, options)
}

fn write_trace(trace: &TraceBuffer, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("cannot create {}", path.display()))?;
            let mut out = BufWriter::new(file);
            trace.write_pairs(&mut out)?;
            out.flush()?;
            info!("Trace written to {}", path.display());
        }
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            trace.write_pairs(&mut out)?;
            out.flush()?;
        }
    }
    Ok(())
}

fn list_ports() -> Result<()> {
    let ports = PortScanner::new()
        .enumerate_ports()
        .context("cannot enumerate serial ports")?;
    if ports.is_empty() {
        println!("No serial ports found");
    }

    for port in ports {
        let marker = if port.is_gpib_controller() { "*" } else { " " };
        let description = port
            .product
            .as_deref()
            .or(port.manufacturer.as_deref())
            .unwrap_or("");
        match (port.vid, port.pid) {
            (Some(vid), Some(pid)) => println!(
                "{} {} [{:04X}:{:04X}] {}",
                marker, port.port, vid, pid, description
            ),
            _ => println!("{} {} {}", marker, port.port, description),
        }
    }
    Ok(())
}
