//! Virtual spectrum analyzer
//!
//! Simulates one bus dialect end to end: it answers the dialect's identity
//! query, its configuration queries and its trace dump, encoding the trace
//! exactly the way the real instrument does. The displayed signal is a noise
//! floor with a single carrier, so decoded traces have a known peak.

use sa_protocol::{
    advantest, anritsu, hp, ieee488, scpi, tek, BlockFormat, ByteOrder, Dialect, Family,
    FrequencyQueries, LinkSettings, ScpiEncoding, ScpiFormat, Shape, Transport, TransportError,
};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Status byte bit set alongside the "done" bit when service is requested
const RQS: u8 = 0x40;

/// Configuration for creating a virtual analyzer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualAnalyzerConfig {
    /// Dialect to simulate
    pub dialect: Dialect,
    /// Identity reply (defaults to a typical reply for the dialect)
    pub id: Option<String>,
    /// Top-of-screen reference level
    pub reference_level_dbm: f64,
    /// Log scale
    pub db_per_division: f64,
    /// Sweep start
    pub start_hz: f64,
    /// Sweep stop
    pub stop_hz: f64,
    /// Trace points (defaults to the dialect's first allowed count)
    pub points: Option<usize>,
    /// Display in linear mode
    pub linear: bool,
    /// Number of scale reads answered with the "not yet valid" sentinel
    pub unsettled_scale_reads: u32,
    /// Serial polls after a trigger before the sweep reports done
    pub sweep_polls: u32,
    /// Carrier frequency
    pub signal_hz: f64,
    /// Carrier level
    pub signal_dbm: f64,
}

impl Default for VirtualAnalyzerConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::Hp8566,
            id: None,
            reference_level_dbm: -10.0,
            db_per_division: 10.0,
            start_hz: 1_000_000.0,
            stop_hz: 2_000_000.0,
            points: None,
            linear: false,
            unsettled_scale_reads: 0,
            sweep_polls: 2,
            signal_hz: 1_500_000.0,
            signal_dbm: -30.0,
        }
    }
}

/// Typical identity reply for a dialect
pub fn default_id(dialect: Dialect) -> &'static str {
    use Dialect::*;
    match dialect {
        Tek490 => "ID TEK/494AP,V2.10",
        Tek2710 => "ID TEK/2712,V1.1",
        Tek2780 => "ID TEK/2784,V3.0",
        Hp8566 => "HP8566B",
        Hp8560 => "HP8563E",
        Hp8590 => "HP8594E",
        Hp70000 => "HP70900A",
        Hp3585 => "HP3585B",
        Hp358x => "HP3589A",
        Hp8569b => "HP8569B",
        AdvantestR3261 => "R3261A",
        AdvantestR3265 => "R3265A",
        AdvantestR3267 => "R3267",
        AnritsuMs8604a => "ANRITSU,MS8604A,6200012345,1.00",
        AnritsuMs265x => "ANRITSU,MS2653B,6200054321,2.10",
        AnritsuMs266x => "ANRITSU,MS2663C,6200067890,2.30",
        Scpi => "Acme Instruments,SA-1000,0001,1.0",
        RsFse => "Rohde&Schwarz,FSEA 30,829715/007,3.50",
        RsFsu => "Rohde&Schwarz,FSU-26,200012/026,3.40",
        RsFsp => "Rohde&Schwarz,FSP-7,100000/007,4.2",
        AgilentE4406a => "Agilent Technologies,E4406A,US39440123,A.08.05",
        AgilentN9900 => "Keysight Technologies,N9912A,MY53101234,A.10.17",
        DirectReceiver => "",
    }
}

/// Pending reply to the last query
#[derive(Debug, Clone)]
enum Reply {
    Ascii(String),
    Binary(Vec<u8>),
}

fn ascii(text: impl Into<String>) -> Option<Reply> {
    Some(Reply::Ascii(text.into()))
}

/// A simulated analyzer on the bus
#[derive(Debug)]
pub struct VirtualAnalyzer {
    config: VirtualAnalyzerConfig,
    points: usize,
    scpi_format: Option<ScpiFormat>,
    open: bool,
    went_local: bool,
    pending: Option<Reply>,
    sent: Vec<String>,
    scale_reads: u32,
    polls_remaining: Option<u32>,
    sweeps: u32,
    corrupt_next: bool,
}

impl VirtualAnalyzer {
    /// Create a virtual analyzer with default settings
    pub fn new(dialect: Dialect) -> Self {
        Self::from_config(VirtualAnalyzerConfig {
            dialect,
            ..Default::default()
        })
    }

    /// Create a virtual analyzer from configuration
    pub fn from_config(config: VirtualAnalyzerConfig) -> Self {
        let caps = config.dialect.caps();
        let points = config
            .points
            .or_else(|| caps.point_counts.first().copied())
            .unwrap_or(401);
        // Instruments power up in big-endian (`:FORM:BORD NORM`)
        let scpi_format = match caps.shape {
            Shape::ScpiBlock(format) => Some(ScpiFormat {
                order: ByteOrder::BigEndian,
                ..format
            }),
            _ => None,
        };

        Self {
            config,
            points,
            scpi_format,
            open: false,
            went_local: false,
            pending: None,
            sent: Vec::new(),
            scale_reads: 0,
            polls_remaining: None,
            sweeps: 0,
            corrupt_next: false,
        }
    }

    /// Get the simulated dialect
    pub fn dialect(&self) -> Dialect {
        self.config.dialect
    }

    /// Get the configuration
    pub fn config(&self) -> &VirtualAnalyzerConfig {
        &self.config
    }

    /// Switch the display between linear and log
    pub fn set_linear(&mut self, linear: bool) {
        self.config.linear = linear;
    }

    /// Change the reference level
    pub fn set_reference_level(&mut self, dbm: f64) {
        self.config.reference_level_dbm = dbm;
    }

    /// Change the trace point count
    pub fn set_points(&mut self, points: usize) {
        self.points = points;
    }

    /// Corrupt one byte of the next trace dump
    pub fn corrupt_next_trace(&mut self) {
        self.corrupt_next = true;
    }

    /// Number of sweeps triggered so far
    pub fn sweeps(&self) -> u32 {
        self.sweeps
    }

    /// Every command written, in order
    pub fn sent(&self) -> &[String] {
        &self.sent
    }

    /// Whether the link is open
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Whether the last close returned the instrument to local control
    pub fn went_local(&self) -> bool {
        self.went_local
    }

    /// Current trace point count
    pub fn points(&self) -> usize {
        self.points
    }

    fn division_count(&self) -> f64 {
        f64::from(self.config.dialect.caps().division_count)
    }

    fn bottom_dbm(&self) -> f64 {
        self.config.reference_level_dbm - self.config.db_per_division * self.division_count()
    }

    fn center_hz(&self) -> f64 {
        (self.config.start_hz + self.config.stop_hz) / 2.0
    }

    fn span_hz(&self) -> f64 {
        self.config.stop_hz - self.config.start_hz
    }

    fn rbw_hz(&self) -> f64 {
        (self.span_hz() / 100.0).max(10.0)
    }

    fn sweep_seconds(&self) -> f64 {
        self.points as f64 * 1e-4
    }

    /// The displayed trace in dBm, before instrument encoding
    pub fn trace(&self) -> Vec<f64> {
        let n = self.points;
        let floor = self.bottom_dbm()
            + 0.2 * self.config.db_per_division * self.division_count();
        let width = self.span_hz() / 50.0;

        (0..n)
            .map(|i| {
                let f = self.config.start_hz + (i as f64 + 0.5) * self.span_hz() / n as f64;
                let x = (f - self.config.signal_hz) / width;
                let ripple = ((i * 7919) % 11) as f64 * 0.2;
                (floor + ripple)
                    .max(self.config.signal_dbm - 3.0 * x * x)
                    .clamp(self.bottom_dbm(), self.config.reference_level_dbm)
            })
            .collect()
    }

    fn preamble(&self) -> tek::WfmPreamble {
        tek::WfmPreamble {
            point_count: self.points,
            point_offset: 0.0,
            x_increment: self.span_hz() / self.points as f64,
            gain: self.config.db_per_division * self.division_count() / 250.0,
            cal_offset: 250.0,
            zero_ref: self.config.reference_level_dbm,
        }
    }

    fn curve(&mut self) -> Vec<u8> {
        let pre = self.preamble();
        let raw: Vec<u8> = self
            .trace()
            .iter()
            .map(|v| (pre.cal_offset + (v - pre.zero_ref) / pre.gain).round().clamp(0.0, 255.0) as u8)
            .collect();

        let mut block = tek::encode_curve(&raw);
        if std::mem::take(&mut self.corrupt_next) {
            let first_sample = tek::CURVE_ECHO.len() + 2;
            block[first_sample] ^= 0x01;
        }
        block
    }

    fn fixed_block(&mut self, format: BlockFormat) -> Vec<u8> {
        let (min, max) = (self.bottom_dbm(), self.config.reference_level_dbm);
        let codes: Vec<u16> = self
            .trace()
            .iter()
            .map(|&v| format.code_for(v, min, max))
            .collect();

        let mut block = format.encode(&codes);
        if std::mem::take(&mut self.corrupt_next) {
            block.pop();
        }
        block
    }

    fn ieee_block(&mut self, format: ScpiFormat) -> Vec<u8> {
        let data = ieee488::encode_samples(&self.trace(), format);
        let mut block = ieee488::encode_block(&data);
        if std::mem::take(&mut self.corrupt_next) {
            block[1] = b'x';
        }
        block
    }

    fn trace_dump(&mut self) -> Option<Reply> {
        let block = match self.config.dialect.caps().shape {
            Shape::CachedPreamble => self.curve(),
            Shape::FixedBlock(format) | Shape::SerialPollGated { block: format, .. } => {
                self.fixed_block(format)
            }
            Shape::ScpiBlock(_) => {
                let format = self.scpi_format?;
                self.ieee_block(format)
            }
            Shape::DirectReceiver => return None,
        };
        Some(Reply::Binary(block))
    }

    fn trigger(&mut self) {
        self.sweeps += 1;
        self.polls_remaining = Some(self.config.sweep_polls);
    }

    fn frequency(&self, queries: FrequencyQueries, command: &str) -> Option<Reply> {
        let value = match queries {
            FrequencyQueries::StartStop { start, stop } => match command {
                c if c == start => self.config.start_hz,
                c if c == stop => self.config.stop_hz,
                _ => return None,
            },
            FrequencyQueries::CenterSpan { center, span } => match command {
                c if c == center => self.center_hz(),
                c if c == span => self.span_hz(),
                _ => return None,
            },
        };
        ascii(value.to_string())
    }

    fn respond(&mut self, command: &str) -> Option<Reply> {
        let dialect = self.config.dialect;
        if dialect.identity_query() == Some(command) {
            return ascii(self.config.id.as_deref().unwrap_or(default_id(dialect)));
        }

        match dialect.family() {
            Family::Tektronix => self.respond_tek(command),
            Family::HewlettPackard => self.respond_hp(command),
            Family::Advantest => self.respond_advantest(command),
            Family::Anritsu => self.respond_anritsu(command),
            Family::Scpi => self.respond_scpi(command),
            Family::DirectDigital => None,
        }
    }

    fn respond_tek(&mut self, command: &str) -> Option<Reply> {
        match command {
            tek::SINGLE_SWEEP => {
                self.trigger();
                None
            }
            tek::REFERENCE_LEVEL => ascii(format!("REFLVL {}", self.config.reference_level_dbm)),
            tek::VERTICAL_DISPLAY if self.config.linear => ascii("VRTDSP LIN"),
            tek::VERTICAL_DISPLAY => ascii(format!("VRTDSP LOG:{}", self.config.db_per_division)),
            tek::CENTER => ascii(format!("FREQ {:E}", self.center_hz())),
            tek::SPAN => ascii(format!(
                "SPAN {:E}",
                self.span_hz() / tek::HORIZONTAL_DIVISIONS
            )),
            tek::RBW => ascii(format!("RESBW {:E}", self.rbw_hz())),
            tek::VBW => ascii(format!("VIDFLT {:E}", self.rbw_hz())),
            tek::ATTENUATION => ascii("RFATT 10"),
            tek::PREAMBLE_QUERY => ascii(self.preamble().to_reply()),
            tek::CURVE_QUERY => self.trace_dump(),
            _ => None,
        }
    }

    fn respond_hp(&mut self, command: &str) -> Option<Reply> {
        let g = hp::grammar(self.config.dialect)?;
        let rbw = self.rbw_hz();

        if command == g.take_sweep || command == g.single_sweep {
            if command == g.take_sweep {
                self.trigger();
            }
            return None;
        }
        if command == g.trace_dump {
            return self.trace_dump();
        }
        if command == g.reference_level {
            return ascii(self.config.reference_level_dbm.to_string());
        }
        if command == g.log_scale {
            return match self.config.linear {
                true => ascii("0"),
                false => ascii(self.config.db_per_division.to_string()),
            };
        }
        if let Some(reply) = self.frequency(g.frequency, command) {
            return Some(reply);
        }

        let value = match Some(command) {
            c if c == g.rbw => rbw,
            c if c == g.vbw => rbw,
            c if c == g.sweep_time => self.sweep_seconds(),
            c if c == g.video_average => 0.0,
            c if c == g.attenuation => 10.0,
            _ => return None,
        };
        ascii(value.to_string())
    }

    fn respond_advantest(&mut self, command: &str) -> Option<Reply> {
        if let Some(points) = command.strip_prefix("TPN ") {
            if let Ok(points) = points.trim().parse() {
                self.points = points;
            }
            return None;
        }

        let value = match command {
            advantest::TAKE_SWEEP => {
                self.trigger();
                return None;
            }
            advantest::TRACE_DUMP => return self.trace_dump(),
            advantest::DB_PER_DIV => {
                if self.config.linear || self.scale_reads < self.config.unsettled_scale_reads {
                    self.scale_reads += 1;
                    advantest::DB_PER_DIV_NOT_VALID
                } else {
                    self.config.db_per_division
                }
            }
            advantest::REFERENCE_LEVEL => self.config.reference_level_dbm,
            advantest::START => self.config.start_hz,
            advantest::STOP => self.config.stop_hz,
            advantest::RBW | advantest::VBW => self.rbw_hz(),
            advantest::SWEEP_TIME => self.sweep_seconds(),
            advantest::ATTENUATION => 10.0,
            advantest::POINTS => self.points as f64,
            _ => return None,
        };
        ascii(value.to_string())
    }

    fn respond_anritsu(&mut self, command: &str) -> Option<Reply> {
        if command == anritsu::trace_dump(self.points) {
            return self.trace_dump();
        }

        let value = match command {
            anritsu::TAKE_SWEEP => {
                self.trigger();
                return None;
            }
            scpi::OPERATION_COMPLETE => return ascii("1"),
            anritsu::SCALE if self.config.linear => return ascii("LIN"),
            anritsu::SCALE => self.config.db_per_division,
            anritsu::REFERENCE_LEVEL => self.config.reference_level_dbm,
            anritsu::START => self.config.start_hz,
            anritsu::STOP => self.config.stop_hz,
            anritsu::RBW | anritsu::VBW => self.rbw_hz(),
            anritsu::SWEEP_TIME => self.sweep_seconds(),
            anritsu::ATTENUATION => 10.0,
            anritsu::AVERAGE => 0.0,
            anritsu::POINTS => self.points as f64,
            _ => return None,
        };
        ascii(value.to_string())
    }

    fn respond_scpi(&mut self, command: &str) -> Option<Reply> {
        let g = scpi::grammar(self.config.dialect)?;

        match command {
            scpi::TAKE_SWEEP => {
                self.trigger();
                return None;
            }
            scpi::OPERATION_COMPLETE => return ascii("1"),
            ":FORM REAL,32" | ":FORM INT,32" | ":FORM:BORD SWAP" | ":FORM:BORD NORM" => {
                if let Some(format) = self.scpi_format.as_mut() {
                    match command {
                        ":FORM REAL,32" => format.encoding = ScpiEncoding::Real32,
                        ":FORM INT,32" => format.encoding = ScpiEncoding::Int32Milli,
                        ":FORM:BORD SWAP" => format.order = ByteOrder::LittleEndian,
                        _ => format.order = ByteOrder::BigEndian,
                    }
                }
                return None;
            }
            _ => {}
        }

        if command == g.trace_query {
            return self.trace_dump();
        }
        if command == g.reference_level {
            return ascii(format!("{:E}", self.config.reference_level_dbm));
        }
        if g.spacing == Some(command) {
            return ascii(if self.config.linear { "LIN" } else { "LOG" });
        }
        match g.scale {
            scpi::ScaleQuery::PerDivision(q) if q == command => {
                return ascii(format!("{:E}", self.config.db_per_division))
            }
            scpi::ScaleQuery::FullRange(q) if q == command => {
                return ascii(format!(
                    "{:E}",
                    self.config.db_per_division * self.division_count()
                ))
            }
            _ => {}
        }
        if let Some(reply) = self.frequency(g.frequency, command) {
            return Some(reply);
        }

        let value = match Some(command) {
            c if c == g.points => self.points as f64,
            c if c == Some(g.rbw) => self.rbw_hz(),
            c if c == g.vbw => self.rbw_hz(),
            c if c == g.sweep_time => self.sweep_seconds(),
            c if c == g.average => 0.0,
            c if c == g.attenuation => 10.0,
            _ => return None,
        };
        ascii(format!("{:E}", value))
    }
}

impl Transport for VirtualAnalyzer {
    fn open(&mut self, _settings: &LinkSettings) -> Result<(), TransportError> {
        self.open = true;
        self.went_local = false;
        self.pending = None;
        Ok(())
    }

    fn close(&mut self, go_to_local: bool) {
        self.open = false;
        self.went_local = go_to_local;
        self.pending = None;
    }

    fn write(&mut self, command: &str) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::NotOpen);
        }
        trace!("{} <- {}", self.config.dialect.name(), command);
        self.sent.push(command.to_string());
        self.pending = self.respond(command.trim());
        Ok(())
    }

    fn read_ascii(&mut self, max_len: usize) -> Result<String, TransportError> {
        if !self.open {
            return Err(TransportError::NotOpen);
        }
        match self.pending.take() {
            Some(Reply::Ascii(mut text)) => {
                text.push('\n');
                text.truncate(max_len);
                Ok(text)
            }
            Some(Reply::Binary(data)) => Ok(String::from_utf8_lossy(&data).into_owned()),
            None => Err(TransportError::Timeout("read".into())),
        }
    }

    fn read_binary(&mut self, max_len: usize) -> Result<Vec<u8>, TransportError> {
        if !self.open {
            return Err(TransportError::NotOpen);
        }
        match self.pending.take() {
            Some(Reply::Binary(mut data)) => {
                data.truncate(max_len);
                Ok(data)
            }
            Some(Reply::Ascii(text)) => Ok(text.into_bytes()),
            None => Err(TransportError::Timeout("binary read".into())),
        }
    }

    fn serial_poll(&mut self) -> Result<u8, TransportError> {
        if !self.open {
            return Err(TransportError::NotOpen);
        }
        let done_mask = match self.config.dialect.caps().shape {
            Shape::SerialPollGated { done_mask, .. } => done_mask,
            _ => 0,
        };

        Ok(match self.polls_remaining {
            Some(0) => done_mask | RQS,
            Some(n) => {
                self.polls_remaining = Some(n - 1);
                0
            }
            None => 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_protocol::dialect::ALL_DIALECTS;
    use sa_protocol::InstrumentDatabase;

    fn opened(dialect: Dialect) -> VirtualAnalyzer {
        let mut analyzer = VirtualAnalyzer::new(dialect);
        analyzer.open(&LinkSettings::default()).unwrap();
        analyzer
    }

    #[test]
    fn test_default_ids_identify_their_dialect() {
        for &dialect in ALL_DIALECTS {
            if dialect.family() == Family::DirectDigital {
                continue;
            }
            let found = InstrumentDatabase::identify(dialect.family(), default_id(dialect));
            assert_eq!(found, Some(dialect), "{:?}", dialect);
        }
    }

    #[test]
    fn test_identity_query() {
        let mut analyzer = opened(Dialect::RsFsu);
        assert!(analyzer.query("*IDN?").unwrap().contains("FSU-26"));
        // Legacy query is not understood
        assert!(analyzer.query("ID?").is_err());
    }

    #[test]
    fn test_tek_curve_is_valid() {
        let mut analyzer = opened(Dialect::Tek2710);
        analyzer.write(tek::CURVE_QUERY).unwrap();
        let block = analyzer.read_binary(tek::MAX_CURVE_LEN).unwrap();
        assert_eq!(tek::parse_curve(&block).unwrap().len(), 512);
    }

    #[test]
    fn test_corrupted_curve_fails_checksum() {
        let mut analyzer = opened(Dialect::Tek490);
        analyzer.corrupt_next_trace();
        analyzer.write(tek::CURVE_QUERY).unwrap();
        let block = analyzer.read_binary(tek::MAX_CURVE_LEN).unwrap();
        assert!(tek::parse_curve(&block).is_err());
    }

    #[test]
    fn test_serial_poll_completes_after_trigger() {
        let mut analyzer = opened(Dialect::Hp3585);
        assert_eq!(analyzer.serial_poll().unwrap(), 0);
        analyzer.write("S2").unwrap();
        assert_eq!(analyzer.serial_poll().unwrap(), 0);
        assert_eq!(analyzer.serial_poll().unwrap(), 0);
        assert_eq!(analyzer.serial_poll().unwrap() & 0x04, 0x04);
    }

    #[test]
    fn test_advantest_sentinel() {
        let mut analyzer = VirtualAnalyzer::from_config(VirtualAnalyzerConfig {
            dialect: Dialect::AdvantestR3261,
            unsettled_scale_reads: 2,
            ..Default::default()
        });
        analyzer.open(&LinkSettings::default()).unwrap();
        let replies: Vec<String> = (0..3)
            .map(|_| analyzer.query("DD?").unwrap().trim().to_string())
            .collect();
        assert_eq!(replies, ["10000", "10000", "10"]);
    }

    #[test]
    fn test_scpi_byte_order_follows_commands() {
        let mut analyzer = opened(Dialect::RsFsu);
        analyzer.write(":FORM:BORD SWAP").unwrap();
        analyzer.write(":TRAC? TRACE1").unwrap();
        let block = analyzer.read_binary(100_000).unwrap();
        let data = ieee488::block_data(&block).unwrap();
        let format = scpi::block_format(Dialect::RsFsu).unwrap();
        let values = ieee488::decode_samples(data, format).unwrap();
        assert_eq!(values.len(), 625);
        let expected = analyzer.trace();
        assert!((values[0] - expected[0]).abs() < 1e-4);
    }

    #[test]
    fn test_trace_peaks_at_signal() {
        let analyzer = VirtualAnalyzer::new(Dialect::Hp8566);
        let trace = analyzer.trace();
        let (peak, _) = trace
            .iter()
            .enumerate()
            .fold((0, f64::MIN), |best, (i, &v)| if v > best.1 { (i, v) } else { best });
        assert_eq!(peak, 500);
        assert!(trace.iter().all(|&v| (-110.0..=-10.0).contains(&v)));
    }
}
