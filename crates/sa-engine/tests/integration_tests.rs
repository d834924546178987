//! Integration tests for the acquisition engine
//!
//! These tests drive `InstrumentHandle` against simulated instruments:
//! - Connect, identification and dialect bypass
//! - Configuration failures (linear display, zero span, unknown identity)
//! - One fetch per dialect, checked against the simulated carrier
//! - Protocol violations, timeouts and cancellation during fetch
//! - The self-configuring receiver

use std::thread;
use std::time::{Duration, Instant};

use sa_engine::{
    parse_options, resample, AcquireError, AcquireOptions, ConnectionState, ErrorClass,
    InstrumentHandle, ResampleOp,
};
use sa_protocol::dialect::ALL_DIALECTS;
use sa_protocol::tek::{self, WfmPreamble};
use sa_protocol::{BlockFormat, Dialect, Family, ProtocolError};
use sa_sim::{ScriptedTransport, VirtualAnalyzer, VirtualAnalyzerConfig, VirtualReceiver};

// ============================================================================
// Helper Functions
// ============================================================================

mod helpers {
    use super::*;

    /// Parse options and shorten every loop so failures surface quickly
    pub fn fast(text: &str) -> AcquireOptions {
        let mut options = parse_options(text).unwrap();
        options.timing.poll_interval_ms = 1;
        options.timing.settle_timeout_ms = 100;
        options.timing.identify_timeout_ms = 100;
        options.timing.sweep_timeout_ms = 2_000;
        options
    }

    /// Connected handle around a default virtual analyzer, identified by family
    pub fn connected(dialect: Dialect) -> InstrumentHandle<VirtualAnalyzer> {
        connected_with(VirtualAnalyzerConfig {
            dialect,
            ..Default::default()
        })
    }

    /// Connected handle around a configured virtual analyzer
    pub fn connected_with(config: VirtualAnalyzerConfig) -> InstrumentHandle<VirtualAnalyzer> {
        let family = config.dialect.family();
        let mut handle = InstrumentHandle::startup(VirtualAnalyzer::from_config(config));
        let mut options = fast("");
        options.family = family;
        handle.connect(&options).unwrap();
        handle
    }

    /// Script answering the four queries of an HP 8566 connect
    pub fn hp8566_script() -> ScriptedTransport {
        ScriptedTransport::new()
            .reply("RL?", "-10")
            .reply("LG?", "10")
            .reply("FA?", "1000000")
            .reply("FB?", "2000000")
    }
}

use helpers::*;

// ============================================================================
// Connect Tests
// ============================================================================

mod connect_tests {
    use super::*;

    #[test]
    fn scripted_hp8566_geometry() {
        let mut handle = InstrumentHandle::startup(hp8566_script());
        handle.connect(&fast("-hp8566")).unwrap();

        let state = handle.state();
        assert_eq!(state.connection, ConnectionState::Ready);
        assert_eq!(state.dialect, Some(Dialect::Hp8566));
        assert_eq!(state.min_hz, 1e6);
        assert_eq!(state.max_hz, 2e6);
        assert_eq!(state.center_hz, 1.5e6);
        assert_eq!(state.max_dbm, -10.0);
        assert_eq!(state.db_per_division, 10.0);
        assert_eq!(state.division_count, 10);
        assert_eq!(state.min_dbm, -110.0);
        assert_eq!(state.trace_point_count, 1001);
        assert!(!state.has_error());
    }

    #[test]
    fn unanswered_optional_readbacks_are_absent() {
        let mut handle = InstrumentHandle::startup(hp8566_script().reply("RB?", "3000"));
        handle.connect(&fast("-hp8566")).unwrap();

        let state = handle.state();
        assert_eq!(state.rbw_hz, Some(3000.0));
        assert_eq!(state.vbw_hz, None);
        assert_eq!(state.sweep_seconds, None);
        assert_eq!(state.rf_atten_db, None);
    }

    #[test]
    fn forced_dialect_skips_identification() {
        let mut handle = InstrumentHandle::startup(hp8566_script());
        handle.connect(&fast("-hp8566")).unwrap();
        assert!(!handle.transport().was_sent("ID?"));
        assert!(!handle.transport().was_sent("*IDN?"));
    }

    #[test]
    fn legacy_family_sends_only_id_query() {
        let mut handle = InstrumentHandle::startup(hp8566_script().reply("ID?", "HP8566B"));
        handle.connect(&fast("-family:hp")).unwrap();

        let transport = handle.transport();
        let id_queries = transport.sent().iter().filter(|c| *c == "ID?").count();
        assert_eq!(id_queries, 1);
        assert!(!transport.was_sent("*IDN?"));
        assert_eq!(handle.state().id, "HP8566B");
        assert_eq!(handle.state().dialect, Some(Dialect::Hp8566));
    }

    #[test]
    fn scpi_family_sends_only_idn_query() {
        let handle = connected(Dialect::RsFsu);
        let sent = handle.transport().sent();
        assert!(sent.iter().any(|c| c == "*IDN?"));
        assert!(!sent.iter().any(|c| c == "ID?"));
        assert_eq!(handle.state().dialect, Some(Dialect::RsFsu));
    }

    #[test]
    fn short_replies_are_discarded() {
        let script = hp8566_script().replies("ID?", &["", "?", "HP8566B"]);
        let mut handle = InstrumentHandle::startup(script);
        handle.connect(&fast("-family:hp")).unwrap();

        let id_queries = handle.transport().sent().iter().filter(|c| *c == "ID?").count();
        assert_eq!(id_queries, 3);
    }

    #[test]
    fn offsets_are_applied() {
        let mut handle = InstrumentHandle::startup(VirtualAnalyzer::new(Dialect::Hp8566));
        handle
            .connect(&fast("-family:hp -freq_offset:1000 -ampl_offset:2"))
            .unwrap();

        let state = handle.state();
        assert_eq!(state.min_hz, 1_001_000.0);
        assert_eq!(state.max_hz, 2_001_000.0);
        assert_eq!(state.max_dbm, -8.0);
        assert_eq!(state.min_dbm, -108.0);

        let peak = handle.fetch_trace().peak().unwrap();
        assert!((peak.dbm + 28.0).abs() < 0.5, "peak {}", peak.dbm);
        assert!((peak.freq_hz - 1_501_000.0).abs() < 5_000.0);
    }

    #[test]
    fn advantest_waits_for_valid_scale() {
        let handle = connected_with(VirtualAnalyzerConfig {
            dialect: Dialect::AdvantestR3261,
            unsettled_scale_reads: 3,
            ..Default::default()
        });
        assert_eq!(handle.state().db_per_division, 10.0);
        let reads = handle
            .transport()
            .sent()
            .iter()
            .filter(|c| *c == "DD?")
            .count();
        assert_eq!(reads, 4);
    }

    #[test]
    fn reconnect_replaces_previous_connection() {
        let mut handle = connected(Dialect::Hp8560);
        handle.connect(&fast("-family:hp")).unwrap();
        assert!(handle.is_ready());
        assert_eq!(handle.state().trace_point_count, 601);
    }

    #[test]
    fn reconnect_reads_back_the_new_display() {
        let mut handle = connected(Dialect::Hp8560);
        assert_eq!(handle.state().max_dbm, -10.0);

        handle.transport_mut().set_reference_level(-20.0);
        handle.connect(&fast("-family:hp")).unwrap();
        assert_eq!(handle.state().max_dbm, -20.0);
        assert_eq!(handle.state().min_dbm, -120.0);

        handle.transport_mut().set_linear(true);
        let err = handle.connect(&fast("-family:hp")).unwrap_err();
        assert!(matches!(err, AcquireError::LinearDisplay(_)));
        assert!(!handle.is_ready());
        assert!(handle.fetch_trace().is_empty());
    }
}

// ============================================================================
// Connect Failure Tests
// ============================================================================

mod failure_tests {
    use super::*;

    fn assert_failed<T: sa_protocol::Transport>(handle: &InstrumentHandle<T>) {
        let state = handle.state();
        assert_eq!(state.connection, ConnectionState::Failed);
        assert!(state.has_error());
    }

    #[test]
    fn linear_display_fails_and_goes_local() {
        for dialect in [
            Dialect::Hp8560,
            Dialect::Tek2780,
            Dialect::AnritsuMs266x,
            Dialect::Scpi,
            Dialect::AdvantestR3265,
        ] {
            let mut handle = InstrumentHandle::startup(VirtualAnalyzer::from_config(
                VirtualAnalyzerConfig {
                    dialect,
                    linear: true,
                    ..Default::default()
                },
            ));
            let mut options = fast("");
            options.family = dialect.family();

            let err = handle.connect(&options).unwrap_err();
            assert!(
                matches!(err, AcquireError::LinearDisplay(_)),
                "{:?}: {}",
                dialect,
                err
            );
            assert_failed(&handle);
            assert!(handle.transport().went_local());
            assert!(!handle.transport().is_open());
        }
    }

    #[test]
    fn zero_span_fails() {
        let mut handle = InstrumentHandle::startup(VirtualAnalyzer::from_config(
            VirtualAnalyzerConfig {
                start_hz: 1e6,
                stop_hz: 1e6,
                ..Default::default()
            },
        ));
        let err = handle.connect(&fast("-family:hp")).unwrap_err();
        assert!(matches!(err, AcquireError::ZeroSpan { .. }));
        assert_failed(&handle);
        assert!(handle.state().error.as_deref().unwrap().contains("zero span"));
    }

    #[test]
    fn non_finite_frequency_is_never_accepted() {
        let script = ScriptedTransport::new()
            .reply("RL?", "-10")
            .reply("LG?", "10")
            .reply("FA?", "1000000")
            .reply("FB?", "nan");
        let mut handle = InstrumentHandle::startup(script);

        let err = handle.connect(&fast("-hp8566")).unwrap_err();
        assert!(matches!(err, AcquireError::SettleTimeout { .. }), "{}", err);
        assert_failed(&handle);
        assert!(!handle.state().max_hz.is_nan());
    }

    #[test]
    fn non_finite_receiver_span_fails() {
        let mut handle = InstrumentHandle::startup(ScriptedTransport::new())
            .with_receiver(Box::new(VirtualReceiver::new("R1")));
        let err = handle.connect(&fast("-ddr -span:nan")).unwrap_err();
        assert!(matches!(err, AcquireError::ZeroSpan { .. }), "{}", err);
        assert_failed(&handle);
    }

    #[test]
    fn absurd_point_count_fails_the_connect() {
        let script = ScriptedTransport::new()
            .reply(":DISP:WIND:TRAC:Y:SPAC?", "LOG")
            .reply(":DISP:WIND:TRAC:Y:RLEV?", "-10")
            .reply(":DISP:WIND:TRAC:Y:PDIV?", "10")
            .reply(":FREQ:STAR?", "1000000")
            .reply(":FREQ:STOP?", "2000000")
            .reply(":SWE:POIN?", "1e19");
        let mut handle = InstrumentHandle::startup(script);

        let err = handle.connect(&fast("-scpi")).unwrap_err();
        assert!(matches!(err, AcquireError::UnsupportedPointCount(_)), "{}", err);
        assert_failed(&handle);
        assert!(handle.fetch_trace().is_empty());
    }

    #[test]
    fn oversized_receiver_fft_fails() {
        let mut handle = InstrumentHandle::startup(ScriptedTransport::new())
            .with_receiver(Box::new(VirtualReceiver::new("R1")));
        let err = handle.connect(&fast("-ddr -fft:2000000")).unwrap_err();
        assert!(matches!(
            err,
            AcquireError::UnsupportedPointCount(2_000_000)
        ));
        assert_failed(&handle);
    }

    #[test]
    fn unrecognized_identity_fails() {
        let mut handle =
            InstrumentHandle::startup(ScriptedTransport::new().reply("ID?", "XYZ9000"));
        let err = handle.connect(&fast("-family:hp")).unwrap_err();
        assert!(matches!(err, AcquireError::Identify(_)));
        assert_failed(&handle);
        assert!(handle.transport().went_local());
    }

    #[test]
    fn silent_instrument_times_out() {
        let mut handle = InstrumentHandle::startup(ScriptedTransport::new().strict());
        let err = handle.connect(&fast("-family:tek")).unwrap_err();
        assert!(matches!(err, AcquireError::Identify(_)));
        assert_failed(&handle);
    }

    #[test]
    fn fetch_requires_ready() {
        let mut handle = InstrumentHandle::startup(ScriptedTransport::new());
        assert!(matches!(
            handle.try_fetch_trace(),
            Err(AcquireError::NotReady(ConnectionState::Disconnected))
        ));
        assert!(handle.fetch_trace().is_empty());
    }

    #[test]
    fn receiver_dialect_without_backend_fails() {
        let mut handle = InstrumentHandle::startup(ScriptedTransport::new());
        let err = handle.connect(&fast("-ddr")).unwrap_err();
        assert!(matches!(err, AcquireError::NoReceiver));
        assert_failed(&handle);
        assert!(handle.transport().sent().is_empty());
    }
}

// ============================================================================
// Fetch Tests
// ============================================================================

mod fetch_tests {
    use super::*;

    #[test]
    fn every_bus_dialect_fetches_the_carrier() {
        for &dialect in ALL_DIALECTS {
            if dialect.family() == Family::DirectDigital {
                continue;
            }
            let mut handle = connected(dialect);
            assert_eq!(handle.state().dialect, Some(dialect));

            let points = handle.state().trace_point_count;
            let trace = handle.fetch_trace();
            assert_eq!(trace.len(), points, "{:?}", dialect);
            assert!(!handle.state().has_error(), "{:?}", handle.state().error);

            let peak = trace.peak().unwrap();
            assert!(
                (peak.freq_hz - 1.5e6).abs() < 20_000.0,
                "{:?} peak at {} Hz",
                dialect,
                peak.freq_hz
            );
            assert!(
                (peak.dbm + 30.0).abs() < 1.0,
                "{:?} peak {} dBm",
                dialect,
                peak.dbm
            );
            // The 3585 also sweeps when single-sweep mode is selected
            let expected_sweeps = if dialect == Dialect::Hp3585 { 2 } else { 1 };
            assert_eq!(handle.transport().sweeps(), expected_sweeps, "{:?}", dialect);
        }
    }

    #[test]
    fn frequencies_use_bucket_centers() {
        let mut handle = connected(Dialect::Hp8590);
        let trace = handle.fetch_trace();
        let freqs: Vec<f64> = trace.points().map(|(f, _)| f).collect();
        let step = 1e6 / 401.0;
        assert!((freqs[0] - (1e6 + step / 2.0)).abs() < 1e-6);
        assert!(freqs.windows(2).all(|w| w[0] < w[1]));
        assert!(*freqs.last().unwrap() < 2e6);
    }

    #[test]
    fn selectable_point_count_is_read_back() {
        let handle = connected_with(VirtualAnalyzerConfig {
            dialect: Dialect::AnritsuMs265x,
            points: Some(1002),
            ..Default::default()
        });
        assert_eq!(handle.state().trace_point_count, 1002);
    }

    #[test]
    fn corrupted_tek_curve_yields_no_points() {
        let mut handle = connected(Dialect::Tek490);
        assert_eq!(handle.fetch_trace().len(), 1000);

        handle.transport_mut().corrupt_next_trace();
        let trace = handle.fetch_trace();
        assert!(trace.is_empty());
        assert_eq!(handle.state().trace_point_count, 0);
        assert!(handle.state().has_error());
        assert!(handle.state().error.as_deref().unwrap().contains("checksum"));
        assert!(handle.is_ready());

        // The next sweep is unaffected
        assert_eq!(handle.fetch_trace().len(), 1000);
        assert_eq!(handle.state().trace_point_count, 1000);
        assert!(!handle.state().has_error());
    }

    #[test]
    fn corrupted_blocks_yield_no_points() {
        for dialect in [Dialect::Hp8566, Dialect::AdvantestR3267, Dialect::RsFsp] {
            let mut handle = connected(dialect);
            handle.transport_mut().corrupt_next_trace();
            assert!(handle.fetch_trace().is_empty(), "{:?}", dialect);
            assert!(handle.state().has_error());
        }
    }

    #[test]
    fn scripted_tek_curve_is_checksummed() {
        let preamble = WfmPreamble {
            point_count: 1000,
            point_offset: 0.0,
            x_increment: 1e3,
            gain: 0.32,
            cal_offset: 250.0,
            zero_ref: -20.0,
        };
        let data: Vec<u8> = (0..1000).map(|i| (i % 251) as u8).collect();
        let good = tek::encode_curve(&data);
        let mut flipped = good.clone();
        flipped[tek::CURVE_ECHO.len() + 2 + 10] ^= 0x01;

        let script = ScriptedTransport::new()
            .reply(tek::VERTICAL_DISPLAY, "VRTDSP LOG:10")
            .reply(tek::REFERENCE_LEVEL, "REFLVL -20")
            .reply(tek::CENTER, "FREQ 1.5E6")
            .reply(tek::SPAN, "SPAN 1E5")
            .reply(tek::PREAMBLE_QUERY, &preamble.to_reply())
            .binary(good)
            .binary(flipped);
        let mut handle = InstrumentHandle::startup(script);
        handle.connect(&fast("-tek490")).unwrap();
        assert_eq!(handle.state().span_hz(), 1e6);

        let trace = handle.fetch_trace();
        assert_eq!(trace.len(), 1000);
        let (_, first) = trace.points().next().unwrap();
        assert!((first + 100.0).abs() < 1e-9, "{}", first);

        let trace = handle.fetch_trace();
        assert!(trace.is_empty());
        assert!(handle.state().error.as_deref().unwrap().contains("checksum"));
        assert!(handle.is_ready());

        let queries = handle.transport().queries();
        assert!(!queries.contains(&"ID?"));
        let preamble_reads = queries
            .iter()
            .filter(|q| **q == tek::PREAMBLE_QUERY)
            .count();
        assert_eq!(preamble_reads, 1);
    }

    /// Script for an HP 3585 whose status byte reports `polls` in turn
    fn hp3585_script(polls: &[u8], codes: &[u16]) -> ScriptedTransport {
        ScriptedTransport::new()
            .reply("LG?", "10")
            .reply("RL?", "-10")
            .reply("CF?", "1500000")
            .reply("SP?", "1000000")
            .polls(polls)
            .binary(BlockFormat::words(1000.0, 0.0).encode(codes))
    }

    #[test]
    fn serial_poll_gates_the_dump() {
        let mut codes = vec![500u16; 1001];
        codes[500] = 1000;
        let mut handle = InstrumentHandle::startup(hp3585_script(&[0, 0, 0x04], &codes));
        handle.connect(&fast("-hp3585")).unwrap();
        assert_eq!(handle.state().trace_point_count, 1001);
        assert_eq!(handle.state().min_dbm, -110.0);

        let trace = handle.fetch_trace();
        assert_eq!(trace.len(), 1001);
        let peak = trace.peak().unwrap();
        assert_eq!(peak.index, 500);
        assert!((peak.dbm + 10.0).abs() < 1e-9);
        let (_, floor) = trace.points().next().unwrap();
        assert!((floor + 60.0).abs() < 1e-9);
        assert!(handle.transport().was_sent("CS"));
    }

    #[test]
    fn serial_poll_without_done_bit_times_out() {
        let mut handle =
            InstrumentHandle::startup(hp3585_script(&[0x01], &[500u16; 1001]));
        let mut options = fast("-hp3585");
        options.timing.sweep_timeout_ms = 30;
        handle.connect(&options).unwrap();

        let err = handle.try_fetch_trace().unwrap_err();
        assert!(matches!(err, AcquireError::SweepTimeout(_)));
        assert!(!handle.transport().was_sent("SA"));
        assert!(handle.is_ready());
    }

    #[test]
    fn preamble_point_change_requires_reconnect() {
        let mut handle = connected(Dialect::Tek2710);
        handle.transport_mut().set_points(256);

        let err = handle.try_fetch_trace().unwrap_err();
        assert!(matches!(
            err,
            AcquireError::Protocol(ProtocolError::PointCountMismatch {
                expected: 512,
                actual: 256
            })
        ));
        assert!(handle.reconnect_required());

        handle.connect(&fast("-family:tek")).unwrap();
        assert!(!handle.reconnect_required());
    }

    #[test]
    fn sweep_timeout_is_reported() {
        let mut handle = InstrumentHandle::startup(VirtualAnalyzer::from_config(
            VirtualAnalyzerConfig {
                dialect: Dialect::Hp358x,
                sweep_polls: u32::MAX,
                ..Default::default()
            },
        ));
        let mut options = fast("-family:hp");
        options.timing.sweep_timeout_ms = 30;
        handle.connect(&options).unwrap();

        let err = handle.try_fetch_trace().unwrap_err();
        assert!(matches!(err, AcquireError::SweepTimeout(_)));
        assert_eq!(err.class(), ErrorClass::Timeout);
        assert!(handle.state().has_error());
        assert!(handle.is_ready());
    }

    #[test]
    fn resampled_trace_keeps_range() {
        let mut handle = connected(Dialect::Hp8566);
        let trace = handle.fetch_trace();
        let small = trace.resampled(100, ResampleOp::Max);
        assert_eq!(small.len(), 100);
        assert_eq!((small.min_hz, small.max_hz), (trace.min_hz, trace.max_hz));
        let peak = small.peak().unwrap();
        assert!((peak.dbm - trace.peak().unwrap().dbm).abs() < 1e-9);
    }

    #[test]
    fn disconnect_returns_to_local() {
        let mut handle = connected(Dialect::Hp8566);
        handle.disconnect(true);
        assert_eq!(handle.state().connection, ConnectionState::Disconnected);
        assert!(handle.transport().went_local());
        assert!(handle.fetch_trace().is_empty());

        let analyzer = handle.shutdown();
        assert!(!analyzer.is_open());
    }
}

// ============================================================================
// Cancellation Tests
// ============================================================================

mod cancellation_tests {
    use super::*;

    #[test]
    fn cancel_aborts_identification() {
        let mut handle = InstrumentHandle::startup(ScriptedTransport::new().strict());
        let mut options = fast("-family:hp");
        options.timing.identify_timeout_ms = 30_000;

        let cancel = handle.cancel_token();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            cancel.cancel();
        });

        let started = Instant::now();
        let err = handle.connect(&options).unwrap_err();
        canceller.join().unwrap();

        assert!(err.is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(handle.state().connection, ConnectionState::Disconnected);
        assert!(!handle.state().has_error());
    }

    #[test]
    fn cancel_aborts_sweep_wait() {
        let mut handle = InstrumentHandle::startup(VirtualAnalyzer::from_config(
            VirtualAnalyzerConfig {
                dialect: Dialect::Hp3585,
                sweep_polls: u32::MAX,
                ..Default::default()
            },
        ));
        let mut options = fast("-family:hp");
        options.timing.sweep_timeout_ms = 30_000;
        handle.connect(&options).unwrap();

        let cancel = handle.cancel_token();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            cancel.cancel();
        });

        let trace = handle.fetch_trace();
        canceller.join().unwrap();

        assert!(trace.is_empty());
        assert_eq!(handle.state().trace_point_count, 0);
        assert!(!handle.state().has_error());
        assert!(handle.is_ready());
    }
}

// ============================================================================
// Receiver Tests
// ============================================================================

mod receiver_tests {
    use super::*;

    #[test]
    fn receiver_configures_itself() {
        let mut handle = InstrumentHandle::startup(ScriptedTransport::new())
            .with_receiver(Box::new(VirtualReceiver::new("0042")));
        handle
            .connect(&fast("-ddr -serial:0042 -fft:256 -ampl_offset:1"))
            .unwrap();

        let state = handle.state();
        assert_eq!(state.dialect, Some(Dialect::DirectReceiver));
        assert_eq!(state.id, "Virtual DDR 0042");
        assert_eq!(state.trace_point_count, 256);
        assert_eq!(state.min_hz, 95e6);
        assert_eq!(state.max_hz, 105e6);
        assert_eq!(state.max_dbm, -9.0);
        assert_eq!(state.min_dbm, -109.0);

        let trace = handle.fetch_trace();
        assert_eq!(trace.len(), 256);
        let peak = trace.peak().unwrap();
        assert_eq!(peak.index, 128);
        assert_eq!(peak.dbm, -29.0);

        // The bus is never touched
        assert!(handle.transport().sent().is_empty());
    }

    #[test]
    fn wrong_serial_fails() {
        let mut handle = InstrumentHandle::startup(ScriptedTransport::new())
            .with_receiver(Box::new(VirtualReceiver::new("0042")));
        let err = handle.connect(&fast("-ddr -serial:7")).unwrap_err();
        assert!(matches!(err, AcquireError::Transport(_)));
        assert_eq!(handle.state().connection, ConnectionState::Failed);
    }

    #[test]
    fn unplugged_receiver_fails_the_connection() {
        let mut receiver = VirtualReceiver::new("0042");
        receiver.unplug();
        let mut handle =
            InstrumentHandle::startup(ScriptedTransport::new()).with_receiver(Box::new(receiver));
        handle.connect(&fast("-family:ddr")).unwrap();

        assert!(handle.fetch_trace().is_empty());
        assert_eq!(handle.state().connection, ConnectionState::Failed);
        assert!(handle.state().has_error());
    }

    #[test]
    fn target_change_requires_reconnect() {
        let mut handle = InstrumentHandle::startup(ScriptedTransport::new())
            .with_receiver(Box::new(VirtualReceiver::new("0042")));
        handle.connect(&fast("-ddr")).unwrap();

        let mut target = handle.state().receiver_target.clone();
        target.fft_size = 512;
        handle.set_receiver_target(target);
        assert!(handle.reconnect_required());

        let options = handle.options().clone();
        handle.connect(&options).unwrap();
        assert_eq!(handle.fetch_trace().len(), 512);
    }
}

// ============================================================================
// Resampler Scenarios
// ============================================================================

mod resample_tests {
    use super::*;

    #[test]
    fn average_halves() {
        assert_eq!(
            resample(&[0.0, 10.0, 20.0, 30.0], 2, ResampleOp::Average),
            vec![5.0, 25.0]
        );
    }

    #[test]
    fn single_point_is_repeated() {
        assert_eq!(resample(&[5.0], 8, ResampleOp::Point), vec![5.0; 8]);
    }
}
