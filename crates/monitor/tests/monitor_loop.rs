use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use common::error::{MonitorError, SensorError, SinkError};
use common::sink::MemorySink;
use common::{
    ColorTag, IndicationMapper, LateralDirection, LongitudinalDirection, MetricRecord, ModeSet,
    MotionSample, RecordSink, SampleSource, ThresholdProfile,
};
use monitor::{
    BankCall, ButtonInputs, ButtonLatch, LoggerTransition, MonitorLoop, MonitorState,
    RecordingIndicatorBank, RunSummary, ScriptedSampleSource,
};

fn sample(ax: f64, ay: f64, t: f64) -> MotionSample {
    MotionSample {
        ax,
        ay,
        az: 1.0,
        pitch: 0.5,
        yaw: 1.5,
        roll: 2.0,
        t,
    }
}

fn modes() -> ModeSet {
    ModeSet::new(vec![
        ThresholdProfile::new("test", 0.3, 0.6, 0.25, ColorTag::Green).unwrap(),
        ThresholdProfile::new("b", 0.4, 1.0, 0.3, ColorTag::Blue).unwrap(),
        ThresholdProfile::new("c", 0.5, 1.2, 0.4, ColorTag::Yellow).unwrap(),
        ThresholdProfile::new("d", 0.6, 1.4, 0.5, ColorTag::Red).unwrap(),
    ])
    .unwrap()
}

fn monitor_with<S: SampleSource, R: RecordSink>(
    source: S,
    sink: R,
) -> MonitorLoop<S, RecordingIndicatorBank, R> {
    MonitorLoop::with_modes(
        modes(),
        IndicationMapper::default(),
        source,
        RecordingIndicatorBank::default(),
        sink,
    )
}

/// Fails a fixed number of appends before accepting batches.
#[derive(Default)]
struct FlakySink {
    failures_left: u32,
    accepted: Vec<Vec<MetricRecord>>,
}

impl RecordSink for FlakySink {
    fn append(&mut self, records: &[MetricRecord]) -> Result<(), SinkError> {
        if self.failures_left > 0 {
            self.failures_left -= 1;
            return Err(SinkError::Rejected("card removed".to_string()));
        }
        self.accepted.push(records.to_vec());
        Ok(())
    }
}

#[test]
fn first_tick_enters_monitoring_with_mode_color() {
    let source = ScriptedSampleSource::new([sample(0.0, 0.0, 0.0)]);
    let mut monitor = monitor_with(source, MemorySink::default());
    assert_eq!(monitor.state(), MonitorState::Idle);

    monitor.tick(ButtonInputs::default()).unwrap();

    assert_eq!(monitor.state(), MonitorState::Monitoring);
    assert_eq!(monitor.bank().calls[0], BankCall::Status(ColorTag::Green));
}

#[test]
fn dispatches_plan_and_warning() {
    let source = ScriptedSampleSource::new([sample(-0.5, 0.1, 0.0), sample(-0.9, 0.0, 0.001)]);
    let mut monitor = monitor_with(source, MemorySink::default());

    let first = monitor.tick(ButtonInputs::default()).unwrap();
    assert_eq!(first.plan.lateral, (LateralDirection::Right, 2));
    assert_eq!(first.plan.longitudinal, (LongitudinalDirection::None, 0));
    assert!(first.plan.warning.is_none());

    let second = monitor.tick(ButtonInputs::default()).unwrap();
    assert_eq!(second.cycle_id, 1);
    let warning = second.plan.warning.expect("warning expected");
    assert_eq!(warning.side, LateralDirection::Right);
    assert_eq!(warning.flash_delay, 0.05);
    assert_eq!(warning.repetitions, 2);

    let bank = monitor.bank();
    assert_eq!(bank.plans().count(), 2);
    let flashes: Vec<_> = bank.flashes().collect();
    assert_eq!(flashes.len(), 1);
    assert_eq!(*flashes[0], warning);
}

#[test]
fn mode_select_cycles_and_updates_status_color() {
    let source = ScriptedSampleSource::new((0..5).map(|i| sample(0.0, 0.0, i as f64)));
    let mut monitor = monitor_with(source, MemorySink::default());

    let report = monitor.tick(ButtonInputs::mode_select()).unwrap();
    assert_eq!(report.mode_changed.as_deref(), Some("b"));
    assert_eq!(monitor.bank().last_status(), Some(ColorTag::Blue));

    for _ in 0..3 {
        monitor.tick(ButtonInputs::mode_select()).unwrap();
    }
    assert_eq!(monitor.active_profile().name, "test");
    assert_eq!(monitor.bank().last_status(), Some(ColorTag::Green));

    let report = monitor.tick(ButtonInputs::default()).unwrap();
    assert!(report.mode_changed.is_none());
}

#[test]
fn new_mode_rescales_the_same_sample() {
    let source = ScriptedSampleSource::new([sample(0.45, 0.0, 0.0), sample(0.45, 0.0, 0.1)]);
    let mut monitor = monitor_with(source, MemorySink::default());

    // 0.45 / 0.3 = 1.5 rounds to 2
    let report = monitor.tick(ButtonInputs::default()).unwrap();
    assert_eq!(report.plan.lateral, (LateralDirection::Left, 2));

    // 0.45 / 0.4 = 1.125 rounds to 1
    let report = monitor.tick(ButtonInputs::mode_select()).unwrap();
    assert_eq!(report.plan.lateral, (LateralDirection::Left, 1));
}

#[test]
fn logger_toggle_batches_and_flushes_in_order() {
    let source = ScriptedSampleSource::new((0..6).map(|i| sample(0.1, 0.2, i as f64 * 0.01)));
    let mut monitor = monitor_with(source, MemorySink::default());

    monitor.tick(ButtonInputs::default()).unwrap();
    let report = monitor.tick(ButtonInputs::logger_toggle()).unwrap();
    assert_eq!(report.logger, Some(LoggerTransition::Started));
    assert!(monitor.logger_enabled());

    monitor.tick(ButtonInputs::default()).unwrap();
    monitor.tick(ButtonInputs::default()).unwrap();
    assert_eq!(monitor.aggregator().len(), 3);

    let report = monitor.tick(ButtonInputs::logger_toggle()).unwrap();
    assert_eq!(report.logger, Some(LoggerTransition::Flushed(3)));
    assert!(!monitor.logger_enabled());
    assert!(monitor.aggregator().is_empty());

    let sink = monitor.sink();
    assert_eq!(sink.batches.len(), 1);
    let sequences: Vec<u64> = sink.batches[0].iter().map(|r| r.sequence).collect();
    assert_eq!(sequences, [1, 2, 3]);
    assert_eq!(sink.batches[0][0].time_ms, 10.0);

    // not logging any more
    monitor.tick(ButtonInputs::default()).unwrap();
    assert!(monitor.aggregator().is_empty());
}

#[test]
fn failed_flush_keeps_records_and_retries_on_next_toggle() {
    let source = ScriptedSampleSource::new((0..4).map(|i| sample(0.1, 0.2, i as f64 * 0.01)));
    let sink = FlakySink {
        failures_left: 1,
        ..FlakySink::default()
    };
    let mut monitor = monitor_with(source, sink);

    monitor.tick(ButtonInputs::logger_toggle()).unwrap();
    monitor.tick(ButtonInputs::default()).unwrap();

    let report = monitor.tick(ButtonInputs::logger_toggle()).unwrap();
    assert_eq!(report.logger, Some(LoggerTransition::FlushFailed { kept: 2 }));
    assert_eq!(monitor.state(), MonitorState::Monitoring);
    assert!(monitor.logger_enabled());
    // the cycle still polled and logged its own sample
    assert_eq!(monitor.aggregator().len(), 3);

    let report = monitor.tick(ButtonInputs::logger_toggle()).unwrap();
    assert_eq!(report.logger, Some(LoggerTransition::Flushed(3)));
    assert_eq!(monitor.sink().accepted.len(), 1);
    assert_eq!(monitor.sink().accepted[0].len(), 3);
}

#[test]
fn failed_flush_still_dispatches_cycle_and_mode_change() {
    let source = ScriptedSampleSource::new([sample(0.0, 0.0, 0.0), sample(-0.5, 0.1, 0.01)]);
    let sink = FlakySink {
        failures_left: 1,
        ..FlakySink::default()
    };
    let mut monitor = monitor_with(source, sink);
    let mut summary = RunSummary::default();

    monitor
        .step(ButtonInputs::logger_toggle(), &mut summary)
        .unwrap();
    let inputs = ButtonInputs {
        mode_select: true,
        logger_toggle: true,
    };
    monitor.step(inputs, &mut summary).unwrap();

    assert_eq!(summary.cycles, 2);
    assert_eq!(summary.mode_changes, 1);
    assert_eq!(summary.sink_failures, 1);
    assert_eq!(summary.records_flushed, 0);
    assert_eq!(monitor.active_profile().name, "b");
    assert_eq!(monitor.bank().plans().count(), 2);
    assert_eq!(monitor.bank().last_status(), Some(ColorTag::Blue));
}

/// Rejects every batch.
struct RejectingSink;

impl RecordSink for RejectingSink {
    fn append(&mut self, _records: &[MetricRecord]) -> Result<(), SinkError> {
        Err(SinkError::Rejected("read-only filesystem".to_string()))
    }
}

#[test]
fn stop_halts_even_when_final_flush_fails() {
    let source = ScriptedSampleSource::new([sample(0.5, 0.5, 0.0)]);
    let mut monitor = monitor_with(source, RejectingSink);

    monitor.tick(ButtonInputs::logger_toggle()).unwrap();
    let err = monitor.stop().unwrap_err();

    assert!(matches!(err, SinkError::Rejected(_)));
    assert_eq!(monitor.state(), MonitorState::Idle);
    assert_eq!(monitor.bank().resets(), 1);
    assert_eq!(monitor.bank().calls.last(), Some(&BankCall::Reset));
    // kept for a retry
    assert!(monitor.logger_enabled());
    assert_eq!(monitor.aggregator().len(), 1);
}

#[test]
fn run_keeps_summary_when_final_flush_fails() {
    let shutdown = Arc::new(AtomicBool::new(false));
    let source = StopAfter {
        polls_left: 3,
        shutdown: Arc::clone(&shutdown),
        t: 0.0,
    };
    let mut monitor = monitor_with(source, RejectingSink);
    let latch = ButtonLatch::new();
    latch.press_logger_toggle();

    let summary = monitor.run(&latch, &shutdown).unwrap();

    assert_eq!(summary.cycles, 3);
    assert_eq!(summary.records_flushed, 0);
    assert_eq!(summary.sink_failures, 1);
    assert_eq!(monitor.state(), MonitorState::Idle);
    assert_eq!(monitor.bank().resets(), 1);
    assert_eq!(monitor.aggregator().len(), 3);
}

#[test]
fn sensor_failure_halts_and_resets_indicators() {
    let mut source = ScriptedSampleSource::new([sample(0.5, 0.0, 0.0)]);
    source.push_failure(SensorError::Read("i2c nack".to_string()));
    let mut monitor = monitor_with(source, MemorySink::default());

    monitor.tick(ButtonInputs::default()).unwrap();
    let err = monitor.tick(ButtonInputs::default()).unwrap_err();

    assert!(err.is_fatal());
    assert!(matches!(err, MonitorError::Sensor(SensorError::Read(_))));
    assert_eq!(monitor.state(), MonitorState::Idle);
    assert_eq!(monitor.bank().calls.last(), Some(&BankCall::Reset));
}

#[test]
fn unknown_mode_name_leaves_active_mode() {
    let mut monitor = monitor_with(ScriptedSampleSource::default(), MemorySink::default());
    assert!(monitor.select_mode("rally").is_err());
    assert_eq!(monitor.active_profile().name, "test");
    assert_eq!(monitor.select_mode("c").unwrap().display_color, ColorTag::Yellow);
}

/// Raises the shutdown flag after a fixed number of polls.
struct StopAfter {
    polls_left: u32,
    shutdown: Arc<AtomicBool>,
    t: f64,
}

impl SampleSource for StopAfter {
    fn poll(&mut self) -> Result<MotionSample, SensorError> {
        self.polls_left = self.polls_left.saturating_sub(1);
        if self.polls_left == 0 {
            self.shutdown.store(true, Ordering::Relaxed);
        }
        self.t += 0.001;
        Ok(sample(-0.9, 0.3, self.t))
    }
}

#[test]
fn run_paces_until_shutdown_and_flushes_on_exit() {
    let shutdown = Arc::new(AtomicBool::new(false));
    let source = StopAfter {
        polls_left: 5,
        shutdown: Arc::clone(&shutdown),
        t: 0.0,
    };
    let mut monitor = monitor_with(source, MemorySink::default());
    let latch = ButtonLatch::new();
    latch.press_logger_toggle();

    let summary = monitor.run(&latch, &shutdown).unwrap();

    assert_eq!(summary.cycles, 5);
    assert_eq!(summary.warnings, 5);
    assert_eq!(summary.records_flushed, 5);
    assert_eq!(monitor.sink().total_records(), 5);
    assert_eq!(monitor.state(), MonitorState::Idle);
    assert!(!monitor.logger_enabled());
}

#[test]
fn run_surfaces_sensor_failure() {
    let source = ScriptedSampleSource::new([sample(0.0, 0.0, 0.0), sample(0.0, 0.0, 0.001)]);
    let mut monitor = monitor_with(source, MemorySink::default());
    let shutdown = AtomicBool::new(false);

    let err = monitor.run(&ButtonLatch::new(), &shutdown).unwrap_err();

    assert!(matches!(err, MonitorError::Sensor(SensorError::Disconnected)));
    assert_eq!(monitor.bank().resets(), 1);
}
