use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use common::error::{ConfigError, MonitorError, SinkError};
use common::{
    IndicationMapper, IndicationPlan, IndicatorBank, MetricsAggregator, ModeSet, MonitorConfig,
    RecordSink, SampleSource, ThresholdProfile,
};

use crate::input::{ButtonInputs, ButtonLatch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Monitoring,
}

/// What the logger toggle did during a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggerTransition {
    Started,
    Flushed(usize),
    /// The sink rejected the batch; `kept` records stay queued and logging
    /// stays on.
    FlushFailed { kept: usize },
}

#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle_id: u64,
    pub plan: IndicationPlan,
    pub processing_time: Duration,
    /// Name of the newly active ride mode, if the mode changed this cycle.
    pub mode_changed: Option<String>,
    pub logger: Option<LoggerTransition>,
}

/// Totals for one call to [`MonitorLoop::run`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub cycles: u64,
    pub warnings: u64,
    pub mode_changes: u64,
    pub records_flushed: usize,
    pub sink_failures: u64,
    pub missed_deadlines: u64,
    pub max_processing: Duration,
}

impl RunSummary {
    pub fn absorb(&mut self, report: &CycleReport, period: Duration) {
        self.cycles += 1;
        if report.plan.warning.is_some() {
            self.warnings += 1;
        }
        if report.mode_changed.is_some() {
            self.mode_changes += 1;
        }
        match report.logger {
            Some(LoggerTransition::Flushed(n)) => self.records_flushed += n,
            Some(LoggerTransition::FlushFailed { .. }) => self.sink_failures += 1,
            _ => {}
        }
        if report.processing_time > period {
            self.missed_deadlines += 1;
        }
        self.max_processing = self.max_processing.max(report.processing_time);
    }
}

/// The polling state machine. Owns the ride-mode cursor, the logger flag and
/// the record batch; everything else is borrowed per cycle.
pub struct MonitorLoop<S, B, R> {
    source: S,
    bank: B,
    sink: R,
    modes: ModeSet,
    mapper: IndicationMapper,
    aggregator: MetricsAggregator,
    poll_period: Duration,
    state: MonitorState,
    logger_enabled: bool,
    cycle_id: u64,
    cycle_logging: bool,
}

impl<S, B, R> MonitorLoop<S, B, R>
where
    S: SampleSource,
    B: IndicatorBank,
    R: RecordSink,
{
    pub fn new(config: &MonitorConfig, source: S, bank: B, sink: R) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut monitor = Self::with_modes(config.mode_set()?, config.mapper(), source, bank, sink);
        monitor.poll_period = config.poll_period();
        monitor.cycle_logging = config.logging.enable_cycle_logging;
        Ok(monitor)
    }

    pub fn with_modes(modes: ModeSet, mapper: IndicationMapper, source: S, bank: B, sink: R) -> Self {
        Self {
            source,
            bank,
            sink,
            modes,
            mapper,
            aggregator: MetricsAggregator::new(),
            poll_period: Duration::from_millis(1),
            state: MonitorState::Idle,
            logger_enabled: false,
            cycle_id: 0,
            cycle_logging: false,
        }
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn active_profile(&self) -> &ThresholdProfile {
        self.modes.active()
    }

    pub fn modes(&self) -> &ModeSet {
        &self.modes
    }

    pub fn logger_enabled(&self) -> bool {
        self.logger_enabled
    }

    pub fn aggregator(&self) -> &MetricsAggregator {
        &self.aggregator
    }

    pub fn poll_period(&self) -> Duration {
        self.poll_period
    }

    pub fn bank(&self) -> &B {
        &self.bank
    }

    pub fn bank_mut(&mut self) -> &mut B {
        &mut self.bank
    }

    pub fn sink(&self) -> &R {
        &self.sink
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Selects a ride mode by name. Unknown names leave the active mode unchanged.
    pub fn select_mode(&mut self, name: &str) -> Result<&ThresholdProfile, ConfigError> {
        let color = self.modes.select(name)?.display_color;
        if self.state == MonitorState::Monitoring {
            self.bank.set_status_color(color);
        }
        Ok(self.modes.active())
    }

    /// Enters the monitoring state and shows the active mode's color.
    pub fn start(&mut self) {
        if self.state == MonitorState::Monitoring {
            return;
        }
        let profile = self.modes.active();
        info!(
            "Monitoring in '{}' mode (lateral {} g, accel {} g, braking {} g)",
            profile.name,
            profile.lateral_tolerance,
            profile.accel_tolerance_brake,
            profile.accel_tolerance_forward
        );
        self.bank.set_status_color(profile.display_color);
        self.state = MonitorState::Monitoring;
    }

    /// Runs one cycle: button handling, one sample, one plan dispatched.
    ///
    /// A sensor failure ends the session: the bank is reset, the loop goes
    /// idle and the error is returned. A failed flush does not interrupt the
    /// cycle. It shows up as [`LoggerTransition::FlushFailed`], the batch
    /// stays in memory and logging stays on so the next toggle retries it.
    pub fn tick(&mut self, inputs: ButtonInputs) -> Result<CycleReport, MonitorError> {
        self.start();
        let cycle_start = Instant::now();

        let mut mode_changed = None;
        if inputs.mode_select {
            let profile = self.modes.advance_active();
            info!("Ride mode -> '{}'", profile.name);
            let (name, color) = (profile.name.clone(), profile.display_color);
            self.bank.set_status_color(color);
            mode_changed = Some(name);
        }

        let mut logger = None;
        if inputs.logger_toggle {
            logger = Some(self.toggle_logger());
        }

        let sample = match self.source.poll() {
            Ok(sample) => sample,
            Err(e) => {
                error!("Sensor failure, halting monitor: {}", e);
                self.halt();
                return Err(e.into());
            }
        };

        let plan = self.mapper.map(&sample, self.modes.active());
        if self.logger_enabled {
            self.aggregator.record(&sample);
        }

        self.bank.apply_plan(&plan);
        if let Some(warning) = &plan.warning {
            debug!(
                "Slip warning {:?} at ax={:.3} g (delay {:.3}s)",
                warning.side, sample.ax, warning.flash_delay
            );
            self.bank.flash_warning(warning);
        }

        let cycle_id = self.cycle_id;
        self.cycle_id += 1;
        let processing_time = cycle_start.elapsed();

        if self.cycle_logging {
            debug!(
                "Cycle #{} t={:.3}s lateral={:?} longitudinal={:?} vertical={} ({:?})",
                cycle_id, sample.t, plan.lateral, plan.longitudinal, plan.vertical_active, processing_time
            );
        }

        Ok(CycleReport {
            cycle_id,
            plan,
            processing_time,
            mode_changed,
            logger,
        })
    }

    /// Repeats [`tick`](Self::tick) at the poll rate until `shutdown` is set or
    /// the sensor fails. Presses are taken from `latch` at the top of each cycle.
    pub fn run(&mut self, latch: &ButtonLatch, shutdown: &AtomicBool) -> Result<RunSummary, MonitorError> {
        let period = self.poll_period;
        let mut summary = RunSummary::default();
        let mut next_tick = Instant::now();

        while !shutdown.load(Ordering::Relaxed) {
            self.step(latch.take(), &mut summary)?;

            next_tick += period;
            let now = Instant::now();
            if now < next_tick {
                thread::sleep(next_tick - now);
            } else {
                // overran; don't try to catch up
                next_tick = now;
            }
        }

        self.finish(&mut summary);
        info!(
            "Monitor stopped after {} cycles ({} warnings, {} over deadline)",
            summary.cycles, summary.warnings, summary.missed_deadlines
        );
        Ok(summary)
    }

    /// Runs one cycle and folds it into `summary`.
    pub fn step(&mut self, inputs: ButtonInputs, summary: &mut RunSummary) -> Result<(), MonitorError> {
        let report = self.tick(inputs)?;
        summary.absorb(&report, self.poll_period);
        Ok(())
    }

    /// Flushes any batch still being logged, then idles and clears the indicators.
    ///
    /// The loop is halted even when the flush fails. The batch is then kept
    /// and logging stays on, so a later `stop` or `flush_records` can retry.
    pub fn stop(&mut self) -> Result<usize, SinkError> {
        let flushed = if self.logger_enabled {
            self.flush_records()
        } else {
            Ok(0)
        };
        self.halt();
        let count = flushed?;
        self.logger_enabled = false;
        Ok(count)
    }

    /// [`stop`](Self::stop) for the end of a run: the final flush is folded
    /// into `summary` instead of discarding it on failure.
    pub fn finish(&mut self, summary: &mut RunSummary) {
        match self.stop() {
            Ok(count) => summary.records_flushed += count,
            Err(e) => {
                error!(
                    "Final flush failed, {} records kept in memory: {}",
                    self.aggregator.len(),
                    e
                );
                summary.sink_failures += 1;
            }
        }
    }

    /// Writes the current batch to the sink now.
    pub fn flush_records(&mut self) -> Result<usize, SinkError> {
        let count = self.aggregator.flush(&mut self.sink)?;
        if count > 0 {
            info!("Logger flushed {} records", count);
        }
        Ok(count)
    }

    fn toggle_logger(&mut self) -> LoggerTransition {
        if !self.logger_enabled {
            info!("Logger started");
            self.aggregator.start();
            self.logger_enabled = true;
            return LoggerTransition::Started;
        }
        match self.flush_records() {
            Ok(count) => {
                self.logger_enabled = false;
                LoggerTransition::Flushed(count)
            }
            Err(e) => {
                let kept = self.aggregator.len();
                warn!("Logger flush failed, keeping {} records: {}", kept, e);
                LoggerTransition::FlushFailed { kept }
            }
        }
    }

    fn halt(&mut self) {
        self.state = MonitorState::Idle;
        self.bank.reset();
    }
}
