//! Tokio host for the monitor loop.
//!
//! The loop itself stays synchronous: one task ticks it on an interval, and
//! button presses arrive over a channel that is drained into a latch at the
//! top of each cycle. A cycle may block for a whole warning flash, so it runs
//! under [`tokio::task::block_in_place`]; the host needs the multi-threaded
//! runtime.

use tokio::sync::{mpsc, watch};
use tokio::task;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

use common::{IndicatorBank, MonitorError, RecordSink, SampleSource};
use monitor::{ButtonLatch, MonitorLoop, RunSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonPress {
    ModeSelect,
    LoggerToggle,
}

/// Ticks `monitor` at its poll rate until `shutdown` turns true (or its sender
/// is dropped) or the sensor fails. Any batch still being logged is flushed
/// on a clean shutdown.
///
/// # Panics
///
/// When called on a current-thread runtime.
pub async fn run_monitor<S, B, R>(
    monitor: &mut MonitorLoop<S, B, R>,
    mut presses: mpsc::Receiver<ButtonPress>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<RunSummary, MonitorError>
where
    S: SampleSource,
    B: IndicatorBank,
    R: RecordSink,
{
    let latch = ButtonLatch::new();
    let mut interval = time::interval(monitor.poll_period());
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut summary = RunSummary::default();

    info!("Async monitor started at {:?} per cycle", monitor.poll_period());

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }
        if *shutdown.borrow() {
            break;
        }

        while let Ok(press) = presses.try_recv() {
            debug!("Button press: {:?}", press);
            match press {
                ButtonPress::ModeSelect => latch.press_mode_select(),
                ButtonPress::LoggerToggle => latch.press_logger_toggle(),
            }
        }

        let inputs = latch.take();
        task::block_in_place(|| monitor.step(inputs, &mut summary))?;
    }

    task::block_in_place(|| monitor.finish(&mut summary));
    info!(
        "Async monitor stopped after {} cycles ({} warnings)",
        summary.cycles, summary.warnings
    );
    Ok(summary)
}
