use crate::{LateralDirection, WarningEvent};

/// Shortest hold time for a warning flash, in seconds.
pub const MIN_FLASH_DELAY: f64 = 0.05;
/// Longest hold time for a warning flash, in seconds.
pub const MAX_FLASH_DELAY: f64 = 0.2;
pub const WARNING_REPETITIONS: u32 = 2;

/// Flash timing for lateral slip warnings. The flash gets faster the further
/// past its tolerance the lateral force is.
#[derive(Debug, Clone, Copy, Default)]
pub struct WarningScheduler;

impl WarningScheduler {
    pub fn flash_delay(ax: f64, lateral_tolerance: f64) -> f64 {
        let raw = 0.1 / (ax / lateral_tolerance).abs();
        raw.clamp(MIN_FLASH_DELAY, MAX_FLASH_DELAY)
    }

    pub fn schedule(ax: f64, lateral_tolerance: f64, side: LateralDirection) -> WarningEvent {
        WarningEvent {
            side,
            flash_delay: Self::flash_delay(ax, lateral_tolerance),
            repetitions: WARNING_REPETITIONS,
        }
    }
}
