//! Sample-to-indicator mapping.
//!
//! Lateral force lights up to two steps on the left or right bank, or flashes
//! a warning once it comes within [`SLIP_MARGIN`] of the vehicle's lateral
//! limit. Longitudinal force lights up to two steps on the forward or brake
//! bank. Forward acceleration is scaled by `accel_tolerance_brake` and braking
//! by `accel_tolerance_forward`; this cross-mapping is what deployed units do
//! and is kept as is.

use crate::profile::ThresholdProfile;
use crate::warning::WarningScheduler;
use crate::{IndicationPlan, LateralDirection, Level, LongitudinalDirection, MotionSample};

pub const DEFAULT_MAX_LAT_FORCE: f64 = 0.95;
pub const DEFAULT_VERTICAL_THRESHOLD: f64 = 0.5;
/// Distance below the lateral limit at which warnings take over, in g.
pub const SLIP_MARGIN: f64 = 0.1;
pub const MAX_LEVEL: Level = 2;

#[derive(Debug, Clone, Copy)]
pub struct IndicationMapper {
    max_lat_force: f64,
    vertical_threshold: f64,
}

impl IndicationMapper {
    pub fn new(max_lat_force: f64, vertical_threshold: f64) -> Self {
        Self {
            max_lat_force,
            vertical_threshold,
        }
    }

    pub fn max_lat_force(&self) -> f64 {
        self.max_lat_force
    }

    pub fn slip_threshold(&self) -> f64 {
        self.max_lat_force - SLIP_MARGIN
    }

    pub fn map(&self, sample: &MotionSample, profile: &ThresholdProfile) -> IndicationPlan {
        let mut plan = IndicationPlan::idle();
        plan.vertical_active = sample.az > self.vertical_threshold;

        let ax = sample.ax;
        let tolerance = profile.lateral_tolerance;
        if ax.abs() > tolerance {
            let side = if ax < 0.0 {
                LateralDirection::Right
            } else {
                LateralDirection::Left
            };
            let slipping = match side {
                LateralDirection::Right => ax <= -self.slip_threshold(),
                _ => ax >= self.slip_threshold(),
            };
            if slipping {
                plan.lateral = (side, 0);
                plan.warning = Some(WarningScheduler::schedule(ax, tolerance, side));
            } else {
                plan.lateral = (side, step_level(ax / tolerance).max(1));
            }
        }

        plan.longitudinal = self.longitudinal(sample.ay, profile);
        plan
    }

    fn longitudinal(&self, ay: f64, profile: &ThresholdProfile) -> (LongitudinalDirection, Level) {
        if ay > 0.0 {
            match step_level(ay / profile.accel_tolerance_brake) {
                0 => (LongitudinalDirection::None, 0),
                level => (LongitudinalDirection::Forward, level),
            }
        } else if ay == 0.0 {
            (LongitudinalDirection::Brake, 0)
        } else {
            match step_level(ay / profile.accel_tolerance_forward) {
                0 => (LongitudinalDirection::None, 0),
                level => (LongitudinalDirection::Brake, level),
            }
        }
    }
}

impl Default for IndicationMapper {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LAT_FORCE, DEFAULT_VERTICAL_THRESHOLD)
    }
}

/// Rounds half to even, then saturates at [`MAX_LEVEL`].
fn step_level(ratio: f64) -> Level {
    let steps = ratio.abs().round_ties_even();
    if steps >= MAX_LEVEL as f64 {
        MAX_LEVEL
    } else {
        steps as Level
    }
}
