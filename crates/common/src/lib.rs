use serde::{Deserialize, Serialize};

pub mod config;
pub mod error;
pub mod mapper;
pub mod metrics;
pub mod profile;
pub mod sink;
pub mod warning;

pub use config::{load_config, MonitorConfig};
pub use error::{ConfigError, MonitorError, SensorError, SinkError};
pub use mapper::IndicationMapper;
pub use metrics::{MetricRecord, MetricsAggregator, RecordSink};
pub use profile::{ModeSet, ThresholdProfile};
pub use warning::WarningScheduler;

/// Raw accelerometer counts per g at the sensor's +/-2 g range.
pub const ACCEL_LSB_PER_G: f64 = 16384.0;
/// Raw gyro counts per deg/sec at the sensor's +/-1000 dps range.
pub const GYRO_LSB_PER_DPS: f64 = 32.8;

/// One calibrated 6-axis reading.
///
/// Accelerations are in g, angular rates in deg/sec, `t` in seconds since the
/// monitor started. In the vehicle frame `ax` is lateral (negative = force to
/// the right), `ay` is longitudinal (positive = accelerating) and `az` is
/// vertical.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
    pub ax: f64,
    pub ay: f64,
    pub az: f64,
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
    pub t: f64,
}

/// Register-level counts as read from the IMU.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawImuReading {
    pub accel: [i16; 3],
    pub gyro: [i16; 3],
}

impl MotionSample {
    pub fn from_raw(raw: RawImuReading, t: f64) -> Self {
        let [ax, ay, az] = raw.accel.map(|c| c as f64 / ACCEL_LSB_PER_G);
        let [gx, gy, gz] = raw.gyro.map(|c| c as f64 / GYRO_LSB_PER_DPS);
        Self {
            ax,
            ay,
            az,
            pitch: gx,
            roll: gy,
            yaw: gz,
            t,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LateralDirection {
    Left,
    Right,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LongitudinalDirection {
    Forward,
    Brake,
    None,
}

/// Indicator steps lit on one axis. Never more than two per side.
pub type Level = u8;

/// Flash instruction for the indicator bank when lateral force nears the grip limit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WarningEvent {
    pub side: LateralDirection,
    /// Seconds each toggled state is held.
    pub flash_delay: f64,
    pub repetitions: u32,
}

/// What the indicator bank should show for a single poll.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicationPlan {
    pub lateral: (LateralDirection, Level),
    pub longitudinal: (LongitudinalDirection, Level),
    pub vertical_active: bool,
    pub warning: Option<WarningEvent>,
}

impl IndicationPlan {
    pub fn idle() -> Self {
        Self {
            lateral: (LateralDirection::None, 0),
            longitudinal: (LongitudinalDirection::None, 0),
            vertical_active: false,
            warning: None,
        }
    }
}

/// Colors the RGB status LED can show. Each channel is either fully on or off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorTag {
    Off,
    Red,
    Green,
    Blue,
    Purple,
    Yellow,
    Cyan,
}

impl ColorTag {
    pub const ALL: [ColorTag; 6] = [
        ColorTag::Red,
        ColorTag::Green,
        ColorTag::Blue,
        ColorTag::Purple,
        ColorTag::Yellow,
        ColorTag::Cyan,
    ];

    /// Red, green and blue channel states.
    pub fn channels(self) -> (bool, bool, bool) {
        match self {
            ColorTag::Off => (false, false, false),
            ColorTag::Red => (true, false, false),
            ColorTag::Green => (false, true, false),
            ColorTag::Blue => (false, false, true),
            ColorTag::Purple => (true, false, true),
            ColorTag::Yellow => (true, true, false),
            ColorTag::Cyan => (false, true, true),
        }
    }
}

/// Supplies one calibrated sample per poll.
pub trait SampleSource {
    fn poll(&mut self) -> Result<MotionSample, SensorError>;
}

/// Drives the physical indicators. Actuation timing (including warning
/// flashes) belongs to the implementation.
pub trait IndicatorBank {
    fn apply_plan(&mut self, plan: &IndicationPlan);
    fn flash_warning(&mut self, event: &WarningEvent);
    fn reset(&mut self);
    fn set_status_color(&mut self, color: ColorTag);
}
