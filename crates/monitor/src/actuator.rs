use std::fmt;
use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use common::{
    ColorTag, IndicationPlan, IndicatorBank, LateralDirection, Level, LongitudinalDirection,
    WarningEvent,
};

/// The physical indicator layout: a vertical column (brake lamps above the
/// center, acceleration lamps below) crossed by a horizontal row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Indicator {
    Up2,
    Up1,
    Center,
    Down1,
    Down2,
    Left2,
    Left1,
    Right1,
    Right2,
}

impl Indicator {
    pub const ALL: [Indicator; 9] = [
        Indicator::Up2,
        Indicator::Up1,
        Indicator::Center,
        Indicator::Down1,
        Indicator::Down2,
        Indicator::Left2,
        Indicator::Left1,
        Indicator::Right1,
        Indicator::Right2,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

pub fn lateral_indicators(direction: LateralDirection, level: Level) -> &'static [Indicator] {
    match (direction, level) {
        (LateralDirection::Left, 1) => &[Indicator::Left1],
        (LateralDirection::Left, 2) => &[Indicator::Left1, Indicator::Left2],
        (LateralDirection::Right, 1) => &[Indicator::Right1],
        (LateralDirection::Right, 2) => &[Indicator::Right1, Indicator::Right2],
        _ => &[],
    }
}

pub fn longitudinal_indicators(direction: LongitudinalDirection, level: Level) -> &'static [Indicator] {
    match (direction, level) {
        (LongitudinalDirection::Forward, 1) => &[Indicator::Down1],
        (LongitudinalDirection::Forward, 2) => &[Indicator::Down1, Indicator::Down2],
        (LongitudinalDirection::Brake, 1) => &[Indicator::Up1],
        (LongitudinalDirection::Brake, 2) => &[Indicator::Up1, Indicator::Up2],
        _ => &[],
    }
}

/// Indicators toggled by a warning flash.
pub fn warning_indicators(side: LateralDirection) -> &'static [Indicator] {
    match side {
        LateralDirection::Left => &[Indicator::Left1, Indicator::Left2, Indicator::Center],
        LateralDirection::Right => &[Indicator::Right1, Indicator::Right2, Indicator::Center],
        LateralDirection::None => &[],
    }
}

/// On/off state of every directional indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndicatorFrame([bool; 9]);

impl IndicatorFrame {
    pub fn from_plan(plan: &IndicationPlan) -> Self {
        let mut frame = Self::default();
        let (lat, lat_level) = plan.lateral;
        let (long, long_level) = plan.longitudinal;
        for &indicator in lateral_indicators(lat, lat_level)
            .iter()
            .chain(longitudinal_indicators(long, long_level))
        {
            frame.set(indicator, true);
        }
        frame.set(Indicator::Center, plan.vertical_active);
        frame
    }

    pub fn is_lit(&self, indicator: Indicator) -> bool {
        self.0[indicator.index()]
    }

    pub fn set(&mut self, indicator: Indicator, on: bool) {
        self.0[indicator.index()] = on;
    }

    pub fn toggle(&mut self, indicator: Indicator) {
        self.0[indicator.index()] ^= true;
    }

    pub fn lit_count(&self) -> usize {
        self.0.iter().filter(|&&on| on).count()
    }
}

impl fmt::Display for IndicatorFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lamp = |i: Indicator, label: &str| {
            if self.is_lit(i) {
                label.to_string()
            } else {
                "·".repeat(label.len())
            }
        };
        write!(
            f,
            "[{} {} | {} {}] [{} {} {} {} {}]",
            lamp(Indicator::Left2, "L2"),
            lamp(Indicator::Left1, "L1"),
            lamp(Indicator::Right1, "R1"),
            lamp(Indicator::Right2, "R2"),
            lamp(Indicator::Up2, "U2"),
            lamp(Indicator::Up1, "U1"),
            lamp(Indicator::Center, "C"),
            lamp(Indicator::Down1, "D1"),
            lamp(Indicator::Down2, "D2"),
        )
    }
}

/// Indicator bank that renders to the log instead of GPIO. Flash timing is
/// executed for real through the configured hold function.
pub struct ConsoleIndicatorBank {
    frame: IndicatorFrame,
    status: ColorTag,
    flashes: u64,
    hold: fn(Duration),
}

impl ConsoleIndicatorBank {
    pub fn new() -> Self {
        Self {
            frame: IndicatorFrame::default(),
            status: ColorTag::Off,
            flashes: 0,
            hold: thread::sleep,
        }
    }

    /// Replaces the blocking sleep used while holding flash and lamp-test states.
    pub fn with_hold(mut self, hold: fn(Duration)) -> Self {
        self.hold = hold;
        self
    }

    pub fn frame(&self) -> IndicatorFrame {
        self.frame
    }

    pub fn status(&self) -> ColorTag {
        self.status
    }

    pub fn flashes(&self) -> u64 {
        self.flashes
    }

    /// Lights each directional indicator in turn, then steps the status LED
    /// through every color, and leaves everything off. Returns the number of
    /// steps shown.
    pub fn lamp_test(&mut self, hold: Duration) -> usize {
        info!("Starting lamp test");
        self.reset();
        let mut steps = 0;
        for indicator in Indicator::ALL {
            self.frame.set(indicator, true);
            debug!("Lamp test: {:?} {}", indicator, self.frame);
            (self.hold)(hold);
            self.frame.set(indicator, false);
            steps += 1;
        }
        for color in ColorTag::ALL {
            self.set_status_color(color);
            (self.hold)(hold);
            steps += 1;
        }
        self.reset();
        info!("Lamp test complete ({} steps)", steps);
        steps
    }
}

impl Default for ConsoleIndicatorBank {
    fn default() -> Self {
        Self::new()
    }
}

impl IndicatorBank for ConsoleIndicatorBank {
    fn apply_plan(&mut self, plan: &IndicationPlan) {
        let frame = IndicatorFrame::from_plan(plan);
        if frame != self.frame {
            debug!("Indicators {}", frame);
        }
        self.frame = frame;
    }

    fn flash_warning(&mut self, event: &WarningEvent) {
        let hold = Duration::from_secs_f64(event.flash_delay);
        info!(
            "Slip warning {:?}: {} flashes at {:.0} ms",
            event.side,
            event.repetitions,
            event.flash_delay * 1000.0
        );
        let lamps = warning_indicators(event.side);
        for _ in 0..event.repetitions {
            for _ in 0..2 {
                for &lamp in lamps {
                    self.frame.toggle(lamp);
                }
                (self.hold)(hold);
            }
        }
        self.flashes += 1;
    }

    fn reset(&mut self) {
        self.frame = IndicatorFrame::default();
        self.status = ColorTag::Off;
    }

    fn set_status_color(&mut self, color: ColorTag) {
        let (r, g, b) = color.channels();
        debug!("Status LED {:?} (r={} g={} b={})", color, r, g, b);
        self.status = color;
    }
}

/// Calls received by a [`RecordingIndicatorBank`].
#[derive(Debug, Clone, PartialEq)]
pub enum BankCall {
    Plan(IndicationPlan),
    Flash(WarningEvent),
    Reset,
    Status(ColorTag),
}

/// Indicator bank that only remembers what it was asked to do.
#[derive(Debug, Default)]
pub struct RecordingIndicatorBank {
    pub calls: Vec<BankCall>,
}

impl RecordingIndicatorBank {
    pub fn plans(&self) -> impl Iterator<Item = &IndicationPlan> {
        self.calls.iter().filter_map(|c| match c {
            BankCall::Plan(p) => Some(p),
            _ => None,
        })
    }

    pub fn flashes(&self) -> impl Iterator<Item = &WarningEvent> {
        self.calls.iter().filter_map(|c| match c {
            BankCall::Flash(w) => Some(w),
            _ => None,
        })
    }

    pub fn last_status(&self) -> Option<ColorTag> {
        self.calls.iter().rev().find_map(|c| match c {
            BankCall::Status(color) => Some(*color),
            _ => None,
        })
    }

    pub fn resets(&self) -> usize {
        self.calls.iter().filter(|c| **c == BankCall::Reset).count()
    }
}

impl IndicatorBank for RecordingIndicatorBank {
    fn apply_plan(&mut self, plan: &IndicationPlan) {
        self.calls.push(BankCall::Plan(*plan));
    }

    fn flash_warning(&mut self, event: &WarningEvent) {
        self.calls.push(BankCall::Flash(*event));
    }

    fn reset(&mut self) {
        self.calls.push(BankCall::Reset);
    }

    fn set_status_color(&mut self, color: ColorTag) {
        self.calls.push(BankCall::Status(color));
    }
}
