use std::sync::atomic::{AtomicBool, Ordering};

/// Button requests handed to one monitor cycle. Already debounced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonInputs {
    pub mode_select: bool,
    pub logger_toggle: bool,
}

impl ButtonInputs {
    pub fn mode_select() -> Self {
        Self {
            mode_select: true,
            ..Self::default()
        }
    }

    pub fn logger_toggle() -> Self {
        Self {
            logger_toggle: true,
            ..Self::default()
        }
    }
}

/// Press latch shared with whatever observes the buttons (an interrupt
/// handler, a host thread, a channel reader). Presses only set flags; the
/// monitor loop consumes them at the top of its next cycle.
#[derive(Debug, Default)]
pub struct ButtonLatch {
    mode_select: AtomicBool,
    logger_toggle: AtomicBool,
}

impl ButtonLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press_mode_select(&self) {
        self.mode_select.store(true, Ordering::Release);
    }

    pub fn press_logger_toggle(&self) {
        self.logger_toggle.store(true, Ordering::Release);
    }

    /// Returns pending presses and clears them. Presses arriving more than
    /// once between two cycles collapse into one.
    pub fn take(&self) -> ButtonInputs {
        ButtonInputs {
            mode_select: self.mode_select.swap(false, Ordering::AcqRel),
            logger_toggle: self.logger_toggle.swap(false, Ordering::AcqRel),
        }
    }
}
