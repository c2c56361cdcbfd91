//! Shutdown sequencing ahead of deep sleep.
//!
//! The sequence is a constant step table executed in order, with no early
//! exit. Deep sleep itself is represented by the [`SleepRequest`] returned to
//! the caller so the terminal call stays at the outermost layer.

use core::time::Duration;

use crate::devices::{DisplaySink, PowerRailControl, Rail, RailState};
use crate::events::{DutyCycleEvent, DutyCycleEventSink};

/// One action of the shutdown sequence.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ShutdownStep {
    /// Power the display controller down.
    DisplayOff,
    /// Switch a regulator output off.
    RailOff(Rail),
    /// Release the power-management driver context.
    ReleasePowerManager,
}

/// Ordered shutdown actions performed before every deep-sleep entry.
pub const SHUTDOWN_STEPS: [ShutdownStep; 4] = [
    ShutdownStep::DisplayOff,
    ShutdownStep::RailOff(Rail::Radio),
    ShutdownStep::RailOff(Rail::Position),
    ShutdownStep::ReleasePowerManager,
];

/// Rails deliberately left on across deep sleep.
///
/// Switching DCDC1 off here causes I2C communication errors during the next
/// wake-up, so the display rail stays powered.
pub const HELD_RAILS: [Rail; 1] = [Rail::Display];

/// Terminal action: deep sleep for a fixed duration, then reboot.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SleepRequest {
    duration_us: u64,
}

impl SleepRequest {
    #[must_use]
    pub const fn from_micros(duration_us: u64) -> Self {
        Self { duration_us }
    }

    #[must_use]
    pub const fn duration_us(&self) -> u64 {
        self.duration_us
    }

    #[must_use]
    pub const fn duration(&self) -> Duration {
        Duration::from_micros(self.duration_us)
    }
}

/// Executes [`SHUTDOWN_STEPS`] in order, recording each step.
pub fn run_shutdown<D, R, E>(display: &mut D, power: &mut R, events: &mut E)
where
    D: DisplaySink,
    R: PowerRailControl,
    E: DutyCycleEventSink,
{
    for step in SHUTDOWN_STEPS {
        match step {
            ShutdownStep::DisplayOff => display.power_off(),
            ShutdownStep::RailOff(rail) => power.set_rail_state(rail, RailState::Off),
            ShutdownStep::ReleasePowerManager => power.release(),
        }
        events.record(DutyCycleEvent::ShutdownStep(step));
    }
}
