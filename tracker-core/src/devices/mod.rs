//! Capability traits for the collaborators the orchestrator drives.
//!
//! Every hardware dependency is expressed as a small trait so the firmware,
//! the host emulator and the tests can each plug in their own
//! implementation. The orchestrator never names a concrete driver.

use crate::position::{PositionError, PositionFix};
use crate::telemetry::TelemetrySample;

/// Produces instantaneous power telemetry. Reads are trusted as-is.
pub trait TelemetryReader {
    fn sample(&mut self) -> TelemetrySample;
}

/// Produces a position fix or the reason none is available.
pub trait PositionReader {
    /// Returns the current fix.
    ///
    /// # Errors
    ///
    /// Returns a [`PositionError`] when the receiver has no fix, does not
    /// answer in time or sends a frame that fails validation.
    fn fix(&mut self) -> Result<PositionFix, PositionError>;
}

/// Text display with an off-screen buffer.
pub trait DisplaySink {
    /// Clears the off-screen buffer.
    fn clear(&mut self);

    /// Draws `text` (at most [`DISPLAY_LINE_CAPACITY`] bytes) with its
    /// baseline at `(x, y)`.
    ///
    /// [`DISPLAY_LINE_CAPACITY`]: crate::telemetry::DISPLAY_LINE_CAPACITY
    fn draw_line(&mut self, x: u8, y: u8, text: &str);

    /// Pushes the off-screen buffer to the panel.
    fn flush(&mut self);

    /// Powers the display controller down.
    fn power_off(&mut self);
}

/// Best-effort uplink. The outcome of a send is never reported back.
pub trait UplinkTransport {
    fn send(&mut self, payload: &[u8], port: u8, confirmed: bool);
}

/// Switchable regulator outputs used by the tracker.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Rail {
    /// `DCDC1`, feeds the OLED.
    Display,
    /// `LDO2`, feeds the `LoRa` transceiver.
    Radio,
    /// `LDO3`, feeds the GNSS receiver.
    Position,
}

impl Rail {
    /// Regulator name on the power-management chip.
    #[must_use]
    pub const fn regulator(self) -> &'static str {
        match self {
            Rail::Display => "DCDC1",
            Rail::Radio => "LDO2",
            Rail::Position => "LDO3",
        }
    }
}

/// Requested output state for a [`Rail`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RailState {
    On,
    Off,
}

/// Power-management chip control surface.
pub trait PowerRailControl {
    fn set_rail_state(&mut self, rail: Rail, state: RailState);

    /// Releases the driver context ahead of deep sleep.
    fn release(&mut self);
}

/// Enters deep sleep. Waking restarts the device from boot.
pub trait SleepController {
    fn enter_deep_sleep(&mut self, duration_us: u64) -> !;
}

/// Reports the remaining stack margin of the calling task.
pub trait StackGauge {
    /// Name of the task whose stack is measured.
    fn task_name(&self) -> &'static str;

    /// Smallest remaining stack margin observed so far, in bytes.
    ///
    /// Must not block or allocate.
    fn remaining_stack(&mut self) -> u32;
}

/// The collaborators owned by the orchestrator for the process lifetime.
pub struct Devices<T, P, D, U, R> {
    pub telemetry: T,
    pub position: P,
    pub display: D,
    pub uplink: U,
    pub power: R,
}

impl<T, P, D, U, R> Devices<T, P, D, U, R>
where
    T: TelemetryReader,
    P: PositionReader,
    D: DisplaySink,
    U: UplinkTransport,
    R: PowerRailControl,
{
    pub const fn new(telemetry: T, position: P, display: D, uplink: U, power: R) -> Self {
        Self {
            telemetry,
            position,
            display,
            uplink,
            power,
        }
    }
}
