//! Diagnostic events emitted by the duty cycle.
//!
//! The core never logs on its own. It hands [`DutyCycleEvent`] values to a
//! caller-supplied [`DutyCycleEventSink`]; the firmware forwards them to
//! `defmt`, the emulator prints them and tests collect them.

use core::fmt;

use crate::position::PositionError;
use crate::shutdown::{ShutdownStep, SleepRequest};
use crate::stack::StackReport;
use crate::telemetry::TelemetrySample;

/// Severity attached to an event when it is logged.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum EventLevel {
    Debug,
    Info,
    Warn,
}

/// Something noteworthy that happened during a tick.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DutyCycleEvent {
    /// The stack margin changed since the previous reading.
    StackWatermark(StackReport),
    /// Telemetry changed and the display was redrawn.
    DisplayRefreshed { tick: u32, sample: TelemetrySample },
    /// A position fix was handed to the uplink.
    UplinkQueued { tick: u32, port: u8, len: usize },
    /// The transmit window passed without a fix; nothing was sent.
    PositionUnavailable { tick: u32, error: PositionError },
    /// The sleep boundary was reached.
    ShutdownStarted { tick: u32 },
    /// One shutdown step completed.
    ShutdownStep(ShutdownStep),
    /// Deep sleep is about to be entered.
    DeepSleep(SleepRequest),
}

impl DutyCycleEvent {
    /// Source tag used as the log line prefix.
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            DutyCycleEvent::StackWatermark(_) => "stack",
            DutyCycleEvent::DisplayRefreshed { .. } => "display",
            DutyCycleEvent::UplinkQueued { .. } | DutyCycleEvent::PositionUnavailable { .. } => {
                "uplink"
            }
            DutyCycleEvent::ShutdownStarted { .. }
            | DutyCycleEvent::ShutdownStep(_)
            | DutyCycleEvent::DeepSleep(_) => "shutdown",
        }
    }

    /// Severity the event is logged at.
    #[must_use]
    pub const fn level(&self) -> EventLevel {
        match self {
            DutyCycleEvent::DisplayRefreshed { .. }
            | DutyCycleEvent::PositionUnavailable { .. }
            | DutyCycleEvent::ShutdownStep(_) => EventLevel::Debug,
            DutyCycleEvent::StackWatermark(_)
            | DutyCycleEvent::UplinkQueued { .. }
            | DutyCycleEvent::ShutdownStarted { .. }
            | DutyCycleEvent::DeepSleep(_) => EventLevel::Info,
        }
    }
}

impl fmt::Display for DutyCycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DutyCycleEvent::StackWatermark(report) => write!(
                f,
                "free stack in {}: {} bytes",
                report.task, report.remaining_bytes
            ),
            DutyCycleEvent::DisplayRefreshed { tick, sample } => write!(
                f,
                "refreshed t={tick} ubat={}mV icharge={}mA ibat={}mA cbat={}mAh",
                sample.battery_voltage_mv,
                sample.charge_current_ma,
                sample.discharge_current_ma,
                sample.charge_capacity_mah
            ),
            DutyCycleEvent::UplinkQueued { tick, port, len } => {
                write!(f, "sending position t={tick} port={port} len={len}")
            }
            DutyCycleEvent::PositionUnavailable { tick, error } => {
                write!(f, "no position t={tick} ({error}), skipping")
            }
            DutyCycleEvent::ShutdownStarted { tick } => write!(f, "shutdown t={tick}"),
            DutyCycleEvent::ShutdownStep(step) => match step {
                ShutdownStep::DisplayOff => f.write_str("display off"),
                ShutdownStep::RailOff(rail) => write!(f, "{} off", rail.regulator()),
                ShutdownStep::ReleasePowerManager => f.write_str("power manager released"),
            },
            DutyCycleEvent::DeepSleep(request) => {
                write!(f, "deep sleep for {}us", request.duration_us())
            }
        }
    }
}

/// Receives diagnostic events. Recording must not block.
pub trait DutyCycleEventSink {
    fn record(&mut self, event: DutyCycleEvent);
}

impl<S: DutyCycleEventSink + ?Sized> DutyCycleEventSink for &mut S {
    fn record(&mut self, event: DutyCycleEvent) {
        (**self).record(event);
    }
}

/// Sink that discards every event.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopEventSink;

impl DutyCycleEventSink for NoopEventSink {
    fn record(&mut self, _: DutyCycleEvent) {}
}
