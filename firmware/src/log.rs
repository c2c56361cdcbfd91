//! Log routing for the firmware.
//!
//! On the target every line goes to `defmt` over RTT; host builds print to
//! stdout so the adapters can be exercised by unit tests.

use tracker_core::events::{DutyCycleEvent, DutyCycleEventSink, EventLevel};

use crate::uplink::UplinkFrame;

/// Forwards duty-cycle events to the log as `tag: message`.
#[derive(Copy, Clone, Debug, Default)]
pub struct DefmtEventSink;

impl DutyCycleEventSink for DefmtEventSink {
    fn record(&mut self, event: DutyCycleEvent) {
        emit_event(event.level(), event.tag(), &event);
    }
}

#[cfg(target_os = "none")]
fn emit_event(level: EventLevel, tag: &'static str, event: &DutyCycleEvent) {
    let message = defmt::Display2Format(event);
    match level {
        EventLevel::Debug => defmt::debug!("{}: {}", tag, message),
        EventLevel::Info => defmt::info!("{}: {}", tag, message),
        EventLevel::Warn => defmt::warn!("{}: {}", tag, message),
    }
}

#[cfg(not(target_os = "none"))]
fn emit_event(level: EventLevel, tag: &'static str, event: &DutyCycleEvent) {
    if level >= EventLevel::Info {
        println!("{tag}: {event}");
    }
}

#[cfg(target_os = "none")]
pub fn boot(version: &'static str) {
    defmt::info!("boot: tracker firmware {}", version);
}

#[cfg(target_os = "none")]
pub fn power_up_failed() {
    defmt::warn!("boot: power-up sequence incomplete, continuing");
}

#[cfg(target_os = "none")]
pub fn task_spawn_failed(task: &'static str) {
    defmt::error!("boot: failed to start {} task", task);
}

#[cfg(target_os = "none")]
pub fn restart_countdown(seconds: u8) {
    defmt::error!("Restarting in {} seconds...", seconds);
}

#[cfg(target_os = "none")]
pub fn restart_now() {
    defmt::error!("Restarting now.");
}

#[cfg(target_os = "none")]
pub fn pmu_write_failed(regulator: &'static str) {
    defmt::warn!("pmu: failed to switch {}", regulator);
}

#[cfg(not(target_os = "none"))]
pub fn pmu_write_failed(regulator: &'static str) {
    println!("pmu: failed to switch {regulator}");
}

#[cfg(target_os = "none")]
pub fn display_write_failed(operation: &'static str) {
    defmt::warn!("display: {} failed", operation);
}

#[cfg(not(target_os = "none"))]
pub fn display_write_failed(operation: &'static str) {
    println!("display: {operation} failed");
}

#[cfg(target_os = "none")]
pub fn uplink_frame(frame: &UplinkFrame) {
    defmt::info!(
        "uplink: frame port={} confirmed={} payload={=[u8]:02x}",
        frame.port,
        frame.confirmed,
        frame.payload.as_slice()
    );
}

#[cfg(not(target_os = "none"))]
pub fn uplink_frame(frame: &UplinkFrame) {
    println!(
        "uplink: frame port={} confirmed={} payload={:02x?}",
        frame.port,
        frame.confirmed,
        frame.payload.as_slice()
    );
}

#[cfg(target_os = "none")]
pub fn uplink_dropped(reason: &'static str, dropped: u32) {
    defmt::warn!("uplink: frame dropped ({}), {} so far", reason, dropped);
}

#[cfg(not(target_os = "none"))]
pub fn uplink_dropped(reason: &'static str, dropped: u32) {
    println!("uplink: frame dropped ({reason}), {dropped} so far");
}
