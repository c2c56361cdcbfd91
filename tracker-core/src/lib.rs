#![no_std]

// Shared logic for the field tracker duty cycle.
//
// The crate avoids the Rust standard library so the ESP32 firmware and the
// host emulator drive the exact same orchestrator against their own devices.

pub mod devices;
pub mod events;
pub mod orchestrator;
pub mod position;
pub mod recovery;
pub mod schedule;
pub mod shutdown;
pub mod stack;
pub mod telemetry;
