//! Board adapters implementing the duty-cycle capability traits.
//!
//! Everything that only needs `embedded-hal`/`embedded-io` traits builds on
//! the host and is unit tested there. Code touching ESP32 peripherals or
//! linker symbols is compiled for the target only.

pub mod display;
pub mod gps;
pub mod pmu;
pub mod stack;

#[cfg(target_os = "none")]
pub mod sleep;
