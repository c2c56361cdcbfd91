#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(target_os = "none")]
use panic_rtt_target as _;

#[cfg_attr(not(target_os = "none"), allow(dead_code))]
mod hw;
#[cfg_attr(not(target_os = "none"), allow(dead_code))]
mod log;
#[cfg_attr(not(target_os = "none"), allow(dead_code))]
mod ticker;
#[cfg_attr(not(target_os = "none"), allow(dead_code))]
mod uplink;

#[cfg(target_os = "none")]
mod runtime;

#[cfg(not(target_os = "none"))]
fn main() {}
