use std::io;
use std::path::PathBuf;
use std::time::Duration;

#[allow(dead_code)]
#[path = "../session.rs"]
mod session;
#[allow(dead_code)]
#[path = "../sim.rs"]
mod sim;

use session::{Session, SessionOptions};
use tracker_core::schedule::DutyCycleConfig;

fn main() -> io::Result<()> {
    record_profile("evidence/emulator-field-cycle.log", DutyCycleConfig::default(), 0)?;
    record_profile(
        "evidence/emulator-lost-fix.log",
        DutyCycleConfig::default(),
        1,
    )?;

    let short = DutyCycleConfig::new(
        Duration::from_secs(1),
        5,
        12,
        Duration::from_secs(120),
    )
    .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err.to_string()))?;
    record_profile("evidence/emulator-short-cycles.log", short, 3)
}

/// Replays two wake cycles as fast as the host allows.
fn record_profile(path: &str, config: DutyCycleConfig, fix_failure_every: u32) -> io::Result<()> {
    let options = SessionOptions {
        config,
        ticks_per_second: 1_000_000,
        cycles: 2,
        fix_failure_every,
        transcript: Some(PathBuf::from(path)),
        ..SessionOptions::default()
    };

    let cycles = options.cycles;
    let mut session = Session::new(options)?;
    for _ in 0..cycles {
        session.run_cycle()?;
    }
    Ok(())
}
