mod support;

use core::time::Duration;

use embassy_futures::block_on;
use support::{EventLog, HarnessBuilder, ManualTicker};
use tracker_core::devices::Rail;
use tracker_core::events::DutyCycleEvent;
use tracker_core::recovery::{RESTART_COUNTDOWN_START, RestartCountdown};
use tracker_core::schedule::DutyCycleConfig;
use tracker_core::shutdown::{HELD_RAILS, SHUTDOWN_STEPS, ShutdownStep, SleepRequest};

#[test]
fn shutdown_events_follow_step_table() {
    let config = DutyCycleConfig::new(Duration::from_secs(1), 2, 4, Duration::from_secs(90))
        .expect("valid config");
    let mut harness = HarnessBuilder::new().config(config).build();
    let mut ticker = ManualTicker::default();
    let mut events = EventLog::default();

    let request = block_on(
        harness
            .orchestrator
            .run_until_sleep(&mut ticker, &mut events),
    );
    assert_eq!(request.duration(), Duration::from_secs(90));

    let start = events
        .0
        .iter()
        .position(|event| matches!(event, DutyCycleEvent::ShutdownStarted { tick: 4 }))
        .expect("shutdown started at tick 4");
    let mut expected: Vec<DutyCycleEvent> = SHUTDOWN_STEPS
        .iter()
        .copied()
        .map(DutyCycleEvent::ShutdownStep)
        .collect();
    expected.push(DutyCycleEvent::DeepSleep(SleepRequest::from_micros(90_000_000)));
    assert_eq!(&events.0[start + 1..], expected.as_slice());
}

#[test]
fn display_rail_is_held_across_sleep() {
    assert_eq!(HELD_RAILS, [Rail::Display]);
    assert_eq!(
        SHUTDOWN_STEPS,
        [
            ShutdownStep::DisplayOff,
            ShutdownStep::RailOff(Rail::Radio),
            ShutdownStep::RailOff(Rail::Position),
            ShutdownStep::ReleasePowerManager,
        ]
    );
}

#[test]
fn restart_countdown_announces_eleven_values() {
    let values: Vec<u8> = RestartCountdown::new().collect();
    assert_eq!(values.len(), 11);
    assert_eq!(values.first(), Some(&RESTART_COUNTDOWN_START));
    assert_eq!(values, (0..=10).rev().collect::<Vec<u8>>());
}
