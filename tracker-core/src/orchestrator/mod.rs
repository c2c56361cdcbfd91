//! The duty-cycle orchestrator.
//!
//! One cooperative loop, one suspension point per iteration. Each tick runs
//! the same fixed sequence:
//!
//! 1. wait for the drift-corrected tick boundary,
//! 2. poll the stack monitor,
//! 3. sample telemetry,
//! 4. redraw the display if the sample changed,
//! 5. remember the sample,
//! 6. on a transmit boundary, uplink a position fix if one is available,
//! 7. on a sleep boundary, run the shutdown sequence and request deep sleep.
//!
//! Deep sleep never returns on hardware. [`DutyCycleOrchestrator::tick`]
//! models it as [`TickOutcome::Sleep`] so callers can observe the terminal
//! step without halting, and [`DutyCycleOrchestrator::run`] hands the request
//! to a [`SleepController`].

use crate::devices::{
    Devices, DisplaySink, PositionReader, PowerRailControl, SleepController, StackGauge,
    TelemetryReader, UplinkTransport,
};
use crate::events::{DutyCycleEvent, DutyCycleEventSink};
use crate::schedule::{DutyCycleConfig, TickCounter, TickSource};
use crate::shutdown::{SleepRequest, run_shutdown};
use crate::stack::StackMonitor;
use crate::telemetry::{
    ChangeDetector, DISPLAY_FIELDS, DISPLAY_LINE_X, DisplayDecision, DisplayLine, TelemetrySample,
};

/// Result of a single tick.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TickOutcome {
    /// Keep looping.
    Continue,
    /// The shutdown sequence ran; the device must now deep-sleep.
    Sleep(SleepRequest),
}

/// Perpetual control loop that owns every collaborator.
pub struct DutyCycleOrchestrator<T, P, D, U, R, K> {
    config: DutyCycleConfig,
    devices: Devices<T, P, D, U, R>,
    stack: StackMonitor<K>,
    changes: ChangeDetector,
    counter: TickCounter,
    line: DisplayLine,
    pending_sleep: Option<SleepRequest>,
}

impl<T, P, D, U, R, K> DutyCycleOrchestrator<T, P, D, U, R, K>
where
    T: TelemetryReader,
    P: PositionReader,
    D: DisplaySink,
    U: UplinkTransport,
    R: PowerRailControl,
    K: StackGauge,
{
    /// Takes ownership of the collaborators for the rest of the process.
    pub fn new(config: DutyCycleConfig, devices: Devices<T, P, D, U, R>, stack_gauge: K) -> Self {
        Self {
            config,
            devices,
            stack: StackMonitor::new(stack_gauge),
            changes: ChangeDetector::new(),
            counter: TickCounter::new(),
            line: DisplayLine::new(),
            pending_sleep: None,
        }
    }

    #[must_use]
    pub fn config(&self) -> &DutyCycleConfig {
        &self.config
    }

    #[must_use]
    pub fn devices(&self) -> &Devices<T, P, D, U, R> {
        &self.devices
    }

    pub fn devices_mut(&mut self) -> &mut Devices<T, P, D, U, R> {
        &mut self.devices
    }

    #[must_use]
    pub fn stack_monitor(&self) -> &StackMonitor<K> {
        &self.stack
    }

    /// Number of ticks processed in this process lifetime.
    #[must_use]
    pub fn tick_count(&self) -> u32 {
        self.counter.current()
    }

    /// Sample stored by the most recent tick.
    #[must_use]
    pub fn previous_sample(&self) -> &TelemetrySample {
        self.changes.previous()
    }

    /// Returns `true` once the shutdown sequence has run.
    #[must_use]
    pub fn is_spent(&self) -> bool {
        self.pending_sleep.is_some()
    }

    /// Processes the next tick (steps 2 to 7).
    ///
    /// Once a [`TickOutcome::Sleep`] has been returned the orchestrator is
    /// spent: later calls return the same request without touching any
    /// collaborator or advancing the counter.
    pub fn tick<E: DutyCycleEventSink>(&mut self, events: &mut E) -> TickOutcome {
        if let Some(request) = self.pending_sleep {
            return TickOutcome::Sleep(request);
        }

        let tick = self.counter.advance();

        if let Some(report) = self.stack.poll() {
            events.record(DutyCycleEvent::StackWatermark(report));
        }

        let sample = self.devices.telemetry.sample();
        if self.changes.observe(sample) == DisplayDecision::Update {
            self.redraw(&sample);
            events.record(DutyCycleEvent::DisplayRefreshed { tick, sample });
        }

        if self.config.transmit_due(tick) {
            self.transmit(tick, events);
        }

        if self.config.sleep_due(tick) {
            let request = self.shut_down(tick, events);
            return TickOutcome::Sleep(request);
        }

        TickOutcome::Continue
    }

    /// Runs the loop until the sleep boundary and returns the sleep request.
    pub async fn run_until_sleep<C, E>(&mut self, ticker: &mut C, events: &mut E) -> SleepRequest
    where
        C: TickSource,
        E: DutyCycleEventSink,
    {
        loop {
            if let Some(request) = self.pending_sleep {
                return request;
            }

            ticker.wait_for_tick(self.counter.current() + 1).await;

            if let TickOutcome::Sleep(request) = self.tick(events) {
                return request;
            }
        }
    }

    /// Runs the loop forever: the sleep boundary ends in deep sleep, which
    /// restarts the device from boot.
    pub async fn run<C, S, E>(mut self, ticker: &mut C, sleep: &mut S, events: &mut E) -> !
    where
        C: TickSource,
        S: SleepController,
        E: DutyCycleEventSink,
    {
        let request = self.run_until_sleep(ticker, events).await;
        sleep.enter_deep_sleep(request.duration_us())
    }

    fn redraw(&mut self, sample: &TelemetrySample) {
        let display = &mut self.devices.display;
        display.clear();
        for field in DISPLAY_FIELDS {
            field.render(sample, &mut self.line);
            display.draw_line(DISPLAY_LINE_X, field.row(), self.line.as_str());
        }
        display.flush();
    }

    fn transmit<E: DutyCycleEventSink>(&mut self, tick: u32, events: &mut E) {
        match self.devices.position.fix() {
            Ok(fix) => {
                let payload = fix.as_bytes();
                let port = self.config.uplink_port();
                events.record(DutyCycleEvent::UplinkQueued {
                    tick,
                    port,
                    len: payload.len(),
                });
                self.devices
                    .uplink
                    .send(payload, port, self.config.uplink_confirmed());
            }
            Err(error) => events.record(DutyCycleEvent::PositionUnavailable { tick, error }),
        }
    }

    fn shut_down<E: DutyCycleEventSink>(&mut self, tick: u32, events: &mut E) -> SleepRequest {
        events.record(DutyCycleEvent::ShutdownStarted { tick });
        run_shutdown(
            &mut self.devices.display,
            &mut self.devices.power,
            &mut *events,
        );

        let request = SleepRequest::from_micros(self.config.sleep_duration_us());
        self.pending_sleep = Some(request);
        events.record(DutyCycleEvent::DeepSleep(request));
        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::{Rail, RailState};
    use crate::events::{DutyCycleEvent, DutyCycleEventSink, EventLevel, NoopEventSink};
    use crate::position::{PositionError, PositionFix};
    use core::time::Duration;

    struct FixedTelemetry(TelemetrySample);

    impl TelemetryReader for FixedTelemetry {
        fn sample(&mut self) -> TelemetrySample {
            self.0
        }
    }

    struct NoFix;

    impl PositionReader for NoFix {
        fn fix(&mut self) -> Result<PositionFix, PositionError> {
            Err(PositionError::NoFix)
        }
    }

    #[derive(Default)]
    struct CountingDisplay {
        flushes: u32,
        powered_off: bool,
    }

    impl DisplaySink for CountingDisplay {
        fn clear(&mut self) {}

        fn draw_line(&mut self, _: u8, _: u8, _: &str) {}

        fn flush(&mut self) {
            self.flushes += 1;
        }

        fn power_off(&mut self) {
            self.powered_off = true;
        }
    }

    #[derive(Default)]
    struct CountingUplink(u32);

    impl UplinkTransport for CountingUplink {
        fn send(&mut self, _: &[u8], _: u8, _: bool) {
            self.0 += 1;
        }
    }

    #[derive(Default)]
    struct Rails {
        released: bool,
        switched_off: u8,
    }

    impl PowerRailControl for Rails {
        fn set_rail_state(&mut self, _: Rail, state: RailState) {
            if state == RailState::Off {
                self.switched_off += 1;
            }
        }

        fn release(&mut self) {
            self.released = true;
        }
    }

    #[derive(Default)]
    struct LevelTally {
        debug: u32,
        above_debug: u32,
        unavailable: u32,
    }

    impl DutyCycleEventSink for LevelTally {
        fn record(&mut self, event: DutyCycleEvent) {
            if event.level() == EventLevel::Debug {
                self.debug += 1;
            } else {
                self.above_debug += 1;
            }
            if matches!(event, DutyCycleEvent::PositionUnavailable { .. }) {
                self.unavailable += 1;
            }
        }
    }

    struct SteadyStack;

    impl StackGauge for SteadyStack {
        fn task_name(&self) -> &'static str {
            "duty-cycle"
        }

        fn remaining_stack(&mut self) -> u32 {
            1_024
        }
    }

    type TestOrchestrator = DutyCycleOrchestrator<
        FixedTelemetry,
        NoFix,
        CountingDisplay,
        CountingUplink,
        Rails,
        SteadyStack,
    >;

    fn orchestrator(config: DutyCycleConfig) -> TestOrchestrator {
        DutyCycleOrchestrator::new(
            config,
            Devices::new(
                FixedTelemetry(TelemetrySample::new(4_000, 0, 100, 500)),
                NoFix,
                CountingDisplay::default(),
                CountingUplink::default(),
                Rails::default(),
            ),
            SteadyStack,
        )
    }

    #[test]
    fn constant_telemetry_redraws_once() {
        let mut orchestrator = orchestrator(DutyCycleConfig::default());
        for _ in 0..99 {
            assert_eq!(orchestrator.tick(&mut NoopEventSink), TickOutcome::Continue);
        }
        assert_eq!(orchestrator.devices().display.flushes, 1);
        assert_eq!(orchestrator.tick_count(), 99);
    }

    #[test]
    fn spent_orchestrator_is_inert() {
        let config = DutyCycleConfig::new(Duration::from_secs(1), 2, 3, Duration::from_secs(5))
            .expect("valid config");
        let mut orchestrator = orchestrator(config);

        assert_eq!(orchestrator.tick(&mut NoopEventSink), TickOutcome::Continue);
        assert_eq!(orchestrator.tick(&mut NoopEventSink), TickOutcome::Continue);
        let outcome = orchestrator.tick(&mut NoopEventSink);
        assert_eq!(
            outcome,
            TickOutcome::Sleep(SleepRequest::from_micros(5_000_000))
        );
        assert!(orchestrator.is_spent());

        let rails_before = orchestrator.devices().power.switched_off;
        assert_eq!(orchestrator.tick(&mut NoopEventSink), outcome);
        assert_eq!(orchestrator.tick_count(), 3);
        assert_eq!(orchestrator.devices().power.switched_off, rails_before);
        assert!(orchestrator.devices().power.released);
        assert!(orchestrator.devices().display.powered_off);
        assert_eq!(orchestrator.devices().uplink.0, 0);
    }

    #[test]
    fn missing_fix_is_skipped_with_only_a_debug_trace() {
        let config = DutyCycleConfig::new(Duration::from_secs(1), 2, 3, Duration::from_secs(5))
            .expect("valid config");
        let mut orchestrator = orchestrator(config);
        assert_eq!(orchestrator.tick(&mut NoopEventSink), TickOutcome::Continue);

        let mut tally = LevelTally::default();
        assert_eq!(orchestrator.tick(&mut tally), TickOutcome::Continue);

        assert_eq!(tally.unavailable, 1);
        assert_eq!(tally.debug, 1);
        assert_eq!(tally.above_debug, 0);
        assert_eq!(orchestrator.devices().uplink.0, 0);
        assert_eq!(orchestrator.devices().display.flushes, 1);
        assert_eq!(orchestrator.devices().power.switched_off, 0);
    }
}
