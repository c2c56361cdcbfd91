#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use tracker_core::devices::{
    Devices, DisplaySink, PositionReader, PowerRailControl, Rail, RailState, StackGauge,
    TelemetryReader, UplinkTransport,
};
use tracker_core::events::{DutyCycleEvent, DutyCycleEventSink};
use tracker_core::orchestrator::DutyCycleOrchestrator;
use tracker_core::position::{PositionError, PositionFix};
use tracker_core::schedule::{DutyCycleConfig, TickSource};
use tracker_core::telemetry::TelemetrySample;

/// Every collaborator call, in the order the orchestrator made it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    Sample,
    Fix,
    Clear,
    Draw { x: u8, y: u8, text: String },
    Flush,
    DisplayOff,
    Send { payload: Vec<u8>, port: u8, confirmed: bool },
    Rail(Rail, RailState),
    Release,
}

pub type ActionLog = Rc<RefCell<Vec<Action>>>;

pub fn flush_count(log: &ActionLog) -> usize {
    log.borrow()
        .iter()
        .filter(|action| matches!(action, Action::Flush))
        .count()
}

pub fn sends(log: &ActionLog) -> Vec<(Vec<u8>, u8, bool)> {
    log.borrow()
        .iter()
        .filter_map(|action| match action {
            Action::Send {
                payload,
                port,
                confirmed,
            } => Some((payload.clone(), *port, *confirmed)),
            _ => None,
        })
        .collect()
}

/// Replays scripted samples and repeats the last one once exhausted.
pub struct ScriptedTelemetry {
    log: ActionLog,
    samples: Vec<TelemetrySample>,
    index: usize,
}

impl TelemetryReader for ScriptedTelemetry {
    fn sample(&mut self) -> TelemetrySample {
        self.log.borrow_mut().push(Action::Sample);
        let sample = self.samples[self.index.min(self.samples.len() - 1)];
        self.index += 1;
        sample
    }
}

/// Returns scripted results, falling back to `fallback` once exhausted.
pub struct ScriptedPosition {
    log: ActionLog,
    script: VecDeque<Result<PositionFix, PositionError>>,
    fallback: Result<PositionFix, PositionError>,
}

impl PositionReader for ScriptedPosition {
    fn fix(&mut self) -> Result<PositionFix, PositionError> {
        self.log.borrow_mut().push(Action::Fix);
        self.script.pop_front().unwrap_or(self.fallback)
    }
}

pub struct RecordingDisplay(ActionLog);

impl DisplaySink for RecordingDisplay {
    fn clear(&mut self) {
        self.0.borrow_mut().push(Action::Clear);
    }

    fn draw_line(&mut self, x: u8, y: u8, text: &str) {
        self.0.borrow_mut().push(Action::Draw {
            x,
            y,
            text: text.to_owned(),
        });
    }

    fn flush(&mut self) {
        self.0.borrow_mut().push(Action::Flush);
    }

    fn power_off(&mut self) {
        self.0.borrow_mut().push(Action::DisplayOff);
    }
}

pub struct RecordingUplink(ActionLog);

impl UplinkTransport for RecordingUplink {
    fn send(&mut self, payload: &[u8], port: u8, confirmed: bool) {
        self.0.borrow_mut().push(Action::Send {
            payload: payload.to_vec(),
            port,
            confirmed,
        });
    }
}

pub struct RecordingRails(ActionLog);

impl PowerRailControl for RecordingRails {
    fn set_rail_state(&mut self, rail: Rail, state: RailState) {
        self.0.borrow_mut().push(Action::Rail(rail, state));
    }

    fn release(&mut self) {
        self.0.borrow_mut().push(Action::Release);
    }
}

/// Replays scripted stack margins, repeating the last one.
pub struct ScriptedStack {
    readings: Vec<u32>,
    index: usize,
}

impl ScriptedStack {
    pub fn steady(remaining: u32) -> Self {
        Self::new(vec![remaining])
    }

    pub fn new(readings: Vec<u32>) -> Self {
        Self { readings, index: 0 }
    }
}

impl StackGauge for ScriptedStack {
    fn task_name(&self) -> &'static str {
        "duty-cycle"
    }

    fn remaining_stack(&mut self) -> u32 {
        let value = self.readings[self.index.min(self.readings.len() - 1)];
        self.index += 1;
        value
    }
}

/// Collects every event in order.
#[derive(Default)]
pub struct EventLog(pub Vec<DutyCycleEvent>);

impl DutyCycleEventSink for EventLog {
    fn record(&mut self, event: DutyCycleEvent) {
        self.0.push(event);
    }
}

/// Resolves immediately and remembers which ticks were awaited.
#[derive(Default)]
pub struct ManualTicker {
    pub awaited: Vec<u32>,
}

impl TickSource for ManualTicker {
    async fn wait_for_tick(&mut self, tick: u32) {
        self.awaited.push(tick);
    }
}

pub type TestOrchestrator = DutyCycleOrchestrator<
    ScriptedTelemetry,
    ScriptedPosition,
    RecordingDisplay,
    RecordingUplink,
    RecordingRails,
    ScriptedStack,
>;

pub struct Harness {
    pub log: ActionLog,
    pub orchestrator: TestOrchestrator,
}

pub fn sample_fix() -> PositionFix {
    PositionFix::from_posllh(
        345_600_000,
        -1_224_194_200,
        377_749_300,
        52_000,
        18_500,
        3_200,
        4_800,
    )
}

pub struct HarnessBuilder {
    config: DutyCycleConfig,
    samples: Vec<TelemetrySample>,
    script: VecDeque<Result<PositionFix, PositionError>>,
    fallback: Result<PositionFix, PositionError>,
    stack: ScriptedStack,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            config: DutyCycleConfig::default(),
            samples: vec![TelemetrySample::new(4_012, 0, 130, 860)],
            script: VecDeque::new(),
            fallback: Ok(sample_fix()),
            stack: ScriptedStack::steady(2_048),
        }
    }

    pub fn config(mut self, config: DutyCycleConfig) -> Self {
        self.config = config;
        self
    }

    pub fn samples(mut self, samples: Vec<TelemetrySample>) -> Self {
        self.samples = samples;
        self
    }

    pub fn fixes(mut self, script: Vec<Result<PositionFix, PositionError>>) -> Self {
        self.script = script.into();
        self
    }

    pub fn fallback_fix(mut self, fallback: Result<PositionFix, PositionError>) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn stack(mut self, stack: ScriptedStack) -> Self {
        self.stack = stack;
        self
    }

    pub fn build(self) -> Harness {
        let log: ActionLog = Rc::default();
        let devices = Devices::new(
            ScriptedTelemetry {
                log: Rc::clone(&log),
                samples: self.samples,
                index: 0,
            },
            ScriptedPosition {
                log: Rc::clone(&log),
                script: self.script,
                fallback: self.fallback,
            },
            RecordingDisplay(Rc::clone(&log)),
            RecordingUplink(Rc::clone(&log)),
            RecordingRails(Rc::clone(&log)),
        );

        Harness {
            orchestrator: DutyCycleOrchestrator::new(self.config, devices, self.stack),
            log,
        }
    }
}
