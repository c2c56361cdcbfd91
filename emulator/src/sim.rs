//! Simulated T-Beam peripherals for the host emulator.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracker_core::devices::{
    DisplaySink, PositionReader, PowerRailControl, Rail, RailState, StackGauge, TelemetryReader,
    UplinkTransport,
};
use tracker_core::position::{PositionError, PositionFix};
use tracker_core::telemetry::TelemetrySample;

use crate::session::{Console, TranscriptRole};

const FULL_VOLTAGE_UV: u64 = 4_150_000;
const EMPTY_VOLTAGE_UV: u64 = 3_300_000;
const VOLTAGE_DROP_PER_MAH_UV: u64 = 700;
const ACTIVE_LOAD_MA: u64 = 125;
const SLEEP_LOAD_MA: u64 = 2;
const INITIAL_CAPACITY_MAH: u64 = 1_800;
const STACK_SIZE: u32 = 8 * 1024;
const STACK_FLOOR: u32 = 1_024;

/// Discharging cell seen through the PMU registers.
///
/// Survives deep sleep: the emulator keeps one model for the whole session
/// and only rebuilds the orchestrator on every wake.
#[derive(Debug)]
pub struct BatteryModel {
    rng: StdRng,
    consumed_uah: u64,
    load_jitter_ma: u64,
}

impl BatteryModel {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            consumed_uah: 0,
            load_jitter_ma: 0,
        }
    }

    /// Draws active current for one tick and returns the resulting reading.
    pub fn step(&mut self, tick_period: Duration) -> TelemetrySample {
        if self.rng.gen_ratio(1, 5) {
            self.load_jitter_ma = self.rng.gen_range(0..9);
        }
        let load_ma = ACTIVE_LOAD_MA + self.load_jitter_ma;
        self.consume(load_ma, tick_period);
        self.reading(load_ma)
    }

    /// Drains the sleep current for the whole sleep window.
    pub fn rest(&mut self, duration: Duration) {
        self.consume(SLEEP_LOAD_MA, duration);
    }

    pub fn consumed_mah(&self) -> u64 {
        self.consumed_uah / 1_000
    }

    fn consume(&mut self, load_ma: u64, duration: Duration) {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        let uah = load_ma.saturating_mul(millis) / 3_600;
        self.consumed_uah = self.consumed_uah.saturating_add(uah);
    }

    fn reading(&self, load_ma: u64) -> TelemetrySample {
        let consumed_mah = self.consumed_mah();
        let voltage_uv = FULL_VOLTAGE_UV
            .saturating_sub(consumed_mah * VOLTAGE_DROP_PER_MAH_UV)
            .max(EMPTY_VOLTAGE_UV);
        let remaining_mah = INITIAL_CAPACITY_MAH.saturating_sub(consumed_mah);

        TelemetrySample::new(
            u16::try_from(voltage_uv / 1_000).unwrap_or(u16::MAX),
            0,
            u16::try_from(load_ma).unwrap_or(u16::MAX),
            u32::try_from(remaining_mah).unwrap_or(u32::MAX),
        )
    }
}

pub struct SimTelemetry {
    battery: Rc<RefCell<BatteryModel>>,
    tick_period: Duration,
}

impl SimTelemetry {
    pub fn new(battery: Rc<RefCell<BatteryModel>>, tick_period: Duration) -> Self {
        Self {
            battery,
            tick_period,
        }
    }
}

impl TelemetryReader for SimTelemetry {
    fn sample(&mut self) -> TelemetrySample {
        self.battery.borrow_mut().step(self.tick_period)
    }
}

/// GNSS receiver that wanders around a start point and misses every
/// `failure_every`-th poll.
#[derive(Debug)]
pub struct GpsModel {
    rng: StdRng,
    polls: u64,
    failure_every: u64,
    lon_e7: i32,
    lat_e7: i32,
}

impl GpsModel {
    pub fn new(seed: u64, failure_every: u32) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed.rotate_left(17)),
            polls: 0,
            failure_every: u64::from(failure_every),
            lon_e7: 44_894_800,
            lat_e7: 509_873_900,
        }
    }

    pub fn poll(&mut self, now: Duration) -> Result<PositionFix, PositionError> {
        self.polls += 1;
        if self.failure_every != 0 && self.polls.is_multiple_of(self.failure_every) {
            return Err(PositionError::NoFix);
        }

        let drift: i32 = self.rng.gen_range(-20..=20);
        self.lon_e7 = self.lon_e7.saturating_add(drift);
        self.lat_e7 = self.lat_e7.saturating_sub(drift / 2);
        let itow_ms = u32::try_from(now.as_millis() % 604_800_000).unwrap_or(0);

        Ok(PositionFix::from_posllh(
            itow_ms,
            self.lon_e7,
            self.lat_e7,
            118_000,
            71_400,
            2_500,
            3_900,
        ))
    }
}

pub struct SimPosition {
    gps: Rc<RefCell<GpsModel>>,
    console: Rc<RefCell<Console>>,
}

impl SimPosition {
    pub fn new(gps: Rc<RefCell<GpsModel>>, console: Rc<RefCell<Console>>) -> Self {
        Self { gps, console }
    }
}

impl PositionReader for SimPosition {
    fn fix(&mut self) -> Result<PositionFix, PositionError> {
        let now = self.console.borrow().clock();
        self.gps.borrow_mut().poll(now)
    }
}

/// Prints the frame buffer when it is flushed.
pub struct ConsoleDisplay {
    console: Rc<RefCell<Console>>,
    lines: Vec<(u8, String)>,
}

impl ConsoleDisplay {
    pub fn new(console: Rc<RefCell<Console>>) -> Self {
        Self {
            console,
            lines: Vec::with_capacity(4),
        }
    }
}

impl DisplaySink for ConsoleDisplay {
    fn clear(&mut self) {
        self.lines.clear();
    }

    fn draw_line(&mut self, _x: u8, y: u8, text: &str) {
        self.lines.push((y, text.to_owned()));
    }

    fn flush(&mut self) {
        let mut console = self.console.borrow_mut();
        for (row, text) in &self.lines {
            console.emit(TranscriptRole::Display, &format!("[y={row:>2}] {text}"));
        }
    }

    fn power_off(&mut self) {
        self.lines.clear();
        self.console
            .borrow_mut()
            .emit(TranscriptRole::Device, "oled: display off");
    }
}

/// Hex-dumps every frame handed to the radio.
pub struct HexUplink {
    console: Rc<RefCell<Console>>,
}

impl HexUplink {
    pub fn new(console: Rc<RefCell<Console>>) -> Self {
        Self { console }
    }
}

impl UplinkTransport for HexUplink {
    fn send(&mut self, payload: &[u8], port: u8, confirmed: bool) {
        let mode = if confirmed { "confirmed" } else { "unconfirmed" };
        let line = format!("radio: port={port} {mode} {}", hex(payload));
        self.console.borrow_mut().emit(TranscriptRole::Device, &line);
    }
}

pub struct SimRails {
    console: Rc<RefCell<Console>>,
}

impl SimRails {
    pub fn new(console: Rc<RefCell<Console>>) -> Self {
        Self { console }
    }
}

impl PowerRailControl for SimRails {
    fn set_rail_state(&mut self, rail: Rail, state: RailState) {
        let state = match state {
            RailState::On => "on",
            RailState::Off => "off",
        };
        let line = format!("pmu: {} {state}", rail.regulator());
        self.console.borrow_mut().emit(TranscriptRole::Device, &line);
    }

    fn release(&mut self) {
        self.console
            .borrow_mut()
            .emit(TranscriptRole::Device, "pmu: driver released");
    }
}

/// Stack margin that occasionally shrinks as deeper call paths are hit.
pub struct SimStack {
    rng: StdRng,
    remaining: u32,
}

impl SimStack {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed.rotate_right(9)),
            remaining: STACK_SIZE / 2,
        }
    }
}

impl StackGauge for SimStack {
    fn task_name(&self) -> &'static str {
        "duty-cycle"
    }

    fn remaining_stack(&mut self) -> u32 {
        if self.rng.gen_ratio(1, 20) {
            let used = self.rng.gen_range(0..64u32) & !3;
            self.remaining = self.remaining.saturating_sub(used).max(STACK_FLOOR);
        }
        self.remaining
    }
}

fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write as _;

    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}
