//! AXP192 power-management adapter.
//!
//! One driver type backs two capabilities: [`TelemetryReader`] (battery ADC
//! and coulomb counter) and [`PowerRailControl`] (regulator outputs). The
//! runtime builds one instance per capability on separate shared-bus handles.

use embedded_hal::i2c::I2c;
use tracker_core::devices::{PowerRailControl, Rail, RailState, TelemetryReader};
use tracker_core::telemetry::TelemetrySample;

/// 7-bit I2C address of the AXP192.
pub const AXP192_ADDRESS: u8 = 0x34;

const REG_POWER_OUTPUT_CONTROL: u8 = 0x12;
const REG_DCDC1_VOLTAGE: u8 = 0x26;
const REG_LDO23_VOLTAGE: u8 = 0x28;
const REG_WAKEUP_CONTROL: u8 = 0x31;
const REG_BATTERY_VOLTAGE: u8 = 0x78;
const REG_CHARGE_CURRENT: u8 = 0x7A;
const REG_DISCHARGE_CURRENT: u8 = 0x7C;
const REG_ADC_ENABLE_1: u8 = 0x82;
const REG_COULOMB_CHARGE: u8 = 0xB0;
const REG_COULOMB_DISCHARGE: u8 = 0xB4;
const REG_COULOMB_CONTROL: u8 = 0xB8;

const ADC_BATTERY_CURRENT: u8 = 1 << 6;
const COULOMB_ENABLE: u8 = 1 << 7;
const WAKEUP_ENABLE: u8 = 1 << 3;

/// Rail voltage for the GNSS receiver.
pub const LDO3_MILLIVOLTS: u16 = 3_300;
/// Rail voltage for the OLED.
pub const DCDC1_MILLIVOLTS: u16 = 2_500;

/// One step of the board power-up plan.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PowerUpStep {
    Ldo3Voltage(u16),
    Dcdc1Voltage(u16),
    RailOn(Rail),
    PowerOnWakeup,
    BatteryCurrentAdc,
    CoulombCounter,
}

/// Rails and measurement blocks enabled before the duty cycle starts.
pub const POWER_UP_PLAN: [PowerUpStep; 8] = [
    PowerUpStep::Ldo3Voltage(LDO3_MILLIVOLTS),
    PowerUpStep::RailOn(Rail::Position),
    PowerUpStep::Dcdc1Voltage(DCDC1_MILLIVOLTS),
    PowerUpStep::RailOn(Rail::Display),
    PowerUpStep::RailOn(Rail::Radio),
    PowerUpStep::PowerOnWakeup,
    PowerUpStep::BatteryCurrentAdc,
    PowerUpStep::CoulombCounter,
];

const fn output_bit(rail: Rail) -> u8 {
    match rail {
        Rail::Display => 1 << 0,
        Rail::Radio => 1 << 2,
        Rail::Position => 1 << 3,
    }
}

/// Battery voltage: 12-bit ADC at 1.1 mV/LSB.
#[must_use]
pub fn battery_millivolts(raw: [u8; 2]) -> u16 {
    let counts = (u32::from(raw[0]) << 4) | u32::from(raw[1] & 0x0F);
    u16::try_from(counts * 11 / 10).unwrap_or(u16::MAX)
}

/// Battery current: 13-bit ADC at 0.5 mA/LSB.
#[must_use]
pub fn battery_milliamps(raw: [u8; 2]) -> u16 {
    let counts = (u16::from(raw[0]) << 5) | u16::from(raw[1] & 0x1F);
    counts / 2
}

/// Net charge in mAh from the coulomb counters, clamped at zero.
///
/// `65536 * 0.5 * (charge - discharge) / 3600 / 25`
#[must_use]
pub fn coulomb_milliamp_hours(charge: u32, discharge: u32) -> u32 {
    let net = i64::from(charge) - i64::from(discharge);
    let mah = net * 32_768 / 90_000;
    u32::try_from(mah.max(0)).unwrap_or(u32::MAX)
}

/// DCDC1 output: 700 mV plus 25 mV steps.
fn dcdc1_setting(millivolts: u16) -> u8 {
    let steps = (millivolts.saturating_sub(700) / 25).min(0x7F);
    u8::try_from(steps).unwrap_or(0x7F)
}

/// LDO2/LDO3 output: 1800 mV plus 100 mV steps.
fn ldo_setting(millivolts: u16) -> u8 {
    let steps = (millivolts.saturating_sub(1_800) / 100).min(0x0F);
    u8::try_from(steps).unwrap_or(0x0F)
}

/// Register-level AXP192 access over a blocking I2C handle.
pub struct Axp192<I2C> {
    bus: Option<I2C>,
}

impl<I2C: I2c> Axp192<I2C> {
    pub const fn new(bus: I2C) -> Self {
        Self { bus: Some(bus) }
    }

    /// Returns `true` once [`PowerRailControl::release`] has dropped the bus.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.bus.is_none()
    }

    /// Runs [`POWER_UP_PLAN`] in order.
    ///
    /// # Errors
    ///
    /// Returns the first bus error; later steps are not attempted.
    pub fn apply_power_up(&mut self) -> Result<(), I2C::Error> {
        for step in POWER_UP_PLAN {
            self.apply(step)?;
        }
        Ok(())
    }

    fn apply(&mut self, step: PowerUpStep) -> Result<(), I2C::Error> {
        match step {
            PowerUpStep::Ldo3Voltage(mv) => {
                self.update(REG_LDO23_VOLTAGE, 0x0F, ldo_setting(mv))
            }
            PowerUpStep::Dcdc1Voltage(mv) => {
                self.update(REG_DCDC1_VOLTAGE, 0x7F, dcdc1_setting(mv))
            }
            PowerUpStep::RailOn(rail) => self.set_output(rail, RailState::On),
            PowerUpStep::PowerOnWakeup => {
                self.update(REG_WAKEUP_CONTROL, WAKEUP_ENABLE, WAKEUP_ENABLE)
            }
            PowerUpStep::BatteryCurrentAdc => {
                self.update(REG_ADC_ENABLE_1, ADC_BATTERY_CURRENT, ADC_BATTERY_CURRENT)
            }
            PowerUpStep::CoulombCounter => {
                self.update(REG_COULOMB_CONTROL, COULOMB_ENABLE, COULOMB_ENABLE)
            }
        }
    }

    fn set_output(&mut self, rail: Rail, state: RailState) -> Result<(), I2C::Error> {
        let bit = output_bit(rail);
        let value = match state {
            RailState::On => bit,
            RailState::Off => 0,
        };
        self.update(REG_POWER_OUTPUT_CONTROL, bit, value)
    }

    /// Read-modify-write of the bits selected by `mask`.
    fn update(&mut self, register: u8, mask: u8, value: u8) -> Result<(), I2C::Error> {
        let Some(bus) = self.bus.as_mut() else {
            return Ok(());
        };
        let mut current = [0u8];
        bus.write_read(AXP192_ADDRESS, &[register], &mut current)?;
        let next = (current[0] & !mask) | (value & mask);
        bus.write(AXP192_ADDRESS, &[register, next])
    }

    fn read<const N: usize>(&mut self, register: u8) -> Result<[u8; N], I2C::Error> {
        let mut buffer = [0u8; N];
        if let Some(bus) = self.bus.as_mut() {
            bus.write_read(AXP192_ADDRESS, &[register], &mut buffer)?;
        }
        Ok(buffer)
    }

    fn read_coulomb(&mut self, register: u8) -> u32 {
        self.read::<4>(register).map_or(0, u32::from_be_bytes)
    }
}

impl<I2C: I2c> TelemetryReader for Axp192<I2C> {
    /// Bus errors read as zero.
    fn sample(&mut self) -> TelemetrySample {
        let voltage = self
            .read::<2>(REG_BATTERY_VOLTAGE)
            .map_or(0, battery_millivolts);
        let charge = self
            .read::<2>(REG_CHARGE_CURRENT)
            .map_or(0, battery_milliamps);
        let discharge = self
            .read::<2>(REG_DISCHARGE_CURRENT)
            .map_or(0, battery_milliamps);
        let capacity = coulomb_milliamp_hours(
            self.read_coulomb(REG_COULOMB_CHARGE),
            self.read_coulomb(REG_COULOMB_DISCHARGE),
        );

        TelemetrySample::new(voltage, charge, discharge, capacity)
    }
}

impl<I2C: I2c> PowerRailControl for Axp192<I2C> {
    fn set_rail_state(&mut self, rail: Rail, state: RailState) {
        if self.set_output(rail, state).is_err() {
            crate::log::pmu_write_failed(rail.regulator());
        }
    }

    fn release(&mut self) {
        self.bus = None;
    }
}
