//! Power telemetry samples and the change-detection display updater.
//!
//! A [`TelemetrySample`] is re-created every tick and compared field by field
//! against the previous one. Only a difference in any field triggers a redraw,
//! and a redraw always repaints all four lines. The lines themselves are
//! rendered into fixed-capacity buffers so the steady-state loop never
//! allocates.

use core::fmt::Write;

use heapless::String;

/// Maximum number of bytes a single display line may hold.
pub const DISPLAY_LINE_CAPACITY: usize = 20;

/// Fixed-capacity text buffer for one display line.
pub type DisplayLine = String<DISPLAY_LINE_CAPACITY>;

/// Left edge for every telemetry line, in pixels.
pub const DISPLAY_LINE_X: u8 = 0;

/// One reading of the power-management chip.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct TelemetrySample {
    pub battery_voltage_mv: u16,
    pub charge_current_ma: u16,
    pub discharge_current_ma: u16,
    pub charge_capacity_mah: u32,
}

impl TelemetrySample {
    /// Sentinel compared against on the first tick so that tick always redraws.
    pub const UNKNOWN: Self = Self {
        battery_voltage_mv: u16::MAX,
        charge_current_ma: u16::MAX,
        discharge_current_ma: u16::MAX,
        charge_capacity_mah: u32::MAX,
    };

    #[must_use]
    pub const fn new(
        battery_voltage_mv: u16,
        charge_current_ma: u16,
        discharge_current_ma: u16,
        charge_capacity_mah: u32,
    ) -> Self {
        Self {
            battery_voltage_mv,
            charge_current_ma,
            discharge_current_ma,
            charge_capacity_mah,
        }
    }

    /// Returns `true` when every field still holds the sentinel value.
    #[must_use]
    pub const fn is_unknown(&self) -> bool {
        self.battery_voltage_mv == u16::MAX
            && self.charge_current_ma == u16::MAX
            && self.discharge_current_ma == u16::MAX
            && self.charge_capacity_mah == u32::MAX
    }
}

impl Default for TelemetrySample {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

/// Result of comparing two consecutive samples.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DisplayDecision {
    Update,
    Skip,
}

/// Decides whether the display must be redrawn for `current`.
///
/// Equality is exact across all four fields; there is no tolerance band.
#[must_use]
pub fn display_decision(previous: &TelemetrySample, current: &TelemetrySample) -> DisplayDecision {
    if previous == current {
        DisplayDecision::Skip
    } else {
        DisplayDecision::Update
    }
}

/// Remembers the previous sample and gates display I/O on changes.
#[derive(Clone, Debug)]
pub struct ChangeDetector {
    previous: TelemetrySample,
}

impl ChangeDetector {
    /// Creates a detector primed with [`TelemetrySample::UNKNOWN`].
    #[must_use]
    pub const fn new() -> Self {
        Self {
            previous: TelemetrySample::UNKNOWN,
        }
    }

    /// Compares `current` with the previous sample, then stores `current`
    /// as the new previous sample whether or not it changed.
    pub fn observe(&mut self, current: TelemetrySample) -> DisplayDecision {
        let decision = display_decision(&self.previous, &current);
        self.previous = current;
        decision
    }

    /// Returns the most recently observed sample.
    #[must_use]
    pub const fn previous(&self) -> &TelemetrySample {
        &self.previous
    }
}

impl Default for ChangeDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// The four telemetry fields drawn on the display, top to bottom.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DisplayField {
    BatteryVoltage,
    ChargeCurrent,
    DischargeCurrent,
    ChargeCapacity,
}

/// Draw order for a full redraw.
pub const DISPLAY_FIELDS: [DisplayField; 4] = [
    DisplayField::BatteryVoltage,
    DisplayField::ChargeCurrent,
    DisplayField::DischargeCurrent,
    DisplayField::ChargeCapacity,
];

impl DisplayField {
    /// Baseline row of the line, in pixels.
    #[must_use]
    pub const fn row(self) -> u8 {
        match self {
            DisplayField::BatteryVoltage => 15,
            DisplayField::ChargeCurrent => 30,
            DisplayField::DischargeCurrent => 45,
            DisplayField::ChargeCapacity => 60,
        }
    }

    /// Renders this field of `sample` into `line`, replacing its contents.
    pub fn render(self, sample: &TelemetrySample, line: &mut DisplayLine) {
        line.clear();
        // Widest rendering ("Cbat: 4294967295 mAh") is exactly DISPLAY_LINE_CAPACITY bytes.
        let _ = match self {
            DisplayField::BatteryVoltage => {
                write!(line, "Ubat: {:>4} mV", sample.battery_voltage_mv)
            }
            DisplayField::ChargeCurrent => {
                write!(line, "Icharge: {:>4} mA", sample.charge_current_ma)
            }
            DisplayField::DischargeCurrent => {
                write!(line, "Ibat: {:>4} mA", sample.discharge_current_ma)
            }
            DisplayField::ChargeCapacity => {
                write!(line, "Cbat: {:>5} mAh", sample.charge_capacity_mah)
            }
        };
    }
}
