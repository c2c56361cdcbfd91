//! Position fixes forwarded to the uplink.
//!
//! The orchestrator treats a fix as an opaque blob and sends it byte for
//! byte. The blob is the UBX NAV-POSLLH payload produced by the receiver, so
//! a few read-only accessors are provided for logging and the emulator.

use core::fmt;

/// Size of the geodetic solution blob (UBX NAV-POSLLH payload).
pub const POSITION_FIX_LEN: usize = 28;

/// Opaque geodetic position solution.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PositionFix {
    bytes: [u8; POSITION_FIX_LEN],
}

impl PositionFix {
    /// Wraps a raw solution blob.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; POSITION_FIX_LEN]) -> Self {
        Self { bytes }
    }

    /// Packs individual NAV-POSLLH fields (little-endian) into a fix.
    ///
    /// Angles are in 1e-7 degrees, heights in millimetres, accuracies in
    /// millimetres and `itow_ms` is GPS time of week.
    #[must_use]
    pub fn from_posllh(
        itow_ms: u32,
        lon_e7: i32,
        lat_e7: i32,
        height_mm: i32,
        height_msl_mm: i32,
        horizontal_accuracy_mm: u32,
        vertical_accuracy_mm: u32,
    ) -> Self {
        let mut bytes = [0u8; POSITION_FIX_LEN];
        bytes[0..4].copy_from_slice(&itow_ms.to_le_bytes());
        bytes[4..8].copy_from_slice(&lon_e7.to_le_bytes());
        bytes[8..12].copy_from_slice(&lat_e7.to_le_bytes());
        bytes[12..16].copy_from_slice(&height_mm.to_le_bytes());
        bytes[16..20].copy_from_slice(&height_msl_mm.to_le_bytes());
        bytes[20..24].copy_from_slice(&horizontal_accuracy_mm.to_le_bytes());
        bytes[24..28].copy_from_slice(&vertical_accuracy_mm.to_le_bytes());
        Self { bytes }
    }

    /// Returns the raw solution blob.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; POSITION_FIX_LEN] {
        &self.bytes
    }

    #[must_use]
    pub fn longitude_e7(&self) -> i32 {
        i32::from_le_bytes(self.word(4))
    }

    #[must_use]
    pub fn latitude_e7(&self) -> i32 {
        i32::from_le_bytes(self.word(8))
    }

    #[must_use]
    pub fn height_msl_mm(&self) -> i32 {
        i32::from_le_bytes(self.word(16))
    }

    fn word(&self, offset: usize) -> [u8; 4] {
        [
            self.bytes[offset],
            self.bytes[offset + 1],
            self.bytes[offset + 2],
            self.bytes[offset + 3],
        ]
    }
}

/// Reasons a position fix could not be produced.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PositionError {
    /// The receiver answered but has no valid solution yet.
    NoFix,
    /// The receiver did not answer within the read budget.
    Timeout,
    /// The receiver answered with a frame that failed validation.
    Malformed,
}

impl fmt::Display for PositionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionError::NoFix => f.write_str("no-fix"),
            PositionError::Timeout => f.write_str("timeout"),
            PositionError::Malformed => f.write_str("malformed"),
        }
    }
}
