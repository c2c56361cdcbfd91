//! NEO-6 GNSS adapter speaking UBX over the board UART.
//!
//! Each transmit window polls one NAV-POSLLH solution. The receiver also
//! streams NMEA sentences on the same port; the frame parser skips anything
//! that is not UBX, so the reply may trail a full NMEA burst (several
//! hundred bytes at 9600 baud). Waiting is bounded by [`READ_BUDGET_MS`] of
//! wall-clock time measured on the injected clock.

use embedded_hal::delay::DelayNs;
use embedded_io::{Read, ReadReady, Write};
use heapless::Vec;
use tracker_core::devices::PositionReader;
use tracker_core::position::{POSITION_FIX_LEN, PositionError, PositionFix};

pub const UBX_SYNC: [u8; 2] = [0xB5, 0x62];
pub const CLASS_NAV: u8 = 0x01;
pub const ID_POSLLH: u8 = 0x02;

/// Largest payload kept by the parser; longer frames are skipped.
pub const MAX_UBX_PAYLOAD: usize = 64;

/// Upper bound on time spent waiting for the answer to one poll.
///
/// Covers one 1 Hz NMEA epoch ahead of the reply while staying under the
/// one-second tick.
pub const READ_BUDGET_MS: u64 = 900;

/// Empty-payload poll request for NAV-POSLLH.
pub const POSLLH_POLL: [u8; 8] = poll_frame(CLASS_NAV, ID_POSLLH);

/// 8-bit Fletcher checksum over class, id, length and payload.
#[must_use]
pub const fn checksum(bytes: &[u8]) -> [u8; 2] {
    let mut a: u8 = 0;
    let mut b: u8 = 0;
    let mut index = 0;
    while index < bytes.len() {
        a = a.wrapping_add(bytes[index]);
        b = b.wrapping_add(a);
        index += 1;
    }
    [a, b]
}

/// Builds a zero-length poll frame for `class`/`id`.
#[must_use]
pub const fn poll_frame(class: u8, id: u8) -> [u8; 8] {
    let [ck_a, ck_b] = checksum(&[class, id, 0, 0]);
    [UBX_SYNC[0], UBX_SYNC[1], class, id, 0, 0, ck_a, ck_b]
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum UbxError {
    Checksum,
    /// Payload longer than [`MAX_UBX_PAYLOAD`]; consumed but not kept.
    Oversize,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UbxFrame {
    pub class: u8,
    pub id: u8,
    pub payload: Vec<u8, MAX_UBX_PAYLOAD>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum ParseState {
    Sync1,
    Sync2,
    Class,
    Id,
    LengthLow,
    LengthHigh,
    Payload,
    ChecksumA,
    ChecksumB,
}

/// Byte-at-a-time UBX frame parser.
#[derive(Clone, Debug)]
pub struct UbxParser {
    state: ParseState,
    class: u8,
    id: u8,
    length: u16,
    received: u16,
    running: [u8; 2],
    checksum_a: u8,
    payload: Vec<u8, MAX_UBX_PAYLOAD>,
    oversize: bool,
}

impl Default for UbxParser {
    fn default() -> Self {
        Self::new()
    }
}

impl UbxParser {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: ParseState::Sync1,
            class: 0,
            id: 0,
            length: 0,
            received: 0,
            running: [0, 0],
            checksum_a: 0,
            payload: Vec::new(),
            oversize: false,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    fn accumulate(&mut self, byte: u8) {
        self.running[0] = self.running[0].wrapping_add(byte);
        self.running[1] = self.running[1].wrapping_add(self.running[0]);
    }

    /// Feeds one byte; yields a result whenever a frame ends.
    pub fn push(&mut self, byte: u8) -> Option<Result<UbxFrame, UbxError>> {
        match self.state {
            ParseState::Sync1 => {
                if byte == UBX_SYNC[0] {
                    self.state = ParseState::Sync2;
                }
            }
            ParseState::Sync2 => {
                self.state = match byte {
                    b if b == UBX_SYNC[1] => ParseState::Class,
                    b if b == UBX_SYNC[0] => ParseState::Sync2,
                    _ => ParseState::Sync1,
                };
            }
            ParseState::Class => {
                self.running = [0, 0];
                self.accumulate(byte);
                self.class = byte;
                self.state = ParseState::Id;
            }
            ParseState::Id => {
                self.accumulate(byte);
                self.id = byte;
                self.state = ParseState::LengthLow;
            }
            ParseState::LengthLow => {
                self.accumulate(byte);
                self.length = u16::from(byte);
                self.state = ParseState::LengthHigh;
            }
            ParseState::LengthHigh => {
                self.accumulate(byte);
                self.length |= u16::from(byte) << 8;
                self.received = 0;
                self.payload.clear();
                self.oversize = usize::from(self.length) > MAX_UBX_PAYLOAD;
                self.state = if self.length == 0 {
                    ParseState::ChecksumA
                } else {
                    ParseState::Payload
                };
            }
            ParseState::Payload => {
                self.accumulate(byte);
                if !self.oversize {
                    let _ = self.payload.push(byte);
                }
                self.received += 1;
                if self.received == self.length {
                    self.state = ParseState::ChecksumA;
                }
            }
            ParseState::ChecksumA => {
                self.checksum_a = byte;
                self.state = ParseState::ChecksumB;
            }
            ParseState::ChecksumB => {
                self.state = ParseState::Sync1;
                if [self.checksum_a, byte] != self.running {
                    return Some(Err(UbxError::Checksum));
                }
                if self.oversize {
                    return Some(Err(UbxError::Oversize));
                }
                return Some(Ok(UbxFrame {
                    class: self.class,
                    id: self.id,
                    payload: core::mem::take(&mut self.payload),
                }));
            }
        }
        None
    }
}

/// Validates a NAV-POSLLH payload and wraps it as a fix.
///
/// The receiver reports zero coordinates until it has a solution.
///
/// # Errors
///
/// `Malformed` when the payload is not 28 bytes, `NoFix` for a zero position.
pub fn decode_posllh(payload: &[u8]) -> Result<PositionFix, PositionError> {
    let bytes: [u8; POSITION_FIX_LEN] = payload
        .try_into()
        .map_err(|_| PositionError::Malformed)?;
    let fix = PositionFix::from_bytes(bytes);
    if fix.latitude_e7() == 0 && fix.longitude_e7() == 0 {
        return Err(PositionError::NoFix);
    }
    Ok(fix)
}

/// [`PositionReader`] backed by a u-blox NEO-6 on a byte stream.
///
/// `clock` returns monotonic milliseconds.
pub struct Neo6<U, D, C> {
    uart: U,
    delay: D,
    clock: C,
    parser: UbxParser,
}

impl<U, D, C> Neo6<U, D, C>
where
    U: Read + Write + ReadReady,
    D: DelayNs,
    C: Fn() -> u64,
{
    pub const fn new(uart: U, delay: D, clock: C) -> Self {
        Self {
            uart,
            delay,
            clock,
            parser: UbxParser::new(),
        }
    }

    fn elapsed_since(&self, started: u64) -> u64 {
        (self.clock)().saturating_sub(started)
    }

    fn poll_posllh(&mut self) -> Result<PositionFix, PositionError> {
        self.parser.reset();
        self.uart
            .write_all(&POSLLH_POLL)
            .map_err(|_| PositionError::Timeout)?;
        self.uart.flush().map_err(|_| PositionError::Timeout)?;

        let started = (self.clock)();
        let mut chunk = [0u8; 32];
        while self.elapsed_since(started) < READ_BUDGET_MS {
            if !self.uart.read_ready().map_err(|_| PositionError::Timeout)? {
                self.delay.delay_ms(1);
                continue;
            }

            let count = self
                .uart
                .read(&mut chunk)
                .map_err(|_| PositionError::Timeout)?;
            for &byte in &chunk[..count] {
                match self.parser.push(byte) {
                    Some(Ok(frame)) if frame.class == CLASS_NAV && frame.id == ID_POSLLH => {
                        return decode_posllh(&frame.payload);
                    }
                    Some(Err(UbxError::Checksum)) => return Err(PositionError::Malformed),
                    _ => {}
                }
            }
        }

        Err(PositionError::Timeout)
    }
}

impl<U, D, C> PositionReader for Neo6<U, D, C>
where
    U: Read + Write + ReadReady,
    D: DelayNs,
    C: Fn() -> u64,
{
    fn fix(&mut self) -> Result<PositionFix, PositionError> {
        self.poll_posllh()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use std::cell::Cell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    type SimClock = Rc<Cell<u64>>;

    /// Receive line that releases one byte every `ms_per_byte` simulated
    /// milliseconds (all at once when zero).
    struct PacedUart {
        now: SimClock,
        rx: VecDeque<u8>,
        consumed: u64,
        ms_per_byte: u64,
        tx: std::vec::Vec<u8>,
    }

    impl PacedUart {
        fn new(now: &SimClock, bytes: &[u8], ms_per_byte: u64) -> Self {
            Self {
                now: Rc::clone(now),
                rx: bytes.iter().copied().collect(),
                consumed: 0,
                ms_per_byte,
                tx: std::vec::Vec::new(),
            }
        }

        fn next_arrived(&self) -> bool {
            !self.rx.is_empty() && self.now.get() >= (self.consumed + 1) * self.ms_per_byte
        }
    }

    impl embedded_io::ErrorType for PacedUart {
        type Error = Infallible;
    }

    impl Read for PacedUart {
        fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
            let mut count = 0;
            while count < buf.len() && self.next_arrived() {
                if let Some(byte) = self.rx.pop_front() {
                    buf[count] = byte;
                    count += 1;
                    self.consumed += 1;
                }
            }
            Ok(count)
        }
    }

    impl ReadReady for PacedUart {
        fn read_ready(&mut self) -> Result<bool, Self::Error> {
            Ok(self.next_arrived())
        }
    }

    impl Write for PacedUart {
        fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
            self.tx.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    struct SimDelay(SimClock);

    impl DelayNs for SimDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.0.set(self.0.get() + u64::from(ns / 1_000_000));
        }
    }

    type TestGps = Neo6<PacedUart, SimDelay, std::boxed::Box<dyn Fn() -> u64>>;

    fn receiver(bytes: &[u8], ms_per_byte: u64) -> (TestGps, SimClock) {
        let now = SimClock::default();
        let reader = Rc::clone(&now);
        let gps = Neo6::new(
            PacedUart::new(&now, bytes, ms_per_byte),
            SimDelay(Rc::clone(&now)),
            std::boxed::Box::new(move || reader.get()) as std::boxed::Box<dyn Fn() -> u64>,
        );
        (gps, now)
    }

    fn posllh_frame(fix: &PositionFix) -> std::vec::Vec<u8> {
        let mut body = vec![CLASS_NAV, ID_POSLLH, 28, 0];
        body.extend_from_slice(fix.as_bytes());
        let [a, b] = checksum(&body);

        let mut frame = UBX_SYNC.to_vec();
        frame.extend_from_slice(&body);
        frame.extend_from_slice(&[a, b]);
        frame
    }

    fn field_fix() -> PositionFix {
        PositionFix::from_posllh(1_000, 44_894_800, 509_873_900, 118_000, 71_400, 2_500, 3_900)
    }

    fn nmea_burst(len: usize) -> std::vec::Vec<u8> {
        b"$GPGSV,3,1,11,02,45,123,30,05,60,210,35,12,15,045,22*7A\r\n"
            .iter()
            .copied()
            .cycle()
            .take(len)
            .collect()
    }

    #[test]
    fn poll_frame_matches_reference_bytes() {
        assert_eq!(POSLLH_POLL, [0xB5, 0x62, 0x01, 0x02, 0x00, 0x00, 0x03, 0x0A]);
    }

    #[test]
    fn reads_solution_after_nmea_noise() {
        let fix = field_fix();
        let mut rx = b"$GPGGA,,,,,,0,00*66\r\n".to_vec();
        rx.extend(posllh_frame(&fix));

        let (mut gps, _) = receiver(&rx, 0);
        assert_eq!(gps.fix(), Ok(fix));
        assert_eq!(gps.uart.tx.as_slice(), &POSLLH_POLL);
    }

    #[test]
    fn reply_behind_a_full_nmea_burst_at_line_rate_is_found() {
        let fix = field_fix();
        let mut rx = nmea_burst(310);
        rx.extend(posllh_frame(&fix));

        let (mut gps, now) = receiver(&rx, 1);
        assert_eq!(gps.fix(), Ok(fix));
        assert!(now.get() >= 346);
        assert!(now.get() < READ_BUDGET_MS);
    }

    #[test]
    fn endless_nmea_stream_times_out_on_wall_clock() {
        let (mut gps, now) = receiver(&nmea_burst(2_000), 1);
        assert_eq!(gps.fix(), Err(PositionError::Timeout));
        assert_eq!(now.get(), READ_BUDGET_MS);
    }

    #[test]
    fn corrupted_checksum_is_malformed() {
        let mut frame = posllh_frame(&field_fix());
        let last = frame.len() - 1;
        frame[last] ^= 0xFF;

        let (mut gps, _) = receiver(&frame, 0);
        assert_eq!(gps.fix(), Err(PositionError::Malformed));
    }

    #[test]
    fn silent_receiver_times_out_within_budget() {
        let (mut gps, now) = receiver(&[], 0);
        assert_eq!(gps.fix(), Err(PositionError::Timeout));
        assert_eq!(now.get(), READ_BUDGET_MS);
    }

    #[test]
    fn zero_coordinates_mean_no_fix() {
        let empty = PositionFix::from_bytes([0; POSITION_FIX_LEN]);
        let (mut gps, _) = receiver(&posllh_frame(&empty), 0);
        assert_eq!(gps.fix(), Err(PositionError::NoFix));
    }

    #[test]
    fn oversize_frames_are_skipped() {
        let mut parser = UbxParser::new();
        let mut outcome = None;
        let length = u8::try_from(MAX_UBX_PAYLOAD + 1).expect("fits u8");
        let mut body: std::vec::Vec<u8> = vec![0x0A, 0x04, length, 0];
        body.extend(core::iter::repeat_n(0x55, usize::from(length)));
        let [a, b] = checksum(&body);

        for byte in UBX_SYNC.iter().chain(body.iter()).chain([a, b].iter()) {
            if let Some(result) = parser.push(*byte) {
                outcome = Some(result);
            }
        }
        assert_eq!(outcome, Some(Err(UbxError::Oversize)));
    }

    #[test]
    fn payload_length_is_validated() {
        assert_eq!(decode_posllh(&[1, 2, 3]), Err(PositionError::Malformed));
    }
}
