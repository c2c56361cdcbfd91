//! Restart countdown used when startup cannot continue.
//!
//! If the orchestrator task cannot be launched the board announces a short
//! countdown, one value per second, and then performs a software reset.

/// First value of the countdown.
pub const RESTART_COUNTDOWN_START: u8 = 10;

/// Yields `RESTART_COUNTDOWN_START` down to zero inclusive.
#[derive(Clone, Debug)]
pub struct RestartCountdown {
    next: Option<u8>,
}

impl RestartCountdown {
    #[must_use]
    pub const fn new() -> Self {
        Self::starting_at(RESTART_COUNTDOWN_START)
    }

    #[must_use]
    pub const fn starting_at(start: u8) -> Self {
        Self { next: Some(start) }
    }
}

impl Default for RestartCountdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for RestartCountdown {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        let current = self.next?;
        self.next = current.checked_sub(1);
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.next.map_or(0, |value| usize::from(value) + 1);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for RestartCountdown {}

impl core::iter::FusedIterator for RestartCountdown {}
