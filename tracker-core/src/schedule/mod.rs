//! Duty-cycle periods and the drift-corrected tick schedule.
//!
//! All periods hang off a single monotonic [`TickCounter`]. The transmit and
//! sleep windows are integer multiples of the tick and are evaluated with a
//! plain remainder, so no extra timers are needed. Waiting for the next tick
//! is always computed from a fixed reference instant plus `tick` periods,
//! never from "now", which keeps execution jitter from accumulating.

use core::{fmt, ops::Add, time::Duration};

/// Length of one scheduling period.
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_secs(1);
/// Every this many ticks a position fix is uplinked.
pub const DEFAULT_TRANSMIT_EVERY: u32 = 100;
/// Every this many ticks the device shuts down and deep-sleeps.
pub const DEFAULT_SLEEP_EVERY: u32 = 150;
/// Deep-sleep duration for every sleep entry.
pub const DEFAULT_SLEEP_DURATION: Duration = Duration::from_hours(1);
/// Application port used for position uplinks.
pub const DEFAULT_UPLINK_PORT: u8 = 1;

/// Reasons a [`DutyCycleConfig`] is rejected.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConfigError {
    ZeroTickPeriod,
    ZeroTransmitPeriod,
    ZeroSleepPeriod,
    /// The sleep boundary must come strictly after the transmit boundary.
    SleepNotAfterTransmit,
    ZeroSleepDuration,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroTickPeriod => f.write_str("tick period must be non-zero"),
            ConfigError::ZeroTransmitPeriod => f.write_str("transmit period must be non-zero"),
            ConfigError::ZeroSleepPeriod => f.write_str("sleep period must be non-zero"),
            ConfigError::SleepNotAfterTransmit => {
                f.write_str("sleep period must be longer than the transmit period")
            }
            ConfigError::ZeroSleepDuration => f.write_str("sleep duration must be non-zero"),
        }
    }
}

/// Fixed periods driving the orchestrator.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DutyCycleConfig {
    tick_period: Duration,
    transmit_every: u32,
    sleep_every: u32,
    sleep_duration: Duration,
    uplink_port: u8,
    uplink_confirmed: bool,
}

impl DutyCycleConfig {
    /// Validates and builds a configuration with the default uplink settings.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for zero periods or durations, or when the
    /// sleep boundary does not come after the transmit boundary.
    pub const fn new(
        tick_period: Duration,
        transmit_every: u32,
        sleep_every: u32,
        sleep_duration: Duration,
    ) -> Result<Self, ConfigError> {
        if tick_period.is_zero() {
            return Err(ConfigError::ZeroTickPeriod);
        }
        if transmit_every == 0 {
            return Err(ConfigError::ZeroTransmitPeriod);
        }
        if sleep_every == 0 {
            return Err(ConfigError::ZeroSleepPeriod);
        }
        if sleep_every <= transmit_every {
            return Err(ConfigError::SleepNotAfterTransmit);
        }
        if sleep_duration.is_zero() {
            return Err(ConfigError::ZeroSleepDuration);
        }

        Ok(Self {
            tick_period,
            transmit_every,
            sleep_every,
            sleep_duration,
            uplink_port: DEFAULT_UPLINK_PORT,
            uplink_confirmed: false,
        })
    }

    /// Overrides the uplink port and delivery mode.
    #[must_use]
    pub const fn with_uplink(mut self, port: u8, confirmed: bool) -> Self {
        self.uplink_port = port;
        self.uplink_confirmed = confirmed;
        self
    }

    #[must_use]
    pub const fn tick_period(&self) -> Duration {
        self.tick_period
    }

    #[must_use]
    pub const fn transmit_every(&self) -> u32 {
        self.transmit_every
    }

    #[must_use]
    pub const fn sleep_every(&self) -> u32 {
        self.sleep_every
    }

    #[must_use]
    pub const fn sleep_duration(&self) -> Duration {
        self.sleep_duration
    }

    /// Sleep duration in microseconds, saturating at `u64::MAX`.
    #[must_use]
    pub fn sleep_duration_us(&self) -> u64 {
        u64::try_from(self.sleep_duration.as_micros()).unwrap_or(u64::MAX)
    }

    #[must_use]
    pub const fn uplink_port(&self) -> u8 {
        self.uplink_port
    }

    #[must_use]
    pub const fn uplink_confirmed(&self) -> bool {
        self.uplink_confirmed
    }

    /// Returns `true` when `tick` falls on a transmit boundary.
    #[must_use]
    pub const fn transmit_due(&self, tick: u32) -> bool {
        tick != 0 && tick.is_multiple_of(self.transmit_every)
    }

    /// Returns `true` when `tick` falls on a sleep boundary.
    #[must_use]
    pub const fn sleep_due(&self, tick: u32) -> bool {
        tick != 0 && tick.is_multiple_of(self.sleep_every)
    }

    /// Offset of `tick` from the schedule reference instant.
    #[must_use]
    pub fn tick_offset(&self, tick: u32) -> Duration {
        self.tick_period
            .checked_mul(tick)
            .unwrap_or(Duration::MAX)
    }
}

impl Default for DutyCycleConfig {
    fn default() -> Self {
        Self {
            tick_period: DEFAULT_TICK_PERIOD,
            transmit_every: DEFAULT_TRANSMIT_EVERY,
            sleep_every: DEFAULT_SLEEP_EVERY,
            sleep_duration: DEFAULT_SLEEP_DURATION,
            uplink_port: DEFAULT_UPLINK_PORT,
            uplink_confirmed: false,
        }
    }
}

/// Count of elapsed periods since the orchestrator started.
///
/// Lives exactly as long as the process: deep sleep restarts from boot, so
/// the count starts over at zero after every wake.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct TickCounter {
    elapsed: u32,
}

impl TickCounter {
    #[must_use]
    pub const fn new() -> Self {
        Self { elapsed: 0 }
    }

    /// Advances by exactly one period and returns the new (1-based) tick.
    pub fn advance(&mut self) -> u32 {
        self.elapsed = self.elapsed.saturating_add(1);
        self.elapsed
    }

    /// Number of ticks elapsed so far.
    #[must_use]
    pub const fn current(&self) -> u32 {
        self.elapsed
    }
}

/// Fixed-rate deadlines anchored to one reference instant.
#[derive(Copy, Clone, Debug)]
pub struct FixedRateSchedule<I> {
    reference: I,
    period: Duration,
}

impl<I> FixedRateSchedule<I>
where
    I: Copy + Add<Duration, Output = I>,
{
    #[must_use]
    pub const fn new(reference: I, period: Duration) -> Self {
        Self { reference, period }
    }

    #[must_use]
    pub const fn reference(&self) -> I {
        self.reference
    }

    /// Instant at which `tick` becomes due: `reference + tick * period`.
    #[must_use]
    pub fn deadline(&self, tick: u32) -> I {
        let offset = self.period.checked_mul(tick).unwrap_or(Duration::MAX);
        self.reference + offset
    }
}

/// Suspends the orchestrator until a tick boundary.
///
/// This is the single suspension point of each loop iteration.
#[allow(async_fn_in_trait)]
pub trait TickSource {
    /// Resolves once the deadline for `tick` has passed.
    async fn wait_for_tick(&mut self, tick: u32);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
    struct MockInstant(u64);

    impl Add<Duration> for MockInstant {
        type Output = Self;

        fn add(self, rhs: Duration) -> Self::Output {
            Self(self.0 + u64::try_from(rhs.as_micros()).unwrap_or(u64::MAX))
        }
    }

    #[test]
    fn defaults_match_field_timings() {
        let config = DutyCycleConfig::default();
        assert_eq!(config.tick_period(), Duration::from_secs(1));
        assert_eq!(config.transmit_every(), 100);
        assert_eq!(config.sleep_every(), 150);
        assert_eq!(config.sleep_duration_us(), 3_600_000_000);
        assert_eq!(config.uplink_port(), 1);
        assert!(!config.uplink_confirmed());
    }

    #[test]
    fn validated_constructor_matches_default() {
        let config = DutyCycleConfig::new(
            DEFAULT_TICK_PERIOD,
            DEFAULT_TRANSMIT_EVERY,
            DEFAULT_SLEEP_EVERY,
            DEFAULT_SLEEP_DURATION,
        )
        .expect("default periods are valid");
        assert_eq!(config, DutyCycleConfig::default());
    }

    #[test]
    fn rejects_sleep_boundary_before_transmit_boundary() {
        let result = DutyCycleConfig::new(Duration::from_secs(1), 150, 100, DEFAULT_SLEEP_DURATION);
        assert_eq!(result, Err(ConfigError::SleepNotAfterTransmit));

        let equal = DutyCycleConfig::new(Duration::from_secs(1), 100, 100, DEFAULT_SLEEP_DURATION);
        assert_eq!(equal, Err(ConfigError::SleepNotAfterTransmit));
    }

    #[test]
    fn rejects_zero_periods() {
        assert_eq!(
            DutyCycleConfig::new(Duration::ZERO, 100, 150, DEFAULT_SLEEP_DURATION),
            Err(ConfigError::ZeroTickPeriod)
        );
        assert_eq!(
            DutyCycleConfig::new(Duration::from_secs(1), 0, 150, DEFAULT_SLEEP_DURATION),
            Err(ConfigError::ZeroTransmitPeriod)
        );
        assert_eq!(
            DutyCycleConfig::new(Duration::from_secs(1), 100, 0, DEFAULT_SLEEP_DURATION),
            Err(ConfigError::ZeroSleepPeriod)
        );
        assert_eq!(
            DutyCycleConfig::new(Duration::from_secs(1), 100, 150, Duration::ZERO),
            Err(ConfigError::ZeroSleepDuration)
        );
    }

    #[test]
    fn gates_fire_on_exact_multiples_only() {
        let config = DutyCycleConfig::default();
        assert!(!config.transmit_due(0));
        assert!(!config.transmit_due(99));
        assert!(config.transmit_due(100));
        assert!(!config.transmit_due(101));
        assert!(config.transmit_due(200));

        assert!(!config.sleep_due(0));
        assert!(!config.sleep_due(100));
        assert!(config.sleep_due(150));
        assert!(config.sleep_due(300));
    }

    #[test]
    fn counter_advances_by_one() {
        let mut counter = TickCounter::new();
        assert_eq!(counter.current(), 0);
        assert_eq!(counter.advance(), 1);
        assert_eq!(counter.advance(), 2);
        assert_eq!(counter.current(), 2);
    }

    #[test]
    fn deadlines_are_anchored_to_reference() {
        let schedule = FixedRateSchedule::new(MockInstant(5_000), Duration::from_secs(1));
        assert_eq!(schedule.deadline(0), MockInstant(5_000));
        assert_eq!(schedule.deadline(1), MockInstant(1_005_000));
        assert_eq!(schedule.deadline(150), MockInstant(150_005_000));
        assert_eq!(schedule.reference(), MockInstant(5_000));
    }

    #[test]
    fn sleep_duration_us_saturates_instead_of_truncating() {
        let config = DutyCycleConfig::new(Duration::from_secs(1), 100, 150, Duration::MAX)
            .expect("long sleep is valid");
        assert_eq!(config.sleep_duration_us(), u64::MAX);

        let hour = DutyCycleConfig::new(Duration::from_secs(1), 100, 150, Duration::from_hours(1))
            .expect("an hour is valid");
        assert_eq!(hour.sleep_duration_us(), 3_600_000_000);
    }

    #[test]
    fn gates_hold_at_the_top_of_the_counter() {
        let config = DutyCycleConfig::new(Duration::from_secs(1), 1, 3, DEFAULT_SLEEP_DURATION)
            .expect("valid periods");
        assert!(config.transmit_due(u32::MAX));
        assert!(config.sleep_due(u32::MAX));
        assert!(!config.sleep_due(u32::MAX - 1));
    }

    #[test]
    fn tick_offset_scales_with_period() {
        let config = DutyCycleConfig::default();
        assert_eq!(config.tick_offset(42), Duration::from_secs(42));
    }
}
