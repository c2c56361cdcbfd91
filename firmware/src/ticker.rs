//! Tick source driven by the embassy time driver.

use core::ops::Add;
use core::time::Duration;

use embassy_time::Instant;

/// Monotonic instant since boot, usable as a [`FixedRateSchedule`] clock.
///
/// [`FixedRateSchedule`]: tracker_core::schedule::FixedRateSchedule
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct BootInstant(pub Instant);

impl Add<Duration> for BootInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        let micros = u64::try_from(rhs.as_micros()).unwrap_or(u64::MAX);
        Self(Instant::from_micros(
            self.0.as_micros().saturating_add(micros),
        ))
    }
}

#[cfg(target_os = "none")]
pub use self::embassy::EmbassyTicker;

#[cfg(target_os = "none")]
mod embassy {
    use embassy_time::{Instant, Timer};
    use tracker_core::schedule::{FixedRateSchedule, TickSource};

    use super::BootInstant;

    /// Waits on absolute deadlines so processing time never shifts later ticks.
    pub struct EmbassyTicker {
        schedule: FixedRateSchedule<BootInstant>,
    }

    impl EmbassyTicker {
        /// Anchors tick zero at the current instant.
        pub fn start(period: core::time::Duration) -> Self {
            Self {
                schedule: FixedRateSchedule::new(BootInstant(Instant::now()), period),
            }
        }
    }

    impl TickSource for EmbassyTicker {
        async fn wait_for_tick(&mut self, tick: u32) {
            Timer::at(self.schedule.deadline(tick).0).await;
        }
    }
}
