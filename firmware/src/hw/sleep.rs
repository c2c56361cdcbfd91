//! RTC deep sleep with a timer wake-up.

use core::time::Duration;

use esp_hal::rtc_cntl::Rtc;
use esp_hal::rtc_cntl::sleep::TimerWakeupSource;
use tracker_core::devices::SleepController;

/// Waking from deep sleep resets the chip, so [`SleepController`] never returns.
pub struct RtcSleep {
    rtc: Rtc<'static>,
}

impl RtcSleep {
    pub const fn new(rtc: Rtc<'static>) -> Self {
        Self { rtc }
    }
}

impl SleepController for RtcSleep {
    fn enter_deep_sleep(&mut self, duration_us: u64) -> ! {
        let timer = TimerWakeupSource::new(Duration::from_micros(duration_us));
        self.rtc.sleep_deep(&[&timer])
    }
}
