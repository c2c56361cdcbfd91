use core::cell::RefCell;

use embassy_executor::Spawner;
use embassy_time::{Delay, Duration, Instant, Timer};
use embedded_hal_bus::i2c::RefCellDevice;
use esp_hal::Blocking;
use esp_hal::clock::CpuClock;
use esp_hal::i2c::master::{Config as I2cConfig, I2c};
use esp_hal::rtc_cntl::Rtc;
use esp_hal::time::Rate;
use esp_hal::timer::timg::TimerGroup;
use esp_hal::uart::{Config as UartConfig, Uart};
use static_cell::StaticCell;
use tracker_core::devices::Devices;
use tracker_core::orchestrator::DutyCycleOrchestrator;
use tracker_core::recovery::RestartCountdown;
use tracker_core::schedule::DutyCycleConfig;

use crate::hw::display::OledDisplay;
use crate::hw::gps::Neo6;
use crate::hw::pmu::Axp192;
use crate::hw::sleep::RtcSleep;
use crate::hw::stack::PaintedStack;
use crate::log;
use crate::uplink::{UplinkChannel, UplinkQueue};

mod duty_cycle_task;
mod uplink_task;

esp_bootloader_esp_idf::esp_app_desc!();

/// NEO-6 factory baud rate.
const GPS_BAUD: u32 = 9_600;

type SharedI2c = RefCellDevice<'static, I2c<'static, Blocking>>;

pub(super) type TrackerOrchestrator = DutyCycleOrchestrator<
    Axp192<SharedI2c>,
    Neo6<Uart<'static, Blocking>, Delay, fn() -> u64>,
    OledDisplay<SharedI2c>,
    UplinkQueue<'static>,
    Axp192<SharedI2c>,
    PaintedStack,
>;

static I2C_BUS: StaticCell<RefCell<I2c<'static, Blocking>>> = StaticCell::new();
static UPLINK_QUEUE: UplinkChannel = UplinkChannel::new();

#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    // SAFETY: runs before the scheduler starts or any interrupt is enabled.
    let stack = unsafe { PaintedStack::paint() };

    rtt_target::rtt_init_defmt!();
    log::boot(env!("CARGO_PKG_VERSION"));

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    let i2c = I2c::new(
        peripherals.I2C0,
        I2cConfig::default().with_frequency(Rate::from_khz(400)),
    )
    .expect("I2C0 configuration")
    .with_sda(peripherals.GPIO21)
    .with_scl(peripherals.GPIO22);
    let bus = I2C_BUS.init(RefCell::new(i2c));

    let mut power = Axp192::new(RefCellDevice::new(bus));
    if power.apply_power_up().is_err() {
        log::power_up_failed();
    }
    let telemetry = Axp192::new(RefCellDevice::new(bus));
    let display = OledDisplay::new(RefCellDevice::new(bus));

    let uart = Uart::new(
        peripherals.UART1,
        UartConfig::default().with_baudrate(GPS_BAUD),
    )
    .expect("UART1 configuration")
    .with_rx(peripherals.GPIO34)
    .with_tx(peripherals.GPIO12);
    let position = Neo6::new(uart, Delay, boot_millis as fn() -> u64);

    let uplink = UplinkQueue::new(UPLINK_QUEUE.sender());
    let devices = Devices::new(telemetry, position, display, uplink, power);
    let orchestrator = DutyCycleOrchestrator::new(DutyCycleConfig::default(), devices, stack);
    let sleep = RtcSleep::new(Rtc::new(peripherals.LPWR));

    match uplink_task::run(UPLINK_QUEUE.receiver()) {
        Ok(token) => spawner.spawn(token),
        Err(_) => log::task_spawn_failed("uplink"),
    }

    match duty_cycle_task::run(orchestrator, sleep) {
        Ok(token) => spawner.spawn(token),
        Err(_) => {
            log::task_spawn_failed("duty-cycle");
            restart().await;
        }
    }

    loop {
        core::future::pending::<()>().await;
    }
}

fn boot_millis() -> u64 {
    Instant::now().as_millis()
}

/// Counts down once per second on the log, then resets the chip.
async fn restart() -> ! {
    for seconds in RestartCountdown::new() {
        log::restart_countdown(seconds);
        Timer::after(Duration::from_secs(1)).await;
    }
    log::restart_now();
    esp_hal::system::software_reset()
}
