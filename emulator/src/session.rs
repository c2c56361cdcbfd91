use std::cell::RefCell;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant as HostInstant};

use crossterm::style::{Stylize, style};
use embassy_futures::block_on;
use tracker_core::devices::Devices;
use tracker_core::events::{DutyCycleEvent, DutyCycleEventSink, EventLevel};
use tracker_core::orchestrator::DutyCycleOrchestrator;
use tracker_core::schedule::{DutyCycleConfig, FixedRateSchedule, TickSource};
use tracker_core::shutdown::SleepRequest;

use crate::sim::{
    BatteryModel, ConsoleDisplay, GpsModel, HexUplink, SimPosition, SimRails, SimStack,
    SimTelemetry,
};

pub const DEFAULT_TRANSCRIPT_PATH: &str = "evidence/emulator-duty-cycle.log";

/// Knobs exposed on the emulator command line.
#[derive(Clone, Debug)]
pub struct SessionOptions {
    pub config: DutyCycleConfig,
    /// Simulated ticks per wall-clock second.
    pub ticks_per_second: u32,
    pub cycles: u32,
    pub seed: u64,
    /// Every n-th GNSS poll fails; zero disables failures.
    pub fix_failure_every: u32,
    pub transcript: Option<PathBuf>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            config: DutyCycleConfig::default(),
            ticks_per_second: 1,
            cycles: 1,
            seed: 0x5EED,
            fix_failure_every: 0,
            transcript: None,
        }
    }
}

/// What one wake cycle did, as seen through its events.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CycleSummary {
    pub ticks: u32,
    pub display_refreshes: u32,
    pub uplinks: u32,
    pub skipped_fixes: u32,
    pub stack_reports: u32,
    pub lowest_stack: Option<u32>,
    pub sleep: Option<SleepRequest>,
}

/// Emulates power-on to deep sleep, repeatedly.
pub struct Session {
    options: SessionOptions,
    console: Rc<RefCell<Console>>,
    battery: Rc<RefCell<BatteryModel>>,
    gps: Rc<RefCell<GpsModel>>,
    wakes: u32,
}

impl Session {
    pub fn new(options: SessionOptions) -> io::Result<Self> {
        let transcript = match &options.transcript {
            Some(path) => Some(TranscriptLogger::new(path, &options)?),
            None => None,
        };

        Ok(Self {
            console: Rc::new(RefCell::new(Console::new(transcript))),
            battery: Rc::new(RefCell::new(BatteryModel::new(options.seed))),
            gps: Rc::new(RefCell::new(GpsModel::new(
                options.seed,
                options.fix_failure_every,
            ))),
            wakes: 0,
            options,
        })
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Boots a fresh orchestrator and runs it until it requests deep sleep,
    /// then fast-forwards through the sleep window.
    pub fn run_cycle(&mut self) -> io::Result<CycleSummary> {
        self.wakes += 1;
        let config = self.options.config;
        let seed = self.options.seed.wrapping_add(u64::from(self.wakes));

        self.console
            .borrow_mut()
            .emit(TranscriptRole::Log, &format!("boot: wake cycle {}", self.wakes));

        let devices = Devices::new(
            SimTelemetry::new(Rc::clone(&self.battery), config.tick_period()),
            SimPosition::new(Rc::clone(&self.gps), Rc::clone(&self.console)),
            ConsoleDisplay::new(Rc::clone(&self.console)),
            HexUplink::new(Rc::clone(&self.console)),
            SimRails::new(Rc::clone(&self.console)),
        );
        let mut orchestrator = DutyCycleOrchestrator::new(config, devices, SimStack::new(seed));
        let mut ticker = HostTicker::new(
            &config,
            self.options.ticks_per_second,
            Rc::clone(&self.console),
        );
        let mut events = ConsoleEvents::new(Rc::clone(&self.console));

        let request = block_on(orchestrator.run_until_sleep(&mut ticker, &mut events));

        let mut summary = events.into_summary();
        summary.ticks = orchestrator.tick_count();
        summary.sleep = Some(request);

        self.battery.borrow_mut().rest(request.duration());
        {
            let mut console = self.console.borrow_mut();
            console.advance(request.duration());
            console.emit(
                TranscriptRole::Log,
                &format!(
                    "boot: woke after {}s, {} mAh drawn so far",
                    request.duration().as_secs(),
                    self.battery.borrow().consumed_mah()
                ),
            );
        }

        self.console.borrow_mut().take_error()?;
        Ok(summary)
    }
}

/// Shared output for every simulated device and the event log.
pub struct Console {
    transcript: Option<TranscriptLogger>,
    cycle_start: Duration,
    clock: Duration,
    error: Option<io::Error>,
}

impl Console {
    fn new(transcript: Option<TranscriptLogger>) -> Self {
        Self {
            transcript,
            cycle_start: Duration::ZERO,
            clock: Duration::ZERO,
            error: None,
        }
    }

    /// Simulated time since the session started.
    pub fn clock(&self) -> Duration {
        self.clock
    }

    fn set_tick(&mut self, offset: Duration) {
        self.clock = self.cycle_start + offset;
    }

    fn advance(&mut self, duration: Duration) {
        self.cycle_start = self.clock + duration;
        self.clock = self.cycle_start;
    }

    pub fn emit(&mut self, role: TranscriptRole, line: &str) {
        self.emit_styled(role, EventLevel::Info, line);
    }

    fn emit_styled(&mut self, role: TranscriptRole, level: EventLevel, line: &str) {
        let stamp = format!("[+{:>9} ms]", self.clock.as_millis());
        let stamp = style(stamp).dark_grey();
        match (role, level) {
            (TranscriptRole::Display, _) => println!("{stamp} {}", style(line).cyan()),
            (_, EventLevel::Warn) => println!("{stamp} {}", style(line).yellow()),
            (_, EventLevel::Debug) => println!("{stamp} {}", style(line).dark_grey()),
            (_, EventLevel::Info) => println!("{stamp} {line}"),
        }

        if self.error.is_some() {
            return;
        }
        if let Some(transcript) = self.transcript.as_mut()
            && let Err(err) = transcript.append_line(self.clock, role, line)
        {
            self.error = Some(err);
        }
    }

    fn take_error(&mut self) -> io::Result<()> {
        match self.error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Drift-corrected ticker against the host clock, optionally accelerated.
pub struct HostTicker {
    schedule: FixedRateSchedule<HostInstant>,
    tick_period: Duration,
    console: Rc<RefCell<Console>>,
}

impl HostTicker {
    fn new(config: &DutyCycleConfig, ticks_per_second: u32, console: Rc<RefCell<Console>>) -> Self {
        let wall_period = config.tick_period() / ticks_per_second.max(1);
        Self {
            schedule: FixedRateSchedule::new(HostInstant::now(), wall_period),
            tick_period: config.tick_period(),
            console,
        }
    }
}

impl TickSource for HostTicker {
    async fn wait_for_tick(&mut self, tick: u32) {
        let deadline = self.schedule.deadline(tick);
        let now = HostInstant::now();
        if deadline > now {
            thread::sleep(deadline - now);
        }

        let offset = self.tick_period.checked_mul(tick).unwrap_or(Duration::MAX);
        self.console.borrow_mut().set_tick(offset);
    }
}

/// Prints events as `tag: message` lines and tallies them per cycle.
struct ConsoleEvents {
    console: Rc<RefCell<Console>>,
    summary: CycleSummary,
}

impl ConsoleEvents {
    fn new(console: Rc<RefCell<Console>>) -> Self {
        Self {
            console,
            summary: CycleSummary::default(),
        }
    }

    fn into_summary(self) -> CycleSummary {
        self.summary
    }
}

impl DutyCycleEventSink for ConsoleEvents {
    fn record(&mut self, event: DutyCycleEvent) {
        match event {
            DutyCycleEvent::StackWatermark(report) => {
                self.summary.stack_reports += 1;
                self.summary.lowest_stack = Some(
                    self.summary
                        .lowest_stack
                        .map_or(report.remaining_bytes, |low| low.min(report.remaining_bytes)),
                );
            }
            DutyCycleEvent::DisplayRefreshed { .. } => self.summary.display_refreshes += 1,
            DutyCycleEvent::UplinkQueued { .. } => self.summary.uplinks += 1,
            DutyCycleEvent::PositionUnavailable { .. } => self.summary.skipped_fixes += 1,
            DutyCycleEvent::ShutdownStarted { .. }
            | DutyCycleEvent::ShutdownStep(_)
            | DutyCycleEvent::DeepSleep(_) => {}
        }

        let line = format!("{}: {event}", event.tag());
        self.console
            .borrow_mut()
            .emit_styled(TranscriptRole::Log, event.level(), &line);
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TranscriptRole {
    Log,
    Device,
    Display,
}

impl TranscriptRole {
    fn prefix(self) -> &'static str {
        match self {
            TranscriptRole::Log => "LOG <",
            TranscriptRole::Device => "DEV <",
            TranscriptRole::Display => "OLED|",
        }
    }
}

struct TranscriptLogger {
    writer: BufWriter<std::fs::File>,
}

impl TranscriptLogger {
    fn new(path: &Path, options: &SessionOptions) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };

        logger.write_header(options)?;
        Ok(logger)
    }

    fn write_header(&mut self, options: &SessionOptions) -> io::Result<()> {
        writeln!(self.writer, "# Tracker emulator duty-cycle transcript")?;
        writeln!(
            self.writer,
            "# seed={} cycles={} fix-failure-every={}",
            options.seed, options.cycles, options.fix_failure_every
        )?;
        writeln!(
            self.writer,
            "# Timestamps are simulated milliseconds since first boot"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(
        &mut self,
        elapsed: Duration,
        role: TranscriptRole,
        line: &str,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>9} ms] {} {}",
            elapsed.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_options() -> SessionOptions {
        SessionOptions {
            config: DutyCycleConfig::new(
                Duration::from_secs(1),
                10,
                15,
                Duration::from_secs(600),
            )
            .expect("valid config"),
            ticks_per_second: 1_000_000,
            fix_failure_every: 2,
            ..SessionOptions::default()
        }
    }

    #[test]
    fn cycle_reaches_sleep_boundary() {
        let mut session = Session::new(fast_options()).expect("session");
        let summary = session.run_cycle().expect("cycle");

        assert_eq!(summary.ticks, 15);
        assert_eq!(summary.uplinks, 1);
        assert_eq!(summary.sleep, Some(SleepRequest::from_micros(600_000_000)));
        assert!(summary.display_refreshes >= 1);
        assert!(summary.stack_reports >= 1);
    }

    #[test]
    fn every_wake_restarts_the_tick_count() {
        let mut session = Session::new(fast_options()).expect("session");
        let first = session.run_cycle().expect("first cycle");
        let second = session.run_cycle().expect("second cycle");

        assert_eq!(first.ticks, second.ticks);
        assert_eq!(session.console.borrow().clock(), Duration::from_secs(1_230));
    }

    #[test]
    fn failing_receiver_skips_uplink() {
        let mut options = fast_options();
        options.fix_failure_every = 1;
        let mut session = Session::new(options).expect("session");
        let summary = session.run_cycle().expect("cycle");

        assert_eq!(summary.uplinks, 0);
        assert_eq!(summary.skipped_fixes, 1);
    }
}
