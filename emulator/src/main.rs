mod session;
mod sim;

use std::env;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use session::{DEFAULT_TRANSCRIPT_PATH, Session, SessionOptions};

const USAGE: &str = "Usage: tracker-emulator [--ticks-per-second <n>] [--cycles <n>] [--seed <n>] \
[--fix-failure-every <n>] [--transcript [<path>]]";

fn main() -> io::Result<()> {
    let options = parse_options(env::args().skip(1)).unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("{USAGE}");
        process::exit(2);
    });

    let stdout = io::stdout();
    let mut writer = stdout.lock();
    writeln!(
        writer,
        "Tracker emulator: {} wake cycle(s), {} tick(s) per second, seed {}",
        options.cycles, options.ticks_per_second, options.seed
    )?;
    drop(writer);

    let cycles = options.cycles;
    let mut session = Session::new(options)?;
    for cycle in 1..=cycles {
        let summary = session.run_cycle()?;
        println!(
            "cycle {cycle}: ticks={} redraws={} uplinks={} skipped={} lowest-stack={} sleep={}us",
            summary.ticks,
            summary.display_refreshes,
            summary.uplinks,
            summary.skipped_fixes,
            summary
                .lowest_stack
                .map_or_else(|| "n/a".to_string(), |bytes| bytes.to_string()),
            summary.sleep.map_or(0, |request| request.duration_us()),
        );
    }

    if let Some(path) = &session.options().transcript {
        println!("Transcript written to {}", path.display());
    }

    Ok(())
}

fn parse_options<I>(args: I) -> Result<SessionOptions, String>
where
    I: IntoIterator<Item = String>,
{
    let mut options = SessionOptions::default();
    let mut args = args.into_iter().peekable();

    while let Some(arg) = args.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) => (flag.to_string(), Some(value.to_string())),
            None => (arg, None),
        };

        match flag.as_str() {
            "--ticks-per-second" => {
                options.ticks_per_second = parse_value(&flag, inline, &mut args)?;
                if options.ticks_per_second == 0 {
                    return Err("--ticks-per-second must be at least 1".to_string());
                }
            }
            "--cycles" => options.cycles = parse_value(&flag, inline, &mut args)?,
            "--seed" => options.seed = parse_value(&flag, inline, &mut args)?,
            "--fix-failure-every" => {
                options.fix_failure_every = parse_value(&flag, inline, &mut args)?;
            }
            "--transcript" => {
                let path = match inline {
                    Some(value) => value,
                    None => match args.peek() {
                        Some(next) if !next.starts_with("--") => args.next().unwrap_or_default(),
                        _ => DEFAULT_TRANSCRIPT_PATH.to_string(),
                    },
                };
                options.transcript = Some(PathBuf::from(path));
            }
            "-h" | "--help" => {
                println!("{USAGE}");
                process::exit(0);
            }
            other => return Err(format!("Unknown argument `{other}`")),
        }
    }

    Ok(options)
}

fn parse_value<T, I>(flag: &str, inline: Option<String>, args: &mut I) -> Result<T, String>
where
    T: std::str::FromStr,
    I: Iterator<Item = String>,
{
    let raw = match inline {
        Some(value) => value,
        None => args
            .next()
            .ok_or_else(|| format!("Expected value after {flag}"))?,
    };
    raw.parse()
        .map_err(|_| format!("Invalid value `{raw}` for {flag}"))
}
