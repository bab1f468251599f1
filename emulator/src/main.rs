mod harness;
mod session;

use std::env;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::process;
use std::time::Duration;

use session::Session;

const DEFAULT_REACT_MS: u64 = 50;
const TRANSCRIPT_PATH: &str = "probe-session.log";

fn main() -> io::Result<()> {
    let react_after = parse_react().unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("Usage: probe-emulator [--react <duration>]");
        process::exit(2);
    });

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let mut session = Session::new(react_after, Path::new(TRANSCRIPT_PATH))?;
    let mut line = String::new();

    writeln!(
        writer,
        "Edge Probe Emulator ready (reaction delay {}ms). Type `help` for commands or `exit` to quit.",
        react_after.as_millis()
    )?;

    loop {
        line.clear();
        write!(writer, "> ")?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if should_terminate(trimmed) {
            writeln!(writer, "Session closed.")?;
            break;
        }

        let responses = session.handle_command(trimmed)?;
        for response in responses {
            writeln!(writer, "{response}")?;
        }
    }

    Ok(())
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn parse_react() -> Result<Duration, String> {
    let mut args = env::args().skip(1);
    if let Some(arg) = args.next() {
        if let Some(value) = arg.strip_prefix("--react=") {
            parse_duration(value)
        } else if arg == "--react" {
            if let Some(value) = args.next() {
                parse_duration(&value)
            } else {
                Err("Expected value after --react".to_string())
            }
        } else {
            Err(format!("Unknown argument `{arg}`"))
        }
    } else {
        Ok(Duration::from_millis(DEFAULT_REACT_MS))
    }
}

fn parse_duration(token: &str) -> Result<Duration, String> {
    let parsed = if let Some(rest) = token.strip_suffix("ms") {
        rest.parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(rest) = token.strip_suffix('s') {
        rest.parse::<u64>().ok().map(Duration::from_secs)
    } else {
        token.parse::<u64>().ok().map(Duration::from_millis)
    };

    parsed.ok_or_else(|| format!("Invalid reaction delay `{token}`"))
}
