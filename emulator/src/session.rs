use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use probe_core::config::{ConfigCell, ProbeConfig};
use probe_core::engine::{
    ProbeEngine, ProbeHandle, TickReport, TimingCell, TriggerRejection,
};
use probe_core::repl::commands::{
    CommandError, CommandExecutor, CommandOutcome, ConfigOutcome, TriggerAck,
};
use probe_core::repl::completion::{CompletionEngine, Replacement};
use probe_core::repl::status::{ProbeStatusSnapshot, StatusFormatter};

use crate::harness::Harness;

/// Scheduler period mirrored from the firmware probe task.
const SIM_TICK: Duration = Duration::from_millis(1);

/// Give up narrating a cycle when the device stays silent this long.
const CYCLE_TIMEOUT: Duration = Duration::from_secs(5);

pub const HELP_TOPICS: &[(&str, &str)] = &[
    (
        "trigger",
        "trigger                     - fire the configured stimulus edge",
    ),
    (
        "latency",
        "latency                     - report the measured response latency",
    ),
    (
        "config",
        "config [show|stimulus <edge>|response <policy>|reset <duration>]",
    ),
    (
        "unlock",
        "unlock                      - permit configuration writes",
    ),
    (
        "lock",
        "lock                        - refuse configuration writes",
    ),
    (
        "react",
        "react [<duration>]          - show or set the simulated reaction delay",
    ),
    (
        "status",
        "status                      - display pin, cycle, and config state",
    ),
    (
        "help",
        "help [topic]                - show help for a command",
    ),
];

#[derive(Debug)]
pub enum CompletionResponse {
    NoMatches,
    Applied { replacement: Replacement },
    Suggestions { options: Vec<&'static str> },
}

pub struct Session {
    executor: CommandExecutor<ProbeHandle<'static>>,
    timing: &'static TimingCell,
    config: &'static ConfigCell,
    harness: Harness,
    transcript: TranscriptLogger,
    completion: CompletionEngine,
    command_count: usize,
}

impl Session {
    pub fn new(react_after: Duration, log_path: &Path) -> io::Result<Self> {
        let transcript = TranscriptLogger::new(log_path)?;

        // The shared cells live for the process lifetime, matching the
        // device-uptime lifecycle of the firmware statics.
        let timing: &'static TimingCell = Box::leak(Box::new(TimingCell::new()));
        let config: &'static ConfigCell =
            Box::leak(Box::new(ConfigCell::new(ProbeConfig::DEFAULT)));

        Ok(Self {
            executor: CommandExecutor::new(ProbeHandle::new(timing, config)),
            timing,
            config,
            harness: Harness::new(react_after),
            transcript,
            completion: CompletionEngine::new(),
            command_count: 0,
        })
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let elapsed = self.harness.elapsed();
        self.transcript
            .append_line(elapsed, TranscriptRole::Host, trimmed)?;

        if trimmed.eq_ignore_ascii_case("help") {
            return self.handle_help(None, elapsed);
        }
        if let Some(rest) = strip_keyword(trimmed, "help") {
            return self.handle_help(Some(rest), elapsed);
        }
        if trimmed.eq_ignore_ascii_case("react") {
            let lines = vec![format!(
                "OK react delay={}ms",
                self.harness.react_after().as_millis()
            )];
            self.record_output(elapsed, &lines)?;
            return Ok(lines);
        }
        if let Some(rest) = strip_keyword(trimmed, "react") {
            return self.handle_react(rest, elapsed);
        }

        let now_ms = self.harness.now_ms();
        match self.executor.execute(trimmed, now_ms) {
            Ok(CommandOutcome::Trigger(ack)) => self.handle_trigger(&ack, elapsed),
            Ok(CommandOutcome::Latency(latency)) => {
                let mut line = String::from("OK latency ");
                let _ = probe_core::repl::status::write_latency(&mut line, latency);
                let lines = vec![line];
                self.record_output(elapsed, &lines)?;
                Ok(lines)
            }
            Ok(CommandOutcome::Config(ConfigOutcome { config, changed })) => {
                let mut line = String::from("OK ");
                let _ = probe_core::repl::status::write_config(&mut line, &config);
                if changed {
                    line.push_str(" (saved)");
                }
                let lines = vec![line];
                self.record_output(elapsed, &lines)?;
                Ok(lines)
            }
            Ok(CommandOutcome::Unlocked) => {
                let lines = vec!["OK configuration unlocked".to_string()];
                self.record_output(elapsed, &lines)?;
                Ok(lines)
            }
            Ok(CommandOutcome::Locked) => {
                let lines = vec!["OK configuration locked".to_string()];
                self.record_output(elapsed, &lines)?;
                Ok(lines)
            }
            Err(CommandError::Unsupported("status")) => self.handle_status(elapsed),
            Err(CommandError::Parse(err)) => {
                let lines = vec![format!("ERR syntax {err}")];
                self.record_output(elapsed, &lines)?;
                Ok(lines)
            }
            Err(CommandError::Rejected(rejection)) => {
                let TriggerRejection::AlreadyAtLevel { output_high, .. } = rejection;
                let level = if output_high { "high" } else { "low" };
                let lines = vec![format!("ERR trigger rejected (output already {level})")];
                self.record_output(elapsed, &lines)?;
                Ok(lines)
            }
            Err(CommandError::AccessDenied) => {
                let lines =
                    vec!["ERR not in configuration mode (run `unlock` first)".to_string()];
                self.record_output(elapsed, &lines)?;
                Ok(lines)
            }
            Err(CommandError::Unsupported(topic)) => {
                let lines = vec![format!("ERR unsupported {topic}")];
                self.record_output(elapsed, &lines)?;
                Ok(lines)
            }
        }
    }

    pub fn handle_completion(
        &mut self,
        buffer: &str,
        cursor: usize,
    ) -> io::Result<CompletionResponse> {
        let length = buffer.len();
        let cursor = cursor.min(length);
        let (prefix, suffix) = buffer.split_at(cursor);
        let elapsed = self.harness.elapsed();
        self.transcript
            .log_completion_request(elapsed, prefix, suffix, cursor)?;

        let result = self.completion.complete(buffer, cursor);
        if result.options.is_empty() {
            self.transcript.log_completion_none(elapsed)?;
            return Ok(CompletionResponse::NoMatches);
        }

        let options: Vec<&'static str> = result.options.iter().copied().collect();
        if options.len() == 1 {
            let candidate = options[0];
            if let Some(replacement) = result.replacement {
                let replacement_log = replacement.clone();
                self.transcript
                    .log_completion_applied(elapsed, candidate, Some(replacement_log))?;
                return Ok(CompletionResponse::Applied { replacement });
            }

            self.transcript
                .log_completion_applied(elapsed, candidate, None)?;
            return Ok(CompletionResponse::NoMatches);
        }

        self.transcript.log_completion_options(elapsed, &options)?;
        Ok(CompletionResponse::Suggestions { options })
    }

    fn handle_trigger(
        &mut self,
        ack: &TriggerAck<u64>,
        elapsed: Duration,
    ) -> io::Result<Vec<String>> {
        self.command_count += 1;
        let mut lines = vec![format!(
            "OK trigger seq={} edge={} at=+{}ms",
            self.command_count, ack.edge, ack.requested_at
        )];

        self.run_cycle(&mut lines);
        self.record_output(elapsed, &lines)?;
        Ok(lines)
    }

    /// Steps the probe loop through the accepted trigger until the cycle
    /// settles, narrating every observable transition.
    fn run_cycle(&mut self, lines: &mut Vec<String>) {
        let mut engine = ProbeEngine::new(
            self.timing,
            self.harness.clock(),
            self.harness.stimulus(),
            self.harness.response(),
        );

        let deadline = self.harness.elapsed() + CYCLE_TIMEOUT;
        loop {
            self.harness.advance(SIM_TICK);
            let report = engine.run_once(&self.config.get());
            self.narrate_tick(&report, lines);

            let state = self.timing.snapshot();
            if state.latched() && state.reset_deadline_ms().is_none() {
                break;
            }

            if self.harness.elapsed() >= deadline {
                if !state.latched() {
                    lines.push(format!(
                        "no response within {}s (cycle stays pending)",
                        CYCLE_TIMEOUT.as_secs()
                    ));
                }
                break;
            }
        }
    }

    fn narrate_tick(&self, report: &TickReport, lines: &mut Vec<String>) {
        let at_ms = self.harness.now_ms();

        if let Some(fire) = report.fired {
            lines.push(format!(
                "stimulus {} out={} expect={} at=+{at_ms}ms",
                fire.edge,
                level_label(fire.output_high),
                level_label(fire.expected_level),
            ));
        }

        // A latch reported alongside a fresh stimulus belongs to the
        // superseded cycle; keep the narration on the new one.
        if report.fired.is_none() {
            if let Some(latency) = report.latched {
                lines.push(format!(
                    "response latched latency={}ms ({}us) at=+{at_ms}ms",
                    latency.millis, latency.micros,
                ));
            }
        }

        if report.auto_reset {
            lines.push(format!("auto-reset at=+{at_ms}ms"));
        }
    }

    fn handle_status(&mut self, elapsed: Duration) -> io::Result<Vec<String>> {
        let snapshot = ProbeStatusSnapshot::from_timing(
            &self.timing.snapshot(),
            self.timing.trigger_pending(),
            self.config.get(),
        );
        let formatter = StatusFormatter::new(&snapshot);

        let mut lines = Vec::new();
        let mut line = String::new();
        let _ = formatter.write_pins_line(&mut line);
        lines.push(line);
        let mut line = String::new();
        let _ = formatter.write_cycle_line(&mut line);
        lines.push(line);
        let mut line = String::new();
        let _ = formatter.write_config_line(&mut line);
        lines.push(line);

        self.record_output(elapsed, &lines)?;
        Ok(lines)
    }

    fn handle_react(&mut self, argument: &str, elapsed: Duration) -> io::Result<Vec<String>> {
        let lines = match parse_duration(argument) {
            Some(delay) => {
                self.harness.set_react_after(delay);
                vec![format!("OK react delay={}ms", delay.as_millis())]
            }
            None => vec![format!("ERR invalid reaction delay `{argument}`")],
        };

        self.record_output(elapsed, &lines)?;
        Ok(lines)
    }

    fn handle_help(&mut self, topic: Option<&str>, elapsed: Duration) -> io::Result<Vec<String>> {
        let mut lines = Vec::new();
        match topic {
            Some(target) if !target.is_empty() => {
                if let Some((_, detail)) = HELP_TOPICS
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(target))
                {
                    lines.push((*detail).to_string());
                } else {
                    lines.push(format!("No help available for `{target}`."));
                    lines.push(format!("Available topics: {}", help_topic_list()));
                }
            }
            _ => {
                lines.push("Available commands:".to_string());
                for (_, detail) in HELP_TOPICS {
                    lines.push(format!("  {detail}"));
                }
                lines.push("Type `help <topic>` for a specific command.".to_string());
            }
        }

        self.record_output(elapsed, &lines)?;
        Ok(lines)
    }

    fn record_output(&mut self, elapsed: Duration, lines: &[String]) -> io::Result<()> {
        for line in lines {
            self.transcript
                .append_line(elapsed, TranscriptRole::Emulator, line)?;
        }
        Ok(())
    }
}

fn level_label(high: bool) -> &'static str {
    if high { "high" } else { "low" }
}

fn strip_keyword<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
    let mut parts = line.splitn(2, char::is_whitespace);
    let first = parts.next()?;
    if !first.eq_ignore_ascii_case(keyword) {
        return None;
    }
    Some(parts.next().unwrap_or("").trim())
}

fn parse_duration(token: &str) -> Option<Duration> {
    if let Some(rest) = token.strip_suffix("ms") {
        rest.parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(rest) = token.strip_suffix('s') {
        rest.parse::<u64>().ok().map(Duration::from_secs)
    } else {
        token.parse::<u64>().ok().map(Duration::from_millis)
    }
}

fn help_topic_list() -> String {
    let mut buffer = String::new();
    for (index, (name, _)) in HELP_TOPICS.iter().enumerate() {
        if index > 0 {
            buffer.push_str(", ");
        }
        buffer.push_str(name);
    }
    buffer
}

struct TranscriptLogger {
    writer: BufWriter<std::fs::File>,
}

impl TranscriptLogger {
    fn new(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };

        logger.write_header()?;
        Ok(logger)
    }

    fn write_header(&mut self) -> io::Result<()> {
        writeln!(self.writer, "# Edge Probe Emulator transcript")?;
        writeln!(
            self.writer,
            "# Timestamps are simulated milliseconds since session start"
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
            "[+{:>6} ms] {} {}",
            elapsed.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }

    fn log_completion_request(
        &mut self,
        elapsed: Duration,
        prefix: &str,
        suffix: &str,
        cursor: usize,
    ) -> io::Result<()> {
        let message = format!("[TAB] prefix={prefix:?} suffix={suffix:?} cursor={cursor}");
        self.append_line(elapsed, TranscriptRole::Host, &message)
    }

    fn log_completion_none(&mut self, elapsed: Duration) -> io::Result<()> {
        self.append_line(elapsed, TranscriptRole::Emulator, "completion: no matches")
    }

    fn log_completion_applied(
        &mut self,
        elapsed: Duration,
        candidate: &str,
        replacement: Option<Replacement>,
    ) -> io::Result<()> {
        let message = match replacement {
            Some(rep) => format!(
                "completion applied: {candidate} (range={}..{})",
                rep.start, rep.end
            ),
            None => format!("completion candidate: {candidate} (no replacement applied)"),
        };
        self.append_line(elapsed, TranscriptRole::Emulator, &message)
    }

    fn log_completion_options(
        &mut self,
        elapsed: Duration,
        options: &[&'static str],
    ) -> io::Result<()> {
        let summary = format!("completion options ({})", options.len());
        self.append_line(elapsed, TranscriptRole::Emulator, &summary)?;
        for option in options {
            let line = format!("  {option}");
            self.append_line(elapsed, TranscriptRole::Emulator, &line)?;
        }
        Ok(())
    }
}

enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}
