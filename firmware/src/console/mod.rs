#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Operator console session for the probe.
//!
//! Wires a line-oriented session on top of the UART link: bytes are
//! assembled into bounded lines, parsed with the shared grammar, and the
//! outcome rendered into a bounded reply buffer the transport task writes
//! back. The `status` and `help` commands are handled here; everything
//! else goes through the shared [`CommandExecutor`].

use core::fmt::Write as _;
use core::str;

use heapless::{String, Vec};
use probe_core::repl::commands::{
    CommandError, CommandExecutor, CommandOutcome, ConfigOutcome, ProbeControl, TriggerAck,
};
use probe_core::repl::status::{StatusFormatter, StatusProvider, write_config, write_latency};

use crate::probe::FirmwareInstant;

/// Maximum number of bytes accepted on a single console line (excluding
/// terminator).
pub const MAX_LINE_LEN: usize = 96;

/// Maximum rendered reply size, covering the multi-line `status` and
/// `help` outputs.
pub const MAX_REPLY_LEN: usize = 640;

/// Rendered reply returned to the transport task.
pub type Reply = String<MAX_REPLY_LEN>;

const HELP_TOPICS: &[(&str, &str)] = &[
    ("trigger", "trigger                 - fire the configured stimulus edge"),
    ("latency", "latency                 - report the measured response latency"),
    (
        "config",
        "config [show|stimulus <edge>|response <policy>|reset <duration>]",
    ),
    ("unlock", "unlock                  - permit configuration writes"),
    ("lock", "lock                    - refuse configuration writes"),
    ("status", "status                  - display pin, cycle, and config state"),
    ("help", "help [topic]            - show help for a command"),
];

/// Maintains console state for one serial session.
pub struct ConsoleSession<P, S> {
    executor: CommandExecutor<P>,
    status: S,
    buffer: Vec<u8, MAX_LINE_LEN>,
}

impl<P, S> ConsoleSession<P, S>
where
    P: ProbeControl,
    S: StatusProvider<FirmwareInstant>,
{
    /// Creates a session over the probe boundary, starting locked.
    pub fn new(probe: P, status: S) -> Self {
        Self {
            executor: CommandExecutor::new(probe),
            status,
            buffer: Vec::new(),
        }
    }

    /// Feeds a single byte into the session. Line terminators trigger
    /// parsing and dispatch; the rendered reply is returned to the caller.
    pub fn ingest(&mut self, byte: u8, now: FirmwareInstant) -> Option<Reply> {
        match byte {
            b'\r' | b'\n' => {
                if self.buffer.is_empty() {
                    return None;
                }
                let reply = self.process_line(now);
                self.buffer.clear();
                Some(reply)
            }
            0x08 | 0x7f => {
                self.buffer.pop();
                None
            }
            value => {
                if self.buffer.push(value).is_err() {
                    self.buffer.clear();
                    let mut reply = Reply::new();
                    push_line(&mut reply, "ERR line too long");
                    return Some(reply);
                }
                None
            }
        }
    }

    fn process_line(&mut self, now: FirmwareInstant) -> Reply {
        let mut reply = Reply::new();

        let Ok(line) = str::from_utf8(self.buffer.as_slice()) else {
            push_line(&mut reply, "ERR invalid utf-8");
            return reply;
        };

        match self.executor.execute(line, now) {
            Ok(outcome) => render_outcome(&mut reply, &outcome),
            Err(CommandError::Unsupported("status")) => {
                render_status(&mut self.status, &mut reply, now);
            }
            Err(CommandError::Unsupported("help")) => {
                render_help(&mut reply, help_topic(line));
            }
            Err(error) => render_error(&mut reply, &error),
        }

        reply
    }
}

fn render_status<S>(status: &mut S, reply: &mut Reply, now: FirmwareInstant)
where
    S: StatusProvider<FirmwareInstant>,
{
    let Some(snapshot) = status.snapshot(now) else {
        push_line(reply, "ERR status unavailable");
        return;
    };

    let formatter = StatusFormatter::new(&snapshot);
    let _ = formatter.write_pins_line(reply);
    let _ = reply.push_str("\r\n");
    let _ = formatter.write_cycle_line(reply);
    let _ = reply.push_str("\r\n");
    let _ = formatter.write_config_line(reply);
    let _ = reply.push_str("\r\n");
}

fn render_outcome(reply: &mut Reply, outcome: &CommandOutcome<FirmwareInstant>) {
    match outcome {
        CommandOutcome::Trigger(TriggerAck { edge, .. }) => {
            let _ = write!(reply, "OK trigger edge={edge}");
            let _ = reply.push_str("\r\n");
        }
        CommandOutcome::Latency(latency) => {
            let _ = reply.push_str("OK latency ");
            let _ = write_latency(reply, *latency);
            let _ = reply.push_str("\r\n");
        }
        CommandOutcome::Config(ConfigOutcome { config, .. }) => {
            let _ = reply.push_str("OK ");
            let _ = write_config(reply, config);
            let _ = reply.push_str("\r\n");
        }
        CommandOutcome::Unlocked => push_line(reply, "OK configuration unlocked"),
        CommandOutcome::Locked => push_line(reply, "OK configuration locked"),
    }
}

fn render_error(reply: &mut Reply, error: &CommandError<'_>) {
    match error {
        CommandError::Parse(parse) => {
            let _ = write!(reply, "ERR syntax {parse}");
            let _ = reply.push_str("\r\n");
        }
        CommandError::Rejected(rejection) => {
            let probe_core::engine::TriggerRejection::AlreadyAtLevel { output_high, .. } =
                rejection;
            let level = if *output_high { "high" } else { "low" };
            let _ = write!(reply, "ERR trigger rejected (output already {level})");
            let _ = reply.push_str("\r\n");
        }
        CommandError::AccessDenied => {
            push_line(reply, "ERR not in configuration mode (run `unlock` first)");
        }
        CommandError::Unsupported(topic) => {
            let _ = write!(reply, "ERR unsupported {topic}");
            let _ = reply.push_str("\r\n");
        }
    }
}

fn render_help(reply: &mut Reply, topic: Option<&str>) {
    match topic {
        Some(target) if !target.is_empty() => {
            if let Some((_, detail)) = HELP_TOPICS
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(target))
            {
                push_line(reply, detail);
            } else {
                let _ = write!(reply, "No help available for `{target}`.");
                let _ = reply.push_str("\r\n");
            }
        }
        _ => {
            push_line(reply, "Available commands:");
            for (_, detail) in HELP_TOPICS {
                let _ = reply.push_str("  ");
                push_line(reply, detail);
            }
        }
    }
}

// The executor reports `help` as a front-end concern without the parsed
// topic, so the session re-derives it from the raw line.
fn help_topic(line: &str) -> Option<&str> {
    let mut parts = line.trim().split_whitespace();
    let keyword = parts.next()?;
    if !keyword.eq_ignore_ascii_case("help") {
        return None;
    }
    parts.next()
}

fn push_line(reply: &mut Reply, line: &str) {
    let _ = reply.push_str(line);
    let _ = reply.push_str("\r\n");
}
