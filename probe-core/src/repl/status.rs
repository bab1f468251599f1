//! Shared status surface for the console.
//!
//! The firmware and emulator implement [`StatusProvider`] so that the
//! `status` command can surface live pin, cycle, and configuration state
//! without duplicating platform logic. [`StatusFormatter`] keeps the
//! textual rendering consistent across front-ends.

use core::fmt;
use core::time::Duration;

use crate::config::ProbeConfig;
use crate::engine::{Latency, TimingState};

/// Logical level reported for a probe line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineLevel {
    High,
    Low,
}

impl LineLevel {
    /// Returns `true` when the line is at the high level.
    #[must_use]
    pub const fn is_high(self) -> bool {
        matches!(self, LineLevel::High)
    }

    /// Helper converting a boolean level into a [`LineLevel`].
    #[must_use]
    pub const fn from_high(high: bool) -> Self {
        if high { LineLevel::High } else { LineLevel::Low }
    }

    /// Textual label used by the status lines.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            LineLevel::High => "high",
            LineLevel::Low => "low",
        }
    }
}

/// Snapshot of reusable status information surfaced by the console.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProbeStatusSnapshot {
    pub output: LineLevel,
    pub expected: LineLevel,
    pub latched: bool,
    pub latency: Option<Latency>,
    pub trigger_pending: bool,
    pub config: ProbeConfig,
}

impl ProbeStatusSnapshot {
    /// Builds a snapshot for a probe resting at startup levels.
    #[must_use]
    pub const fn resting(config: ProbeConfig) -> Self {
        Self {
            output: LineLevel::Low,
            expected: LineLevel::Low,
            latched: false,
            latency: None,
            trigger_pending: false,
            config,
        }
    }

    /// Builds a snapshot from the shared timing record.
    #[must_use]
    pub fn from_timing(state: &TimingState, trigger_pending: bool, config: ProbeConfig) -> Self {
        Self {
            output: LineLevel::from_high(state.output_high()),
            expected: LineLevel::from_high(state.expected_level()),
            latched: state.latched(),
            latency: state.latency(),
            trigger_pending,
            config,
        }
    }
}

/// Platform hook that supplies live status information.
pub trait StatusProvider<Instant> {
    /// Returns a snapshot if the platform can currently provide one.
    fn snapshot(&mut self, now: Instant) -> Option<ProbeStatusSnapshot>;
}

/// Placeholder status provider that never reports snapshots.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoStatusProvider;

impl<Instant> StatusProvider<Instant> for NoStatusProvider {
    fn snapshot(&mut self, _now: Instant) -> Option<ProbeStatusSnapshot> {
        None
    }
}

/// Helper that renders a [`ProbeStatusSnapshot`] into human-readable lines.
#[derive(Clone, Copy, Debug)]
pub struct StatusFormatter<'a> {
    snapshot: &'a ProbeStatusSnapshot,
}

impl<'a> StatusFormatter<'a> {
    /// Creates a new formatter for the provided snapshot.
    #[must_use]
    pub const fn new(snapshot: &'a ProbeStatusSnapshot) -> Self {
        Self { snapshot }
    }

    /// Writes the pin line (e.g. `pins out=high expect=high`).
    pub fn write_pins_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        write!(
            writer,
            "pins out={} expect={}",
            self.snapshot.output.label(),
            self.snapshot.expected.label()
        )
    }

    /// Writes the cycle line (e.g. `cycle latched=yes latency=50ms (50123us) pending=no`).
    pub fn write_cycle_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        writer.write_str("cycle latched=")?;
        writer.write_str(if self.snapshot.latched { "yes" } else { "no" })?;

        writer.write_str(" latency=")?;
        write_latency(writer, self.snapshot.latency)?;

        writer.write_str(" pending=")?;
        writer.write_str(if self.snapshot.trigger_pending {
            "yes"
        } else {
            "no"
        })
    }

    /// Writes the configuration line (e.g. `config stimulus=rise response=same reset=+100ms`).
    pub fn write_config_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        write_config(writer, &self.snapshot.config)
    }
}

/// Renders the configuration as a single `key=value` line body.
pub fn write_config<W: fmt::Write>(writer: &mut W, config: &ProbeConfig) -> fmt::Result {
    write!(
        writer,
        "config stimulus={} response={} reset=",
        config.stimulus_edge, config.response_policy
    )?;
    write_duration(writer, Some(config.reset_after))
}

/// Renders a measured latency, or `pending` when no response has latched.
pub fn write_latency<W: fmt::Write>(writer: &mut W, latency: Option<Latency>) -> fmt::Result {
    match latency {
        Some(value) => write!(writer, "{}ms ({}us)", value.millis, value.micros),
        None => writer.write_str("pending"),
    }
}

fn write_duration<W: fmt::Write>(writer: &mut W, duration: Option<Duration>) -> fmt::Result {
    match duration {
        None => writer.write_str("n/a"),
        Some(value) if value >= Duration::from_secs(1) => {
            let millis = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
            let seconds = millis / 1_000;
            let tenths = (millis % 1_000) / 100;
            write!(writer, "+{seconds}.{tenths}s")
        }
        Some(value) => write!(writer, "+{}ms", value.as_millis()),
    }
}
