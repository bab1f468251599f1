//! Telemetry event catalog and payload structures shared by firmware and
//! host targets.
//!
//! Event kinds serialize to compact numeric codes for transport over
//! diagnostics channels; payload structs carry the extra metadata the
//! console and transcript tooling surface while remaining `no_std`
//! compatible.

#![cfg_attr(not(test), allow(dead_code))]

use core::{fmt, time::Duration};

use heapless::{HistoryBuf, OldestOrdered};

use crate::config::{ProbeConfig, StimulusEdge};
use crate::engine::{Latency, StimulusFire};

/// Identifier used when tracking emitted telemetry events.
pub type EventId = u32;

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 128;

/// Discriminated telemetry events shared across all probe targets.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryEventKind {
    StimulusFired(StimulusEdge),
    ResponseLatched,
    AutoReset,
    TriggerRejected,
    ConfigApplied,
    Custom(u16),
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::StimulusFired(edge) => write!(f, "stimulus-fired {edge}"),
            TelemetryEventKind::ResponseLatched => f.write_str("response-latched"),
            TelemetryEventKind::AutoReset => f.write_str("auto-reset"),
            TelemetryEventKind::TriggerRejected => f.write_str("trigger-rejected"),
            TelemetryEventKind::ConfigApplied => f.write_str("config-applied"),
            TelemetryEventKind::Custom(code) => write!(f, "custom({code})"),
        }
    }
}

impl TelemetryEventKind {
    const STIMULUS_BASE: u16 = 0x0000;
    const RESPONSE_LATCHED_CODE: u16 = 0x0008;
    const AUTO_RESET_CODE: u16 = 0x0009;
    const TRIGGER_REJECTED_CODE: u16 = 0x000A;
    const CONFIG_APPLIED_CODE: u16 = 0x000B;

    /// Encodes the event into a compact transport-friendly discriminant.
    #[must_use]
    pub const fn to_raw(self) -> u16 {
        match self {
            TelemetryEventKind::StimulusFired(edge) => Self::STIMULUS_BASE + edge_index(edge),
            TelemetryEventKind::ResponseLatched => Self::RESPONSE_LATCHED_CODE,
            TelemetryEventKind::AutoReset => Self::AUTO_RESET_CODE,
            TelemetryEventKind::TriggerRejected => Self::TRIGGER_REJECTED_CODE,
            TelemetryEventKind::ConfigApplied => Self::CONFIG_APPLIED_CODE,
            TelemetryEventKind::Custom(code) => code,
        }
    }

    /// Decodes a raw discriminant, falling back to [`Custom`] for codes
    /// this build does not recognize.
    ///
    /// [`Custom`]: TelemetryEventKind::Custom
    #[must_use]
    pub fn from_raw(code: u16) -> Self {
        match code {
            Self::RESPONSE_LATCHED_CODE => TelemetryEventKind::ResponseLatched,
            Self::AUTO_RESET_CODE => TelemetryEventKind::AutoReset,
            Self::TRIGGER_REJECTED_CODE => TelemetryEventKind::TriggerRejected,
            Self::CONFIG_APPLIED_CODE => TelemetryEventKind::ConfigApplied,
            value if (Self::STIMULUS_BASE..Self::STIMULUS_BASE + 3).contains(&value) => {
                let offset = value - Self::STIMULUS_BASE;
                edge_from_index(offset).map_or(TelemetryEventKind::Custom(value), |edge| {
                    TelemetryEventKind::StimulusFired(edge)
                })
            }
            other => TelemetryEventKind::Custom(other),
        }
    }
}

/// Payloads carried alongside telemetry events.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TelemetryPayload {
    /// No additional metadata accompanies the event.
    None,
    /// Details describing a committed stimulus edge.
    Stimulus(StimulusTelemetry),
    /// Measured latency captured when a response latched.
    Response(ResponseTelemetry),
    /// Configuration in force after a console write.
    Config(ConfigTelemetry),
}

impl TelemetryPayload {
    /// Convenience constructor when no payload data is needed.
    #[must_use]
    pub const fn none() -> Self {
        TelemetryPayload::None
    }
}

/// Stimulus edge payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StimulusTelemetry {
    pub edge: StimulusEdge,
    pub output_high: bool,
    pub expected_level: bool,
    pub elapsed_since_previous: Option<Duration>,
}

impl StimulusTelemetry {
    #[must_use]
    pub const fn new(fire: StimulusFire, elapsed_since_previous: Option<Duration>) -> Self {
        Self {
            edge: fire.edge,
            output_high: fire.output_high,
            expected_level: fire.expected_level,
            elapsed_since_previous,
        }
    }
}

/// Response latch payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ResponseTelemetry {
    pub latency: Latency,
}

impl ResponseTelemetry {
    #[must_use]
    pub const fn new(latency: Latency) -> Self {
        Self { latency }
    }
}

/// Configuration payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ConfigTelemetry {
    pub config: ProbeConfig,
}

impl ConfigTelemetry {
    #[must_use]
    pub const fn new(config: ProbeConfig) -> Self {
        Self { config }
    }
}

/// Trait implemented by monotonic instant wrappers used for telemetry
/// tracking.
pub trait TelemetryInstant: Copy {
    /// Returns the saturating duration from `earlier` to `self`.
    fn saturating_duration_since(&self, earlier: Self) -> Duration;
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TelemetryRecord<TInstant>
where
    TInstant: Copy,
{
    pub id: EventId,
    pub timestamp: TInstant,
    pub event: TelemetryEventKind,
    pub details: TelemetryPayload,
}

/// Telemetry ring buffer type alias.
pub type TelemetryRing<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY> =
    HistoryBuf<TelemetryRecord<TInstant>, CAPACITY>;

/// Records telemetry events into a fixed-size ring buffer.
pub struct TelemetryRecorder<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY>
where
    TInstant: Copy,
{
    ring: TelemetryRing<TInstant, CAPACITY>,
    last_stimulus_at: Option<TInstant>,
    next_event_id: EventId,
}

impl<TInstant, const CAPACITY: usize> TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy + TelemetryInstant,
{
    /// Creates a new telemetry recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            last_stimulus_at: None,
            next_event_id: 0,
        }
    }

    /// Returns an iterator over the recorded telemetry in chronological
    /// order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord<TInstant>> {
        self.ring.oldest_ordered()
    }

    /// Returns the most recent telemetry record, if available.
    pub fn latest(&self) -> Option<&TelemetryRecord<TInstant>> {
        self.ring.recent()
    }

    /// Returns the number of records currently stored.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Returns `true` when no telemetry records are stored.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Records a committed stimulus edge, capturing elapsed time since the
    /// previous stimulus.
    pub fn record_stimulus(&mut self, fire: StimulusFire, timestamp: TInstant) -> EventId {
        let elapsed = self
            .last_stimulus_at
            .map(|previous| timestamp.saturating_duration_since(previous));
        self.last_stimulus_at = Some(timestamp);

        self.record(
            TelemetryEventKind::StimulusFired(fire.edge),
            TelemetryPayload::Stimulus(StimulusTelemetry::new(fire, elapsed)),
            timestamp,
        )
    }

    /// Records a latched response with its measured latency.
    pub fn record_response(&mut self, latency: Latency, timestamp: TInstant) -> EventId {
        self.record(
            TelemetryEventKind::ResponseLatched,
            TelemetryPayload::Response(ResponseTelemetry::new(latency)),
            timestamp,
        )
    }

    /// Records an auto-reset of the output line.
    pub fn record_auto_reset(&mut self, timestamp: TInstant) -> EventId {
        self.record(
            TelemetryEventKind::AutoReset,
            TelemetryPayload::None,
            timestamp,
        )
    }

    /// Records a trigger request refused by the no-op guard.
    pub fn record_trigger_rejected(&mut self, timestamp: TInstant) -> EventId {
        self.record(
            TelemetryEventKind::TriggerRejected,
            TelemetryPayload::None,
            timestamp,
        )
    }

    /// Records a configuration write with the resulting configuration.
    pub fn record_config(&mut self, config: ProbeConfig, timestamp: TInstant) -> EventId {
        self.record(
            TelemetryEventKind::ConfigApplied,
            TelemetryPayload::Config(ConfigTelemetry::new(config)),
            timestamp,
        )
    }

    /// Records an arbitrary telemetry event with the supplied payload.
    pub fn record(
        &mut self,
        event: TelemetryEventKind,
        payload: TelemetryPayload,
        timestamp: TInstant,
    ) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            event,
            details: payload,
        });

        id
    }
}

impl<TInstant, const CAPACITY: usize> Default for TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy + TelemetryInstant,
{
    fn default() -> Self {
        Self::new()
    }
}

const fn edge_index(edge: StimulusEdge) -> u16 {
    match edge {
        StimulusEdge::Rise => 0,
        StimulusEdge::Fall => 1,
        StimulusEdge::Toggle => 2,
    }
}

fn edge_from_index(index: u16) -> Option<StimulusEdge> {
    match index {
        0 => Some(StimulusEdge::Rise),
        1 => Some(StimulusEdge::Fall),
        2 => Some(StimulusEdge::Toggle),
        _ => None,
    }
}
