//! Stimulus/response configuration shared by firmware and host targets.
//!
//! The persisted store behind this configuration is owned by the hosting
//! platform; this module only defines the typed view of it: the edge and
//! policy enums with their wire names, the defaults applied when a stored
//! field is missing or unrecognized, and the partial-update record used by
//! the operator console.

use core::cell::Cell;
use core::fmt;
use core::time::Duration;

use critical_section::Mutex;

/// Wire names for [`StimulusEdge`], in declaration order.
pub const STIMULUS_EDGE_NAMES: [&str; 3] = ["rise", "fall", "toggle"];

/// Wire names for [`ResponsePolicy`], in declaration order.
pub const RESPONSE_POLICY_NAMES: [&str; 4] = ["same", "reverse", "rise", "fall"];

/// Edge driven on the stimulus line when a trigger fires.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum StimulusEdge {
    #[default]
    Rise,
    Fall,
    Toggle,
}

impl StimulusEdge {
    /// Wire name used by the persisted configuration and the console.
    #[must_use]
    pub const fn as_name(self) -> &'static str {
        match self {
            StimulusEdge::Rise => "rise",
            StimulusEdge::Fall => "fall",
            StimulusEdge::Toggle => "toggle",
        }
    }

    /// Parses a wire name without applying the lenient fallback.
    #[must_use]
    pub fn try_from_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("rise") {
            Some(StimulusEdge::Rise)
        } else if name.eq_ignore_ascii_case("fall") {
            Some(StimulusEdge::Fall)
        } else if name.eq_ignore_ascii_case("toggle") {
            Some(StimulusEdge::Toggle)
        } else {
            None
        }
    }

    /// Parses a wire name, mapping unrecognized input to the documented
    /// default of [`StimulusEdge::Rise`].
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        Self::try_from_name(name).unwrap_or_default()
    }

    /// Level the output settles at after this edge, given the level it
    /// held before.
    #[must_use]
    pub const fn apply(self, output_high: bool) -> bool {
        match self {
            StimulusEdge::Rise => true,
            StimulusEdge::Fall => false,
            StimulusEdge::Toggle => !output_high,
        }
    }
}

impl fmt::Display for StimulusEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_name())
    }
}

/// Input level the response detector waits for after a stimulus.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum ResponsePolicy {
    #[default]
    Same,
    Reverse,
    Rise,
    Fall,
}

impl ResponsePolicy {
    /// Wire name used by the persisted configuration and the console.
    #[must_use]
    pub const fn as_name(self) -> &'static str {
        match self {
            ResponsePolicy::Same => "same",
            ResponsePolicy::Reverse => "reverse",
            ResponsePolicy::Rise => "rise",
            ResponsePolicy::Fall => "fall",
        }
    }

    /// Parses a wire name without applying the lenient fallback.
    #[must_use]
    pub fn try_from_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("same") {
            Some(ResponsePolicy::Same)
        } else if name.eq_ignore_ascii_case("reverse") {
            Some(ResponsePolicy::Reverse)
        } else if name.eq_ignore_ascii_case("rise") {
            Some(ResponsePolicy::Rise)
        } else if name.eq_ignore_ascii_case("fall") {
            Some(ResponsePolicy::Fall)
        } else {
            None
        }
    }

    /// Parses a wire name, mapping unrecognized input to the documented
    /// default of [`ResponsePolicy::Same`].
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        Self::try_from_name(name).unwrap_or_default()
    }

    /// Input level this policy expects after the output settled at
    /// `output_high`.
    #[must_use]
    pub const fn expected_level(self, output_high: bool) -> bool {
        match self {
            ResponsePolicy::Same => output_high,
            ResponsePolicy::Reverse => !output_high,
            ResponsePolicy::Rise => true,
            ResponsePolicy::Fall => false,
        }
    }
}

impl fmt::Display for ResponsePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_name())
    }
}

/// Active stimulus/response configuration for one probe instance.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ProbeConfig {
    pub stimulus_edge: StimulusEdge,
    pub response_policy: ResponsePolicy,
    /// Delay before the output reverts to its resting level after a
    /// non-toggle stimulus. Zero still schedules the reset; it fires on
    /// the first tick at or after the stimulus timestamp.
    pub reset_after: Duration,
}

impl ProbeConfig {
    /// Configuration applied when no persisted fields are present.
    pub const DEFAULT: Self = Self {
        stimulus_edge: StimulusEdge::Rise,
        response_policy: ResponsePolicy::Same,
        reset_after: Duration::ZERO,
    };

    /// Creates a configuration from explicit parts.
    #[must_use]
    pub const fn new(
        stimulus_edge: StimulusEdge,
        response_policy: ResponsePolicy,
        reset_after: Duration,
    ) -> Self {
        Self {
            stimulus_edge,
            response_policy,
            reset_after,
        }
    }

    /// Builds a configuration from the three independently optional
    /// persisted fields, applying the documented defaults for missing or
    /// unrecognized values.
    #[must_use]
    pub fn from_names(
        stimulus: Option<&str>,
        response: Option<&str>,
        reset_ms: Option<u32>,
    ) -> Self {
        Self {
            stimulus_edge: stimulus.map(StimulusEdge::from_name).unwrap_or_default(),
            response_policy: response.map(ResponsePolicy::from_name).unwrap_or_default(),
            reset_after: Duration::from_millis(u64::from(reset_ms.unwrap_or(0))),
        }
    }

    /// Reset delay in whole milliseconds, as used by the deadline math.
    #[must_use]
    pub fn reset_after_ms(&self) -> u64 {
        u64::try_from(self.reset_after.as_millis()).unwrap_or(u64::MAX)
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Partial configuration write with independently optional fields.
///
/// Each field present in the update is applied on its own; a `response`
/// update never touches the stimulus edge and vice versa.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ConfigUpdate {
    pub stimulus_edge: Option<StimulusEdge>,
    pub response_policy: Option<ResponsePolicy>,
    pub reset_after: Option<Duration>,
}

impl ConfigUpdate {
    /// An update that changes nothing.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            stimulus_edge: None,
            response_policy: None,
            reset_after: None,
        }
    }

    /// Update carrying only a stimulus edge.
    #[must_use]
    pub const fn stimulus(edge: StimulusEdge) -> Self {
        Self {
            stimulus_edge: Some(edge),
            response_policy: None,
            reset_after: None,
        }
    }

    /// Update carrying only a response policy.
    #[must_use]
    pub const fn response(policy: ResponsePolicy) -> Self {
        Self {
            stimulus_edge: None,
            response_policy: Some(policy),
            reset_after: None,
        }
    }

    /// Update carrying only a reset delay.
    #[must_use]
    pub const fn reset(after: Duration) -> Self {
        Self {
            stimulus_edge: None,
            response_policy: None,
            reset_after: Some(after),
        }
    }

    /// Returns `true` when no field is present.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.stimulus_edge.is_none()
            && self.response_policy.is_none()
            && self.reset_after.is_none()
    }

    /// Applies the present fields to `config`, returning `true` when any
    /// stored value actually changed.
    pub fn apply(self, config: &mut ProbeConfig) -> bool {
        let mut changed = false;

        if let Some(edge) = self.stimulus_edge {
            changed |= config.stimulus_edge != edge;
            config.stimulus_edge = edge;
        }
        if let Some(policy) = self.response_policy {
            changed |= config.response_policy != policy;
            config.response_policy = policy;
        }
        if let Some(after) = self.reset_after {
            changed |= config.reset_after != after;
            config.reset_after = after;
        }

        changed
    }
}

/// Cross-context cell holding the active configuration.
///
/// Reads and writes are whole-record swaps inside a critical section so a
/// console task and the probe loop never observe a half-applied update.
pub struct ConfigCell {
    inner: Mutex<Cell<ProbeConfig>>,
}

impl ConfigCell {
    /// Creates a cell seeded with the provided configuration.
    #[must_use]
    pub const fn new(config: ProbeConfig) -> Self {
        Self {
            inner: Mutex::new(Cell::new(config)),
        }
    }

    /// Copies the active configuration out.
    #[must_use]
    pub fn get(&self) -> ProbeConfig {
        critical_section::with(|cs| self.inner.borrow(cs).get())
    }

    /// Replaces the active configuration.
    pub fn set(&self, config: ProbeConfig) {
        critical_section::with(|cs| self.inner.borrow(cs).set(config));
    }

    /// Applies a partial update and returns the resulting configuration.
    pub fn update(&self, update: ConfigUpdate) -> ProbeConfig {
        critical_section::with(|cs| {
            let cell = self.inner.borrow(cs);
            let mut config = cell.get();
            update.apply(&mut config);
            cell.set(config);
            config
        })
    }
}

impl Default for ConfigCell {
    fn default() -> Self {
        Self::new(ProbeConfig::DEFAULT)
    }
}
