#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Shared status storage for the firmware target.
//!
//! Lightweight atomics mirror the probe's cycle state so the console can
//! surface a `ProbeStatusSnapshot` without entering the timing critical
//! section from the console task.

use portable_atomic::{AtomicBool, AtomicU32, Ordering};
use probe_core::config::{ConfigCell, ProbeConfig};
use probe_core::engine::{Latency, TimingCell};
use probe_core::repl::status::{LineLevel, ProbeStatusSnapshot, StatusProvider};

use crate::probe::FirmwareInstant;

/// Level currently driven on the stimulus line.
static OUTPUT_HIGH: AtomicBool = AtomicBool::new(false);
/// Level the response detector is waiting for.
static EXPECTED_HIGH: AtomicBool = AtomicBool::new(false);
/// Indicates whether the current cycle has latched a response.
static LATCHED: AtomicBool = AtomicBool::new(false);
/// Indicates whether a trigger waits for the next scheduler tick.
static TRIGGER_PENDING: AtomicBool = AtomicBool::new(false);
/// Latched latency in milliseconds (value + 1, 0 == unset).
static LATENCY_MS: AtomicU32 = AtomicU32::new(0);
/// Latched latency in microseconds (value + 1, 0 == unset).
static LATENCY_US: AtomicU32 = AtomicU32::new(0);

fn encode(value: u64) -> u32 {
    match u32::try_from(value) {
        Ok(value) => value.saturating_add(1),
        Err(_) => u32::MAX,
    }
}

fn decode(raw: u32) -> Option<u64> {
    if raw == 0 {
        None
    } else {
        Some(u64::from(raw - 1))
    }
}

/// Mirrors the shared timing record into the atomic status store.
pub fn publish(timing: &TimingCell) {
    let state = timing.snapshot();

    OUTPUT_HIGH.store(state.output_high(), Ordering::Relaxed);
    EXPECTED_HIGH.store(state.expected_level(), Ordering::Relaxed);
    LATCHED.store(state.latched(), Ordering::Relaxed);
    TRIGGER_PENDING.store(timing.trigger_pending(), Ordering::Relaxed);

    match state.latency() {
        Some(latency) => {
            LATENCY_MS.store(encode(latency.millis), Ordering::Relaxed);
            LATENCY_US.store(encode(latency.micros), Ordering::Relaxed);
        }
        None => {
            LATENCY_MS.store(0, Ordering::Relaxed);
            LATENCY_US.store(0, Ordering::Relaxed);
        }
    }
}

/// Builds a console snapshot from the mirrored state.
pub fn snapshot(config: ProbeConfig) -> ProbeStatusSnapshot {
    let latency = match (
        decode(LATENCY_MS.load(Ordering::Relaxed)),
        decode(LATENCY_US.load(Ordering::Relaxed)),
    ) {
        (Some(millis), Some(micros)) => Some(Latency { millis, micros }),
        _ => None,
    };

    ProbeStatusSnapshot {
        output: LineLevel::from_high(OUTPUT_HIGH.load(Ordering::Relaxed)),
        expected: LineLevel::from_high(EXPECTED_HIGH.load(Ordering::Relaxed)),
        latched: LATCHED.load(Ordering::Relaxed),
        latency,
        trigger_pending: TRIGGER_PENDING.load(Ordering::Relaxed),
        config,
    }
}

/// Status provider handed to the console session.
#[derive(Copy, Clone)]
pub struct FirmwareStatus {
    config: &'static ConfigCell,
}

impl FirmwareStatus {
    /// Creates a provider reading the shared configuration cell.
    #[must_use]
    pub const fn new(config: &'static ConfigCell) -> Self {
        Self { config }
    }
}

impl StatusProvider<FirmwareInstant> for FirmwareStatus {
    fn snapshot(&mut self, _now: FirmwareInstant) -> Option<ProbeStatusSnapshot> {
        Some(snapshot(self.config.get()))
    }
}
