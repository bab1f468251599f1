#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Telemetry binding and logging helpers for the firmware target.
//!
//! The shared ring recorder from `probe-core` is parameterized with the
//! Embassy-backed instant, and every recorded probe event is mirrored to
//! defmt (or stdout on host builds) so bring-up sessions see edges and
//! latencies without attaching extra tooling.

use probe_core::engine::{Latency, StimulusFire, TickReport};
use probe_core::telemetry::TelemetryRecorder;

use crate::probe::FirmwareInstant;

/// Ring recorder bound to the firmware clock.
pub type Recorder = TelemetryRecorder<FirmwareInstant>;

/// Records everything a scheduler tick did and mirrors it to the log.
pub fn record_tick(recorder: &mut Recorder, report: &TickReport, timestamp: FirmwareInstant) {
    if let Some(fire) = report.fired {
        recorder.record_stimulus(fire, timestamp);
        log_stimulus(&fire, timestamp);
    }

    if let Some(latency) = report.latched {
        recorder.record_response(latency, timestamp);
        log_response(latency, timestamp);
    }

    if report.auto_reset {
        recorder.record_auto_reset(timestamp);
        log_auto_reset(timestamp);
    }
}

fn level_label(high: bool) -> &'static str {
    if high { "high" } else { "low" }
}

#[cfg(target_os = "none")]
fn log_stimulus(fire: &StimulusFire, timestamp: FirmwareInstant) {
    defmt::info!(
        "probe: stimulus {} out={} expect={} t={}us",
        fire.edge.as_name(),
        level_label(fire.output_high),
        level_label(fire.expected_level),
        timestamp.as_micros()
    );
}

#[cfg(not(target_os = "none"))]
fn log_stimulus(fire: &StimulusFire, timestamp: FirmwareInstant) {
    println!(
        "probe: stimulus {} out={} expect={} t={}us",
        fire.edge.as_name(),
        level_label(fire.output_high),
        level_label(fire.expected_level),
        timestamp.as_micros()
    );
}

#[cfg(target_os = "none")]
fn log_response(latency: Latency, timestamp: FirmwareInstant) {
    defmt::info!(
        "probe: response latched latency={}ms ({}us) t={}us",
        latency.millis,
        latency.micros,
        timestamp.as_micros()
    );
}

#[cfg(not(target_os = "none"))]
fn log_response(latency: Latency, timestamp: FirmwareInstant) {
    println!(
        "probe: response latched latency={}ms ({}us) t={}us",
        latency.millis, latency.micros,
        timestamp.as_micros()
    );
}

#[cfg(target_os = "none")]
fn log_auto_reset(timestamp: FirmwareInstant) {
    defmt::info!("probe: auto-reset t={}us", timestamp.as_micros());
}

#[cfg(not(target_os = "none"))]
fn log_auto_reset(timestamp: FirmwareInstant) {
    println!("probe: auto-reset t={}us", timestamp.as_micros());
}
