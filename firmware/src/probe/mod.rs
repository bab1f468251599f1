#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Probe surface bridging firmware tasks with `probe-core`.

use core::time::Duration;

use embassy_time::Instant;
use probe_core::telemetry::TelemetryInstant;

#[cfg(target_os = "none")]
use embassy_stm32::gpio::{Input, Output};
#[cfg(target_os = "none")]
use probe_core::engine::{Clock, ResponseLine, StimulusLine};

/// Monotonic timestamp wrapper binding telemetry to Embassy's clock.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct FirmwareInstant(Instant);

impl FirmwareInstant {
    /// Returns the wrapped Embassy instant.
    #[must_use]
    pub const fn into_embassy(self) -> Instant {
        self.0
    }

    /// Microseconds since boot.
    #[must_use]
    pub fn as_micros(self) -> u64 {
        self.0.as_micros()
    }
}

impl From<Instant> for FirmwareInstant {
    fn from(instant: Instant) -> Self {
        Self(instant)
    }
}

impl TelemetryInstant for FirmwareInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        let elapsed = self.0.saturating_duration_since(earlier.0);
        Duration::from_micros(elapsed.as_micros())
    }
}

/// Millisecond/microsecond clock source backed by `embassy-time`.
#[cfg(target_os = "none")]
#[derive(Copy, Clone, Debug, Default)]
pub struct FirmwareClock;

#[cfg(target_os = "none")]
impl Clock for FirmwareClock {
    fn now_ms(&self) -> u64 {
        Instant::now().as_millis()
    }

    fn now_us(&self) -> u64 {
        Instant::now().as_micros()
    }
}

/// Push-pull output driving the stimulus edge.
#[cfg(target_os = "none")]
pub struct StimulusPin {
    pin: Output<'static>,
}

#[cfg(target_os = "none")]
impl StimulusPin {
    pub fn new(pin: Output<'static>) -> Self {
        Self { pin }
    }
}

#[cfg(target_os = "none")]
impl StimulusLine for StimulusPin {
    fn drive(&mut self, high: bool) {
        if high {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
    }
}

/// Pulled-up input sampled for the device-under-test response.
#[cfg(target_os = "none")]
pub struct ResponsePin {
    pin: Input<'static>,
}

#[cfg(target_os = "none")]
impl ResponsePin {
    pub fn new(pin: Input<'static>) -> Self {
        Self { pin }
    }
}

#[cfg(target_os = "none")]
impl ResponseLine for ResponsePin {
    fn sample(&mut self) -> bool {
        self.pin.is_high()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instants_report_saturating_elapsed_time() {
        let earlier = FirmwareInstant::from(Instant::from_micros(100));
        let later = FirmwareInstant::from(Instant::from_micros(350));

        assert_eq!(
            later.saturating_duration_since(earlier),
            Duration::from_micros(250)
        );
        assert_eq!(
            earlier.saturating_duration_since(later),
            Duration::ZERO
        );
        assert_eq!(later.as_micros(), 350);
    }
}
