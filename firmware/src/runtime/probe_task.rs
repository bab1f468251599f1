use embassy_time::{Duration, Instant, Timer};
use probe_core::engine::ProbeEngine;

use crate::probe::{FirmwareClock, FirmwareInstant, ResponsePin, StimulusPin};
use crate::runtime::{CONFIG, TIMING};
use crate::{status, telemetry};

/// Cooperative scheduler period for the probe loop.
const PROBE_TICK: Duration = Duration::from_millis(1);

#[embassy_executor::task]
pub async fn run(stimulus: StimulusPin, response: ResponsePin) -> ! {
    let mut engine = ProbeEngine::new(&TIMING, FirmwareClock, stimulus, response);
    let mut recorder = telemetry::Recorder::new();

    loop {
        let config = CONFIG.get();
        let report = engine.run_once(&config);

        if !report.is_idle() {
            let now = FirmwareInstant::from(Instant::now());
            telemetry::record_tick(&mut recorder, &report, now);
        }

        status::publish(&TIMING);
        Timer::after(PROBE_TICK).await;
    }
}
