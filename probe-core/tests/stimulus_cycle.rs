use core::cell::Cell;
use core::time::Duration;

use probe_core::config::{ProbeConfig, ResponsePolicy, StimulusEdge};
use probe_core::engine::{Clock, ProbeEngine, ResponseLine, StimulusLine, TimingCell};

struct BenchClock<'a> {
    micros: &'a Cell<u64>,
}

impl Clock for BenchClock<'_> {
    fn now_ms(&self) -> u64 {
        self.micros.get() / 1_000
    }

    fn now_us(&self) -> u64 {
        self.micros.get()
    }
}

struct BenchLine<'a> {
    level: &'a Cell<bool>,
}

impl StimulusLine for BenchLine<'_> {
    fn drive(&mut self, high: bool) {
        self.level.set(high);
    }
}

impl ResponseLine for BenchLine<'_> {
    fn sample(&mut self) -> bool {
        self.level.get()
    }
}

/// Test bench with independent stimulus and response lines, mimicking a
/// device under test that answers after a fixed reaction delay.
struct Bench {
    micros: Cell<u64>,
    stimulus: Cell<bool>,
    response: Cell<bool>,
    timing: TimingCell,
}

impl Bench {
    fn new() -> Self {
        Self {
            micros: Cell::new(0),
            stimulus: Cell::new(false),
            response: Cell::new(false),
            timing: TimingCell::new(),
        }
    }

    fn engine(&self) -> ProbeEngine<'_, BenchClock<'_>, BenchLine<'_>, BenchLine<'_>> {
        ProbeEngine::new(
            &self.timing,
            BenchClock {
                micros: &self.micros,
            },
            BenchLine {
                level: &self.stimulus,
            },
            BenchLine {
                level: &self.response,
            },
        )
    }
}

#[test]
fn rise_same_cycle_measures_the_reaction_delay() {
    // Edge=rise, policy=same, reset after 100 ms, output starts low.
    let bench = Bench::new();
    let config = ProbeConfig::new(
        StimulusEdge::Rise,
        ResponsePolicy::Same,
        Duration::from_millis(100),
    );
    let mut engine = bench.engine();

    bench
        .timing
        .request_trigger(config.stimulus_edge)
        .expect("trigger accepted from resting low");

    let report = engine.run_once(&config);
    let fire = report.fired.expect("pending trigger dispatched");
    assert!(fire.output_high);
    assert!(fire.expected_level);
    assert!(bench.stimulus.get());

    // The device has not answered yet: ticks at +10 ms latch nothing.
    bench.micros.set(10_000);
    let report = engine.run_once(&config);
    assert!(report.latched.is_none());
    assert!(!report.auto_reset);

    // Device answers at +50 ms.
    bench.micros.set(50_000);
    bench.response.set(true);
    let report = engine.run_once(&config);
    let latency = report.latched.expect("response latched");
    assert_eq!(latency.millis, 50);
    assert_eq!(latency.micros, 50_000);

    // The auto-reset at +100 ms flips the output back without touching
    // the latched measurement.
    bench.micros.set(100_000);
    let report = engine.run_once(&config);
    assert!(report.auto_reset);
    assert!(!bench.stimulus.get());
    assert_eq!(bench.timing.latency(), Some(latency));
}

#[test]
fn toggle_reverse_cycle_never_resets() {
    // Edge=toggle, policy=reverse, output starts high.
    let bench = Bench::new();
    let config = ProbeConfig::new(
        StimulusEdge::Toggle,
        ResponsePolicy::Reverse,
        Duration::from_millis(100),
    );

    let mut engine = bench.engine();
    // Drive the output high first; the rising stimulus also arms a reset
    // deadline the toggle must supersede.
    engine.fire(&ProbeConfig::new(
        StimulusEdge::Rise,
        ResponsePolicy::Same,
        Duration::from_millis(10_000),
    ));
    assert!(bench.timing.snapshot().output_high());
    assert!(bench.timing.snapshot().reset_deadline_ms().is_some());

    bench.micros.set(1_000_000);
    bench
        .timing
        .request_trigger(config.stimulus_edge)
        .expect("toggle always fires");
    let report = engine.run_once(&config);
    let fire = report.fired.expect("toggle dispatched");
    assert!(!fire.output_high);
    assert!(fire.expected_level);
    assert!(bench.timing.snapshot().reset_deadline_ms().is_none());

    // No deadline was armed, so the output never reverts on its own.
    bench.micros.set(60_000_000);
    let report = engine.run_once(&config);
    assert!(!report.auto_reset);
    assert!(!bench.timing.snapshot().output_high());
}

#[test]
fn unanswered_cycle_is_a_legitimate_steady_state() {
    let bench = Bench::new();
    let config = ProbeConfig::new(
        StimulusEdge::Rise,
        ResponsePolicy::Same,
        Duration::from_millis(20),
    );
    let mut engine = bench.engine();
    engine.fire(&config);

    // The device never answers: the reset still fires, the latch stays
    // clear, and the latency query keeps reporting "not yet observed".
    for tick in 1..=100u64 {
        bench.micros.set(tick * 1_000);
        engine.run_once(&config);
    }
    assert!(!bench.timing.snapshot().latched());
    assert_eq!(bench.timing.latency(), None);
    assert!(!bench.stimulus.get());
}

#[test]
fn superseding_trigger_rearms_the_cycle() {
    let bench = Bench::new();
    let config = ProbeConfig::new(
        StimulusEdge::Rise,
        ResponsePolicy::Same,
        Duration::from_millis(100),
    );
    let mut engine = bench.engine();

    engine.fire(&config);
    bench.micros.set(30_000);
    bench.response.set(true);
    engine.sample().expect("first cycle latched");

    // The auto-reset returns the output low; a second accepted trigger
    // rearms the cycle and clears the previous measurement.
    bench.micros.set(100_000);
    assert!(engine.tick_auto_reset());
    bench.response.set(false);

    bench.micros.set(200_000);
    bench
        .timing
        .request_trigger(config.stimulus_edge)
        .expect("second trigger accepted");
    let report = engine.run_once(&config);
    assert!(report.fired.is_some());
    assert!(!bench.timing.snapshot().latched());

    bench.micros.set(280_000);
    bench.response.set(true);
    let latency = engine.sample().expect("second cycle latched");
    assert_eq!(latency.millis, 80);
}
