//! Simulated device under test.
//!
//! The harness models the loopback fixture the probe is normally wired
//! to: the stimulus level reappears on the response line after a
//! configurable reaction delay. Time is virtual; the session advances it
//! in scheduler-tick steps so measured latencies are deterministic.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use probe_core::engine::{Clock, ResponseLine, StimulusLine};

struct DeviceState {
    now_us: u64,
    response_high: bool,
    react_after: Duration,
    /// Response level scheduled to appear once the due timestamp passes.
    pending: Option<(u64, bool)>,
}

/// Owns the virtual clock and the simulated device.
pub struct Harness {
    state: Rc<RefCell<DeviceState>>,
}

impl Harness {
    pub fn new(react_after: Duration) -> Self {
        Self {
            state: Rc::new(RefCell::new(DeviceState {
                now_us: 0,
                response_high: false,
                react_after,
                pending: None,
            })),
        }
    }

    /// Clock handle for the probe engine.
    pub fn clock(&self) -> HarnessClock {
        HarnessClock(Rc::clone(&self.state))
    }

    /// Stimulus line handle for the probe engine.
    pub fn stimulus(&self) -> HarnessStimulus {
        HarnessStimulus(Rc::clone(&self.state))
    }

    /// Response line handle for the probe engine.
    pub fn response(&self) -> HarnessResponse {
        HarnessResponse(Rc::clone(&self.state))
    }

    /// Advances virtual time, delivering any due device reaction.
    pub fn advance(&self, step: Duration) {
        let mut state = self.state.borrow_mut();
        state.now_us += u64::try_from(step.as_micros()).unwrap_or(u64::MAX);

        if let Some((due_us, level)) = state.pending {
            if state.now_us >= due_us {
                state.response_high = level;
                state.pending = None;
            }
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.state.borrow().now_us / 1_000
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_micros(self.state.borrow().now_us)
    }

    pub fn react_after(&self) -> Duration {
        self.state.borrow().react_after
    }

    pub fn set_react_after(&self, react_after: Duration) {
        self.state.borrow_mut().react_after = react_after;
    }
}

/// Virtual millisecond/microsecond counters.
pub struct HarnessClock(Rc<RefCell<DeviceState>>);

impl Clock for HarnessClock {
    fn now_ms(&self) -> u64 {
        self.0.borrow().now_us / 1_000
    }

    fn now_us(&self) -> u64 {
        self.0.borrow().now_us
    }
}

/// Stimulus line wired into the simulated device.
pub struct HarnessStimulus(Rc<RefCell<DeviceState>>);

impl StimulusLine for HarnessStimulus {
    fn drive(&mut self, high: bool) {
        let mut state = self.0.borrow_mut();
        let due_us = state.now_us
            + u64::try_from(state.react_after.as_micros()).unwrap_or(u64::MAX);
        // A fresh edge replaces any reaction still in flight.
        state.pending = Some((due_us, high));
    }
}

/// Response line observed by the probe.
pub struct HarnessResponse(Rc<RefCell<DeviceState>>);

impl ResponseLine for HarnessResponse {
    fn sample(&mut self) -> bool {
        self.0.borrow().response_high
    }
}
