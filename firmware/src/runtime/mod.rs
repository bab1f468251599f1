use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::gpio::{Input, Level, Output, Pull, Speed};
use probe_core::config::{ConfigCell, ProbeConfig};
use probe_core::engine::TimingCell;

use crate::probe::{ResponsePin, StimulusPin};

mod console_task;
mod probe_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

// Shared state lives for the device's uptime: the console task accepts
// triggers and configuration writes, the probe task consumes them.
pub(crate) static TIMING: TimingCell = TimingCell::new();
pub(crate) static CONFIG: ConfigCell = ConfigCell::new(ProbeConfig::DEFAULT);

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PA4,
        PA5,
        USART5,
        PB0,
        PB1,
        ..
    } = hal::init(config);

    // PA4 drives the stimulus edge; PA5 watches the device-under-test
    // response through the internal pull-up.
    let stimulus = StimulusPin::new(Output::new(PA4, Level::Low, Speed::Low));
    let response = ResponsePin::new(Input::new(PA5, Pull::Up));

    spawner
        .spawn(probe_task::run(stimulus, response))
        .expect("failed to spawn probe task");

    spawner
        .spawn(console_task::run(USART5, PB0, PB1))
        .expect("failed to spawn console task");

    core::future::pending::<()>().await;
}
