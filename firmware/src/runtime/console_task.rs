use embassy_stm32 as hal;
use embassy_stm32::Peri;
use embassy_stm32::usart::{BufferedUart, Config as UartConfig, DataBits, Parity, StopBits};
use embassy_time::{Duration, Instant, Timer};
use embedded_io_async::{Read, Write};
use probe_core::engine::ProbeHandle;
use static_cell::StaticCell;

use crate::console::ConsoleSession;
use crate::probe::FirmwareInstant;
use crate::runtime::{CONFIG, TIMING};
use crate::status::FirmwareStatus;

const CONSOLE_BAUD: u32 = 115_200;
const CONSOLE_BUFFER_SIZE: usize = 256;

const BANNER: &str = "\r\nedge-probe console ready. Type `help` for commands.\r\n";
const PROMPT: &str = "> ";

static TX_BUFFER: StaticCell<[u8; CONSOLE_BUFFER_SIZE]> = StaticCell::new();
static RX_BUFFER: StaticCell<[u8; CONSOLE_BUFFER_SIZE]> = StaticCell::new();

embassy_stm32::bind_interrupts!(struct UartIrqs {
    USART3_4_5_6_LPUART1 => embassy_stm32::usart::BufferedInterruptHandler<hal::peripherals::USART5>;
});

#[embassy_executor::task]
pub async fn run(
    usart: Peri<'static, hal::peripherals::USART5>,
    tx_pin: Peri<'static, hal::peripherals::PB0>,
    rx_pin: Peri<'static, hal::peripherals::PB1>,
) -> ! {
    let mut config = UartConfig::default();
    config.baudrate = CONSOLE_BAUD;
    config.data_bits = DataBits::DataBits8;
    config.stop_bits = StopBits::STOP1;
    config.parity = Parity::ParityNone;

    let uart = BufferedUart::new(
        usart,
        rx_pin,
        tx_pin,
        TX_BUFFER.init([0; CONSOLE_BUFFER_SIZE]),
        RX_BUFFER.init([0; CONSOLE_BUFFER_SIZE]),
        UartIrqs,
        config,
    )
    .expect("failed to initialize console UART");

    let (mut tx, mut rx) = uart.split();

    let mut session = ConsoleSession::new(
        ProbeHandle::new(&TIMING, &CONFIG),
        FirmwareStatus::new(&CONFIG),
    );

    let _ = tx.write_all(BANNER.as_bytes()).await;
    let _ = tx.write_all(PROMPT.as_bytes()).await;

    let mut ingress = [0u8; 16];
    loop {
        match rx.read(&mut ingress).await {
            Ok(count) if count > 0 => {
                for &byte in &ingress[..count] {
                    echo(&mut tx, byte).await;

                    let now = FirmwareInstant::from(Instant::now());
                    if let Some(reply) = session.ingest(byte, now) {
                        let _ = tx.write_all(reply.as_bytes()).await;
                    }

                    if byte == b'\r' || byte == b'\n' {
                        let _ = tx.write_all(PROMPT.as_bytes()).await;
                    }
                }
            }
            Ok(_) => {}
            Err(_) => {
                defmt::warn!("console: UART read error");
                Timer::after(Duration::from_millis(5)).await;
            }
        }
    }
}

async fn echo<W: Write>(tx: &mut W, byte: u8) {
    match byte {
        b'\r' | b'\n' => {
            let _ = tx.write_all(b"\r\n").await;
        }
        // Rub out the echoed character on backspace/delete.
        0x08 | 0x7f => {
            let _ = tx.write_all(b"\x08 \x08").await;
        }
        _ => {
            let _ = tx.write_all(&[byte]).await;
        }
    }
}
