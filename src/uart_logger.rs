//! Log output.
//!
//! Drains [`LOG_STREAM`](crate::LOG_STREAM) into any `core::fmt::Write` sink.
//! On target the sink is UART1 TX; on the host the binary passes stdout.
//!
//! Line format: `[timestamp_us] LEVEL: message`

use core::fmt::Write;

use crate::logging::{BufWriter, LogEntry, LogStream};

#[cfg(target_os = "espidf")]
use esp_idf_svc::hal::gpio;
#[cfg(target_os = "espidf")]
use esp_idf_svc::hal::peripheral::Peripheral;
#[cfg(target_os = "espidf")]
use esp_idf_svc::hal::uart::{self, UartTxDriver};

/// Longest formatted line.
pub const LINE_LEN: usize = crate::logging::MAX_MSG_LEN + 32;

/// UART configuration for logging.
pub struct UartLoggerConfig {
    pub baud_rate: u32,
    pub tx_pin: u8,
}

impl Default for UartLoggerConfig {
    fn default() -> Self {
        Self {
            baud_rate: 115200,
            tx_pin: 17, // UART1 TX, clear of the DAC (25/26) and pulse pins
        }
    }
}

/// Format one entry, newline included. Returns the number of bytes written.
pub fn format_log_entry(entry: &LogEntry, buf: &mut [u8]) -> usize {
    let mut writer = BufWriter::new(buf);
    let _ = writeln!(
        writer,
        "[{:10}] {}: {}",
        entry.timestamp_us,
        entry.level.as_str(),
        entry.message()
    );
    writer.len()
}

/// Write every pending entry to `out`, then a warning if anything was dropped.
///
/// Returns the number of entries written.
pub fn drain_to<W: Write, const N: usize>(stream: &LogStream<N>, out: &mut W) -> usize {
    let mut line = [0u8; LINE_LEN];
    let mut written = 0;

    while let Some(entry) = stream.drain() {
        let len = format_log_entry(&entry, &mut line);
        // BufWriter only cuts at char boundaries
        if let Ok(text) = core::str::from_utf8(&line[..len]) {
            let _ = out.write_str(text);
        }
        written += 1;
    }

    let dropped = stream.dropped();
    if dropped > 0 {
        let _ = writeln!(out, "[WARN] log dropped: {}", dropped);
        stream.reset_dropped();
    }

    written
}

/// `fmt::Write` adapter over the UART TX driver.
#[cfg(target_os = "espidf")]
pub struct UartSink<'a, 'd> {
    uart: &'a mut UartTxDriver<'d>,
}

#[cfg(target_os = "espidf")]
impl<'a, 'd> UartSink<'a, 'd> {
    pub fn new(uart: &'a mut UartTxDriver<'d>) -> Self {
        Self { uart }
    }
}

#[cfg(target_os = "espidf")]
impl Write for UartSink<'_, '_> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        self.uart
            .write(s.as_bytes())
            .map(|_| ())
            .map_err(|_| core::fmt::Error)
    }
}

/// Initialize UART1 TX-only for logging output.
#[cfg(target_os = "espidf")]
pub fn init_uart_logger<'d>(
    uart: impl Peripheral<P = uart::UART1> + 'd,
    tx_pin: impl Peripheral<P = impl gpio::OutputPin> + 'd,
    config: &UartLoggerConfig,
) -> Result<UartTxDriver<'d>, esp_idf_svc::sys::EspError> {
    let uart_config =
        uart::config::Config::default().baudrate(esp_idf_svc::hal::units::Hertz(config.baud_rate));

    UartTxDriver::new(
        uart,
        tx_pin,
        Option::<gpio::AnyIOPin>::None, // CTS
        Option::<gpio::AnyIOPin>::None, // RTS
        &uart_config,
    )
}
