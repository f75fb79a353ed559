//! Hardware Abstraction Layer for ESP32 WaveGen.
//!
//! Thin wrappers around ESP-IDF peripherals.
//! Synthesis and quantization stay in core modules, HAL is just I/O.
//!
//! The generator only sees three traits. On target they are backed by the
//! DAC, LEDC and esp_timer drivers; on the host by [`sim::SimBoard`].

#[cfg(target_os = "espidf")]
pub mod dac;
#[cfg(target_os = "espidf")]
pub mod ledc;
#[cfg(target_os = "espidf")]
pub mod timer;

pub mod sim;

#[cfg(target_os = "espidf")]
pub use dac::EspDac;
#[cfg(target_os = "espidf")]
pub use ledc::EspPulse;
#[cfg(target_os = "espidf")]
pub use timer::EspTickTimer;

/// Raw ESP-IDF error code (`esp_err_t`).
pub type EspErrCode = i32;

/// Peripheral setup failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalError {
    /// Periodic timer could not be created, started or stopped.
    Timer(EspErrCode),
    /// DAC channel could not be enabled or disabled.
    Analog(EspErrCode),
    /// LEDC timer/channel could not be configured or stopped.
    Pulse(EspErrCode),
}

impl HalError {
    /// Underlying ESP-IDF error code.
    pub fn code(&self) -> EspErrCode {
        match *self {
            HalError::Timer(c) | HalError::Analog(c) | HalError::Pulse(c) => c,
        }
    }
}

impl core::fmt::Display for HalError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            HalError::Timer(c) => write!(f, "tick timer setup failed (esp_err {})", c),
            HalError::Analog(c) => write!(f, "DAC setup failed (esp_err {})", c),
            HalError::Pulse(c) => write!(f, "LEDC setup failed (esp_err {})", c),
        }
    }
}

/// Single-ended analog output (DAC).
///
/// `write` is called from the tick callback and must not block.
/// All methods take `&self`: the callback and the configurator each hold a handle.
pub trait AnalogOut {
    fn enable(&self) -> Result<(), HalError>;
    fn disable(&self) -> Result<(), HalError>;
    fn write(&self, level: u8);
}

/// Digital pulse output (LEDC PWM).
pub trait PulseOut {
    /// Configure and start a square wave.
    fn arm(&mut self, freq_hz: u32, resolution_bits: u8, duty: u32) -> Result<(), HalError>;
    /// Stop the output and release the pin.
    fn disable(&mut self) -> Result<(), HalError>;
    fn is_armed(&self) -> bool;
}

/// Periodic timer driving [`WaveEngine::tick`](crate::wave::WaveEngine::tick).
pub trait TickTimer {
    fn start(&mut self, period_us: u32) -> Result<(), HalError>;
    fn stop(&mut self) -> Result<(), HalError>;
    fn is_running(&self) -> bool;
}

/// Microseconds since boot, used to stamp log entries.
#[cfg(target_os = "espidf")]
#[inline]
pub fn timestamp_us() -> i64 {
    // SAFETY: esp_timer_get_time is always safe to call
    unsafe { esp_idf_svc::sys::esp_timer_get_time() }
}

/// Host builds have no boot clock.
#[cfg(not(target_os = "espidf"))]
#[inline]
pub fn timestamp_us() -> i64 {
    0
}
