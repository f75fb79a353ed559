//! Fault state management for ESP32 WaveGen.
//!
//! Range problems are clamped silently. Peripheral setup failures are not:
//! they are latched here so the foreground loop (and the display) can report
//! them, while the generator falls back to silence.

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use crate::hal::HalError;

/// Fault codes indicating why output stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum FaultCode {
    /// No fault (normal operation).
    None = 0,

    /// Periodic tick timer could not be created, started or stopped.
    TimerSetup = 1,

    /// DAC channel could not be enabled or disabled.
    AnalogSetup = 2,

    /// LEDC timer/channel rejected the requested configuration
    /// (e.g. frequency out of reach at 8-bit resolution).
    PulseSetup = 3,
}

impl FaultCode {
    /// Convert from raw u8 value.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => FaultCode::TimerSetup,
            2 => FaultCode::AnalogSetup,
            3 => FaultCode::PulseSetup,
            _ => FaultCode::None,
        }
    }
}

impl From<HalError> for FaultCode {
    fn from(e: HalError) -> Self {
        match e {
            HalError::Timer(_) => FaultCode::TimerSetup,
            HalError::Analog(_) => FaultCode::AnalogSetup,
            HalError::Pulse(_) => FaultCode::PulseSetup,
        }
    }
}

/// Thread-safe fault state.
///
/// Set by the configurator when a peripheral refuses its setup.
/// Checked by the main loop and shown to the user.
///
/// # Usage
///
/// ```ignore
/// static FAULT: FaultState = FaultState::new();
///
/// if let Err(e) = generator.apply(settings) {
///     // FAULT already latched by the generator
///     show_fault(FAULT.code(), FAULT.data());
/// }
/// ```
pub struct FaultState {
    /// True if fault is active.
    active: AtomicBool,

    /// Fault code (reason for fault).
    code: AtomicU8,

    /// Additional data (raw esp_err_t of the failing call).
    data: AtomicU32,

    /// Total fault count since boot (never cleared).
    count: AtomicU32,
}

impl FaultState {
    /// Create new fault state (no fault).
    pub const fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
            code: AtomicU8::new(0),
            data: AtomicU32::new(0),
            count: AtomicU32::new(0),
        }
    }

    /// Set fault state.
    ///
    /// Stores code and data first, then publishes `active`.
    /// Increments the fault counter.
    #[inline]
    pub fn set(&self, code: FaultCode, data: u32) {
        self.code.store(code as u8, Ordering::Release);
        self.data.store(data, Ordering::Release);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.active.store(true, Ordering::Release);
    }

    /// Latch a HAL error (data = error code bits).
    #[inline]
    pub fn raise(&self, err: HalError) {
        self.set(FaultCode::from(err), err.code() as u32);
    }

    /// Check if fault is currently active.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Get fault code (only meaningful if `is_active()` is true).
    #[inline]
    pub fn code(&self) -> FaultCode {
        FaultCode::from_u8(self.code.load(Ordering::Acquire))
    }

    /// Get fault data.
    #[inline]
    pub fn data(&self) -> u32 {
        self.data.load(Ordering::Acquire)
    }

    /// Get total fault count since boot.
    #[inline]
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }

    /// Clear fault state (after a successful reconfiguration).
    ///
    /// Clears the active flag only; the counter keeps the history.
    #[inline]
    pub fn clear(&self) {
        self.active.store(false, Ordering::Release);
    }

    /// Get a snapshot of the current fault state.
    #[inline]
    pub fn snapshot(&self) -> FaultSnapshot {
        FaultSnapshot {
            active: self.is_active(),
            code: self.code(),
            data: self.data(),
            count: self.count(),
        }
    }
}

impl Default for FaultState {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of fault state at a point in time.
#[derive(Clone, Copy, Debug)]
pub struct FaultSnapshot {
    pub active: bool,
    pub code: FaultCode,
    pub data: u32,
    pub count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_state_basic() {
        let fault = FaultState::new();

        assert!(!fault.is_active());
        assert_eq!(fault.code(), FaultCode::None);
        assert_eq!(fault.count(), 0);

        fault.set(FaultCode::PulseSetup, 42);

        assert!(fault.is_active());
        assert_eq!(fault.code(), FaultCode::PulseSetup);
        assert_eq!(fault.data(), 42);
        assert_eq!(fault.count(), 1);

        fault.clear();

        assert!(!fault.is_active());
        assert_eq!(fault.count(), 1); // Count preserved
    }

    #[test]
    fn test_raise_maps_hal_error() {
        let fault = FaultState::new();

        fault.raise(HalError::Timer(0x103));
        assert_eq!(fault.code(), FaultCode::TimerSetup);
        assert_eq!(fault.data(), 0x103);

        fault.raise(HalError::Analog(-1));
        let snap = fault.snapshot();
        assert!(snap.active);
        assert_eq!(snap.code, FaultCode::AnalogSetup);
        assert_eq!(snap.data, u32::MAX);
        assert_eq!(snap.count, 2);
    }
}
