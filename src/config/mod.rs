//! Module: config
//!
//! Purpose: Board wiring, timing defaults and power-on settings.
//!
//! Architecture:
//! - BOARD: compile-time pin/peripheral assignment
//! - DEFAULT_SETTINGS: used on fresh install or when NVS is unreadable
//! - nvs: last applied settings persisted across resets

pub mod nvs;

use crate::settings::{Settings, WaveformKind};
use crate::wave::quantize::{PULSE_DUTY, PULSE_RESOLUTION_BITS};
use crate::wave::DEFAULT_TICK_PERIOD_US;

/// Peripheral assignment and timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardConfig {
    /// Tick callback period (µs). Shorter periods are not stable with esp_timer.
    pub tick_period_us: u32,
    /// DAC channel (1 = GPIO25, 2 = GPIO26).
    pub dac_channel: u8,
    /// GPIO driven by the LEDC in square mode.
    pub pulse_gpio: i32,
    pub ledc_channel: u8,
    pub ledc_timer: u8,
    /// LEDC duty resolution in square mode.
    pub pulse_resolution_bits: u8,
    /// Duty at that resolution (128 of 256 = 50 %).
    pub pulse_duty: u32,
}

impl BoardConfig {
    pub const fn new() -> Self {
        Self {
            tick_period_us: DEFAULT_TICK_PERIOD_US,
            dac_channel: 1,
            pulse_gpio: 18,
            ledc_channel: 0,
            ledc_timer: 0,
            pulse_resolution_bits: PULSE_RESOLUTION_BITS,
            pulse_duty: PULSE_DUTY,
        }
    }
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Board used by the firmware binary.
pub const BOARD: BoardConfig = BoardConfig::new();

/// Power-on settings: 1 kHz sine, full amplitude.
pub const DEFAULT_SETTINGS: Settings = Settings::new(1000.0, 255, WaveformKind::Sine);
