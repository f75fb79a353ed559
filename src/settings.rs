//! Module: settings
//!
//! Purpose: Externally visible generator configuration. Written by the input
//! collaborator, read back by the display collaborator.
//!
//! Safety: Safe. Copy types only, never touched by the tick callback.

use crate::wave::quantize::{clamp_hz, PULSE_MAX_HZ};

/// Amplitude change per up/down event.
pub const AMP_STEP: u8 = 32;

/// Waveform shape.
///
/// Sine, Triangle and Sawtooth are table-driven (continuous mode).
/// Square bypasses the table and runs on the pulse peripheral.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaveformKind {
    #[default]
    Sine = 0,
    Triangle = 1,
    Sawtooth = 2,
    Square = 3,
}

impl WaveformKind {
    /// Convert from u8 (wraps modulo 4).
    #[inline]
    pub const fn from_u8(v: u8) -> Self {
        match v & 3 {
            0 => Self::Sine,
            1 => Self::Triangle,
            2 => Self::Sawtooth,
            _ => Self::Square,
        }
    }

    /// True for table-driven shapes.
    #[inline]
    pub const fn is_continuous(self) -> bool {
        !matches!(self, Self::Square)
    }

    /// Next shape in the button cycle.
    #[inline]
    pub const fn next(self) -> Self {
        Self::from_u8(self as u8 + 1)
    }

    /// Three-letter name shown on the display.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Sine => "SIN",
            Self::Triangle => "TRI",
            Self::Sawtooth => "SAW",
            Self::Square => "SQR",
        }
    }
}

impl From<u8> for WaveformKind {
    fn from(v: u8) -> Self {
        Self::from_u8(v)
    }
}

impl From<WaveformKind> for u8 {
    fn from(w: WaveformKind) -> Self {
        w as u8
    }
}

/// Generator settings.
///
/// `actual_hz` is derived by the configurator. Whatever a caller puts there
/// is overwritten by [`WaveGenerator::apply`](crate::WaveGenerator::apply).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
    /// Requested frequency (user intent).
    pub target_hz: f32,
    /// Frequency the hardware actually produces.
    pub actual_hz: f32,
    /// Amplitude scale, 255 = full scale.
    pub amp: u8,
    /// Active shape.
    pub wave: WaveformKind,
}

impl Settings {
    pub const fn new(target_hz: f32, amp: u8, wave: WaveformKind) -> Self {
        Self {
            target_hz,
            actual_hz: 0.0,
            amp,
            wave,
        }
    }

    /// Amplitude as a percentage of full scale (integer, truncated).
    #[inline]
    pub fn amp_percent(&self) -> u8 {
        (self.amp as u16 * 100 / 255) as u8
    }

    /// Apply one input event and return the adjusted settings.
    ///
    /// Frequency stays inside [1 Hz, 10 MHz]; amplitude saturates at 0 and 255.
    pub fn adjust(mut self, adjustment: Adjustment) -> Self {
        match adjustment {
            Adjustment::FreqUp => self.target_hz *= 1.10,
            Adjustment::FreqDown => self.target_hz *= 0.90,
            Adjustment::AmpUp => self.amp = self.amp.saturating_add(AMP_STEP),
            Adjustment::AmpDown => self.amp = self.amp.saturating_sub(AMP_STEP),
            Adjustment::NextWave => self.wave = self.wave.next(),
        }
        self.target_hz = clamp_hz(self.target_hz, PULSE_MAX_HZ);
        self
    }
}

impl Default for Settings {
    fn default() -> Self {
        crate::config::DEFAULT_SETTINGS
    }
}

/// One debounced input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjustment {
    FreqUp,
    FreqDown,
    AmpUp,
    AmpDown,
    NextWave,
}
