//! Frequency quantizer
//!
//! Maps a requested frequency onto what the hardware can actually do:
//! - continuous shapes: an integer phase step at a fixed tick rate
//! - square: native LEDC frequency at fixed 8-bit resolution, 50 % duty
//!
//! Out-of-range requests are clamped, never rejected.

use super::lut::LUT_SIZE;

/// DAC path ceiling (Hz).
pub const DAC_MAX_HZ: f32 = 20_000.0;

/// Pulse path ceiling (Hz).
pub const PULSE_MAX_HZ: f32 = 10_000_000.0;

/// Lowest frequency either path accepts (Hz).
pub const MIN_HZ: f32 = 1.0;

/// Smallest phase step (keeps the phase moving).
pub const MIN_STEP: u16 = 1;

/// Largest phase step. Beyond this the shape degrades too far.
pub const MAX_STEP: u16 = 64;

/// Default pulse timer resolution.
pub const PULSE_RESOLUTION_BITS: u8 = 8;

/// 50 % duty at the default resolution.
pub const PULSE_DUTY: u32 = 1 << (PULSE_RESOLUTION_BITS - 1);

/// Phase-step plan for a table-driven shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContinuousPlan {
    /// Requested frequency after range clamping.
    pub clamped_hz: f32,
    /// Unrounded step, `clamped_hz * N / fs`.
    pub ideal_step: f32,
    /// Step written to the engine.
    pub step: u16,
    /// `fs * step / N`.
    pub actual_hz: f32,
}

/// Native parameters for the pulse peripheral.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PulsePlan {
    /// Requested frequency after range clamping.
    pub clamped_hz: f32,
    /// Frequency handed to the LEDC timer.
    pub freq_hz: u32,
    pub resolution_bits: u8,
    pub duty: u32,
}

impl PulsePlan {
    /// The LEDC is trusted to hit the request; no feedback correction.
    #[inline]
    pub fn actual_hz(&self) -> f32 {
        self.clamped_hz
    }
}

/// Tick rate in Hz for a given tick period.
#[inline]
pub fn tick_rate_hz(tick_period_us: u32) -> f32 {
    1_000_000.0 / tick_period_us.max(1) as f32
}

/// Quantize a request for a continuous shape.
pub fn plan_continuous(target_hz: f32, tick_period_us: u32) -> ContinuousPlan {
    let clamped_hz = clamp_hz(target_hz, DAC_MAX_HZ);
    let fs = tick_rate_hz(tick_period_us);
    let ideal_step = clamped_hz * LUT_SIZE as f32 / fs;

    // Round half up, then bound
    let step = ((ideal_step + 0.5) as u16).clamp(MIN_STEP, MAX_STEP);

    ContinuousPlan {
        clamped_hz,
        ideal_step,
        step,
        actual_hz: fs * step as f32 / LUT_SIZE as f32,
    }
}

/// Plan the square output at the board's resolution and duty.
///
/// The LEDC takes an integer frequency; the fraction is dropped.
pub fn plan_pulse(target_hz: f32, resolution_bits: u8, duty: u32) -> PulsePlan {
    let clamped_hz = clamp_hz(target_hz, PULSE_MAX_HZ);

    PulsePlan {
        clamped_hz,
        freq_hz: clamped_hz as u32,
        resolution_bits,
        duty,
    }
}

/// Clamp to `[MIN_HZ, max_hz]`. NaN maps to `MIN_HZ`.
#[inline]
pub fn clamp_hz(hz: f32, max_hz: f32) -> f32 {
    if hz.is_nan() {
        MIN_HZ
    } else {
        hz.clamp(MIN_HZ, max_hz)
    }
}
