//! Waveform lookup tables
//!
//! Three 256-entry tables covering one full period each.
//! Values are unipolar u8 (mid-scale = zero signal) for direct use with the DAC.

use crate::settings::WaveformKind;

/// Number of entries in each LUT
pub const LUT_SIZE: usize = 256;

/// Index mask (LUT_SIZE is a power of two)
pub const LUT_MASK: u16 = (LUT_SIZE - 1) as u16;

/// Pre-computed sine, triangle and sawtooth tables.
///
/// Built by a `const fn`, so a `static` instance is finished before the
/// first tick can possibly run and is never written afterwards.
#[derive(Clone)]
pub struct LookupTables {
    sine: [u8; LUT_SIZE],
    triangle: [u8; LUT_SIZE],
    sawtooth: [u8; LUT_SIZE],
}

impl LookupTables {
    /// Build all three tables.
    ///
    /// - sine: `127.5 + 127.5 * sin(2π i / N)`, rounded by `+0.5` then truncation
    /// - triangle: `2i` rising up to N/2, then `2(N - 1 - i)` falling
    /// - sawtooth: `i`
    pub const fn build() -> Self {
        let mut sine = [0u8; LUT_SIZE];
        let mut triangle = [0u8; LUT_SIZE];
        let mut sawtooth = [0u8; LUT_SIZE];

        let mut i = 0;
        while i < LUT_SIZE {
            let angle = (i as f64) * core::f64::consts::TAU / (LUT_SIZE as f64);
            sine[i] = (127.5 + 127.5 * const_sin(angle) + 0.5) as u8;

            triangle[i] = if i < LUT_SIZE / 2 {
                (i * 2) as u8
            } else {
                ((LUT_SIZE - 1 - i) * 2) as u8
            };

            sawtooth[i] = i as u8;
            i += 1;
        }

        Self {
            sine,
            triangle,
            sawtooth,
        }
    }

    /// Table for a continuous shape, `None` for Square.
    #[inline]
    pub fn table(&self, wave: WaveformKind) -> Option<&[u8; LUT_SIZE]> {
        match wave {
            WaveformKind::Sine => Some(&self.sine),
            WaveformKind::Triangle => Some(&self.triangle),
            WaveformKind::Sawtooth => Some(&self.sawtooth),
            WaveformKind::Square => None,
        }
    }

    #[inline]
    pub fn sine(&self) -> &[u8; LUT_SIZE] {
        &self.sine
    }

    #[inline]
    pub fn triangle(&self) -> &[u8; LUT_SIZE] {
        &self.triangle
    }

    #[inline]
    pub fn sawtooth(&self) -> &[u8; LUT_SIZE] {
        &self.sawtooth
    }
}

impl Default for LookupTables {
    fn default() -> Self {
        Self::build()
    }
}

/// Const-compatible sine.
///
/// Folds the angle into [-π/2, π/2] and evaluates a Taylor series up to x¹³,
/// which keeps the error far below one LSB of the 8-bit table.
const fn const_sin(x: f64) -> f64 {
    use core::f64::consts::{FRAC_PI_2, PI, TAU};

    // Normalize to [-π, π]
    let mut x = x;
    while x > PI {
        x -= TAU;
    }
    while x < -PI {
        x += TAU;
    }

    // sin(π - x) = sin(x)
    if x > FRAC_PI_2 {
        x = PI - x;
    } else if x < -FRAC_PI_2 {
        x = -PI - x;
    }

    let x2 = x * x;
    let mut term = x;
    let mut sum = x;
    let mut n = 1;
    while n < 7 {
        term = -term * x2 / (((2 * n) * (2 * n + 1)) as f64);
        sum += term;
        n += 1;
    }
    sum
}
