//! Phase accumulator and sample emitter
//!
//! One `WaveEngine` lives for the whole program. It is shared by reference
//! between the foreground configurator and the tick callback.
//!
//! # Ownership per field
//!
//! | field            | sole writer         | reader              |
//! |------------------|---------------------|---------------------|
//! | `phase`          | tick callback       | callback, foreground|
//! | `phase_step`     | foreground          | callback            |
//! | `amp_scale`      | foreground          | callback            |
//! | `active_wave`    | foreground          | callback            |
//! | `tick_period_us` | foreground          | foreground          |
//!
//! Every field is a single atomic, so the callback never waits on anything.
//! Changes that must land together with the tick period (mode switch,
//! period change) are made with the callback stopped.

use core::sync::atomic::{AtomicU16, AtomicU32, AtomicU8, Ordering};

use super::lut::{LookupTables, LUT_MASK};
use crate::hal::AnalogOut;
use crate::settings::WaveformKind;

/// Default tick period in microseconds (20 kHz tick rate).
pub const DEFAULT_TICK_PERIOD_US: u32 = 50;

/// Scale a table sample by an 8-bit amplitude.
///
/// `(raw * amp) >> 8`: fast approximation of `raw * amp / 255`,
/// slightly under full scale at amp = 255.
#[inline(always)]
pub const fn scale_sample(raw: u8, amp: u8) -> u8 {
    ((raw as u16 * amp as u16) >> 8) as u8
}

/// Process-lifetime synthesis state.
pub struct WaveEngine {
    tables: LookupTables,
    phase: AtomicU16,
    phase_step: AtomicU16,
    amp_scale: AtomicU8,
    active_wave: AtomicU8,
    tick_period_us: AtomicU32,
}

impl WaveEngine {
    /// Create an engine with freshly built tables.
    ///
    /// Starts in Sine at step 1, full amplitude.
    pub const fn new(tick_period_us: u32) -> Self {
        Self {
            tables: LookupTables::build(),
            phase: AtomicU16::new(0),
            phase_step: AtomicU16::new(1),
            amp_scale: AtomicU8::new(255),
            active_wave: AtomicU8::new(WaveformKind::Sine as u8),
            tick_period_us: AtomicU32::new(tick_period_us),
        }
    }

    /// Produce the next output level and advance the phase.
    ///
    /// Returns `None` (and leaves the phase untouched) while Square is active.
    /// Callback context only: this is the single writer of `phase`.
    #[inline]
    pub fn next_sample(&self) -> Option<u8> {
        let wave = WaveformKind::from_u8(self.active_wave.load(Ordering::Acquire));
        let table = self.tables.table(wave)?;

        let phase = self.phase.load(Ordering::Relaxed);
        let raw = table[(phase & LUT_MASK) as usize];
        let out = scale_sample(raw, self.amp_scale.load(Ordering::Relaxed));

        let step = self.phase_step.load(Ordering::Relaxed);
        self.phase
            .store(phase.wrapping_add(step) & LUT_MASK, Ordering::Relaxed);

        Some(out)
    }

    /// Tick callback body: one sample to the analog output, nothing else.
    #[inline]
    pub fn tick<A: AnalogOut + ?Sized>(&self, out: &A) {
        if let Some(level) = self.next_sample() {
            out.write(level);
        }
    }

    // --- foreground writers ---

    #[inline]
    pub fn set_phase_step(&self, step: u16) {
        self.phase_step.store(step, Ordering::Relaxed);
    }

    #[inline]
    pub fn set_amp_scale(&self, amp: u8) {
        self.amp_scale.store(amp, Ordering::Relaxed);
    }

    /// Publish the active shape.
    ///
    /// Release ordering: a callback that sees the new shape also sees the
    /// step and amplitude written before it.
    #[inline]
    pub fn set_active_wave(&self, wave: WaveformKind) {
        self.active_wave.store(wave as u8, Ordering::Release);
    }

    #[inline]
    pub fn set_tick_period_us(&self, period_us: u32) {
        self.tick_period_us.store(period_us, Ordering::Relaxed);
    }

    // --- readers ---

    #[inline]
    pub fn phase(&self) -> u16 {
        self.phase.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn phase_step(&self) -> u16 {
        self.phase_step.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn amp_scale(&self) -> u8 {
        self.amp_scale.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn active_wave(&self) -> WaveformKind {
        WaveformKind::from_u8(self.active_wave.load(Ordering::Acquire))
    }

    #[inline]
    pub fn tick_period_us(&self) -> u32 {
        self.tick_period_us.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn tables(&self) -> &LookupTables {
        &self.tables
    }
}

impl Default for WaveEngine {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_PERIOD_US)
    }
}
