//! Waveform synthesis
//!
//! Architecture:
//! - Lookup tables: 256 × u8 per shape, built once at compile time
//! - Engine: phase accumulator driven by a fixed-period timer callback
//! - Quantizer: Hz → phase step (DAC) or native LEDC frequency (square)

pub mod engine;
pub mod lut;
pub mod quantize;

pub use engine::{scale_sample, WaveEngine, DEFAULT_TICK_PERIOD_US};
pub use lut::{LookupTables, LUT_SIZE};
pub use quantize::{plan_continuous, plan_pulse, ContinuousPlan, PulsePlan};
