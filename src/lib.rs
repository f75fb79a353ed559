//! # ESP32 WaveGen
//!
//! Table-driven waveform generator: sine, triangle and sawtooth on the DAC,
//! square on the LEDC.
//!
//! ## Architecture
//!
//! ```text
//! input ──▶ WaveGenerator::apply ──▶ quantizer ──▶ WaveEngine (atomics)
//!                    │                                   │
//!                    └──▶ DAC / LEDC / timer on-off      ▼
//!                                              tick every 50 µs ──▶ DAC
//! ```
//!
//! - One `WaveEngine` for the whole program, shared by reference
//! - The tick callback owns `phase`; the foreground owns everything else
//! - No locks, no allocation, no logging in the tick path

#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod fault;
pub mod generator;
pub mod hal;
pub mod log_globals;
pub mod logging;
pub mod settings;
pub mod uart_logger;
pub mod wave;

pub use config::{BoardConfig, BOARD, DEFAULT_SETTINGS};
pub use fault::{FaultCode, FaultState};
pub use generator::WaveGenerator;
pub use hal::{AnalogOut, HalError, PulseOut, TickTimer};
pub use log_globals::LOG_STREAM;
pub use settings::{Adjustment, Settings, WaveformKind};
pub use wave::{LookupTables, WaveEngine, LUT_SIZE};
