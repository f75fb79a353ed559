//! Periodic tick via esp_timer (task dispatch).
//!
//! The callback is bound once at construction: it owns a reference to the
//! engine and its own DAC handle. start/stop only arm and cancel it.

use core::time::Duration;

use esp_idf_svc::timer::{EspTaskTimerService, EspTimer};

use super::{AnalogOut, HalError, TickTimer};
use crate::wave::WaveEngine;

pub struct EspTickTimer {
    timer: EspTimer<'static>,
    running: bool,
}

impl EspTickTimer {
    /// Create the timer with `engine.tick(&out)` as its callback.
    pub fn new<A>(engine: &'static WaveEngine, out: A) -> Result<Self, HalError>
    where
        A: AnalogOut + Send + 'static,
    {
        let service = EspTaskTimerService::new().map_err(|e| HalError::Timer(e.code()))?;
        let timer = service
            .timer(move || engine.tick(&out))
            .map_err(|e| HalError::Timer(e.code()))?;

        Ok(Self {
            timer,
            running: false,
        })
    }
}

impl TickTimer for EspTickTimer {
    fn start(&mut self, period_us: u32) -> Result<(), HalError> {
        if self.running {
            self.stop()?;
        }
        self.timer
            .every(Duration::from_micros(period_us as u64))
            .map_err(|e| HalError::Timer(e.code()))?;
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), HalError> {
        self.timer.cancel().map_err(|e| HalError::Timer(e.code()))?;
        self.running = false;
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running
    }
}
