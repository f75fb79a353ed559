//! Square-wave output on the LEDC peripheral.
//!
//! Re-arming detaches the channel first, then reconfigures the timer with
//! the new frequency. Low-speed mode, timer and channel from board config.

use esp_idf_svc::sys::{self, esp, ledc_channel_t, ledc_mode_t, ledc_timer_t};

use super::{HalError, PulseOut};
use crate::config::BoardConfig;

const SPEED_MODE: ledc_mode_t = sys::ledc_mode_t_LEDC_LOW_SPEED_MODE;

/// LEDC-backed pulse output.
pub struct EspPulse {
    gpio: i32,
    channel: ledc_channel_t,
    timer: ledc_timer_t,
    armed: bool,
}

impl EspPulse {
    pub fn new(board: &BoardConfig) -> Self {
        Self {
            gpio: board.pulse_gpio,
            channel: board.ledc_channel as ledc_channel_t,
            timer: board.ledc_timer as ledc_timer_t,
            armed: false,
        }
    }
}

impl PulseOut for EspPulse {
    fn arm(&mut self, freq_hz: u32, resolution_bits: u8, duty: u32) -> Result<(), HalError> {
        if self.armed {
            self.disable()?;
        }

        let timer_cfg = sys::ledc_timer_config_t {
            speed_mode: SPEED_MODE,
            duty_resolution: resolution_bits as sys::ledc_timer_bit_t,
            timer_num: self.timer,
            freq_hz,
            ..Default::default()
        };
        // SAFETY: config struct outlives the call
        esp!(unsafe { sys::ledc_timer_config(&timer_cfg) })
            .map_err(|e| HalError::Pulse(e.code()))?;

        let channel_cfg = sys::ledc_channel_config_t {
            gpio_num: self.gpio,
            speed_mode: SPEED_MODE,
            channel: self.channel,
            intr_type: sys::ledc_intr_type_t_LEDC_INTR_DISABLE,
            timer_sel: self.timer,
            duty,
            hpoint: 0,
            ..Default::default()
        };
        // SAFETY: config struct outlives the call
        esp!(unsafe { sys::ledc_channel_config(&channel_cfg) })
            .map_err(|e| HalError::Pulse(e.code()))?;

        self.armed = true;
        Ok(())
    }

    fn disable(&mut self) -> Result<(), HalError> {
        if !self.armed {
            return Ok(());
        }
        // SAFETY: channel was configured by arm()
        esp!(unsafe { sys::ledc_stop(SPEED_MODE, self.channel, 0) })
            .map_err(|e| HalError::Pulse(e.code()))?;
        // Release the pin from the LEDC matrix
        // SAFETY: valid GPIO number from board config
        esp!(unsafe { sys::gpio_reset_pin(self.gpio) })
            .map_err(|e| HalError::Pulse(e.code()))?;

        self.armed = false;
        Ok(())
    }

    fn is_armed(&self) -> bool {
        self.armed
    }
}
