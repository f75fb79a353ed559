//! DAC output via the ESP-IDF legacy DAC driver.
//!
//! Channel 1 = GPIO25, channel 2 = GPIO26 (ESP32 only).
//! The driver is addressed by channel id, so the handle is `Copy` and the
//! tick callback can own its own copy.

use esp_idf_svc::sys::{self, dac_channel_t, esp};

use super::{AnalogOut, HalError};

/// Handle to one DAC channel.
#[derive(Clone, Copy, Debug)]
pub struct EspDac {
    channel: dac_channel_t,
}

impl EspDac {
    /// `channel` is the board numbering (1 or 2); anything else selects 1.
    pub fn new(channel: u8) -> Self {
        let channel = match channel {
            2 => sys::dac_channel_t_DAC_CHANNEL_2,
            _ => sys::dac_channel_t_DAC_CHANNEL_1,
        };
        Self { channel }
    }
}

impl AnalogOut for EspDac {
    fn enable(&self) -> Result<(), HalError> {
        // SAFETY: plain driver call on a valid channel id
        esp!(unsafe { sys::dac_output_enable(self.channel) })
            .map_err(|e| HalError::Analog(e.code()))
    }

    fn disable(&self) -> Result<(), HalError> {
        // SAFETY: plain driver call on a valid channel id
        esp!(unsafe { sys::dac_output_disable(self.channel) })
            .map_err(|e| HalError::Analog(e.code()))
    }

    #[inline]
    fn write(&self, level: u8) {
        // Hot path: the only failure is an invalid channel, ruled out in new()
        // SAFETY: register write, no allocation, no locking
        unsafe {
            sys::dac_output_voltage(self.channel, level);
        }
    }
}
