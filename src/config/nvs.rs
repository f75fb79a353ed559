//! NVS persistence for the last applied settings.
//!
//! # Version History
//!
//! - **v1** (current): target_hz (f32 bits), amp, wave
//!
//! `actual_hz` is never stored; it is re-derived by the configurator.

use crate::settings::{Settings, WaveformKind};

#[cfg(target_os = "espidf")]
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};
#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::EspError;

/// Current NVS schema version
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// NVS namespace
pub const NVS_NAMESPACE: &str = "wavegen";

#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
const VERSION_KEY: &str = "schema_ver";
#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
const TARGET_KEY: &str = "target_hz";
#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
const AMP_KEY: &str = "amp";
#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
const WAVE_KEY: &str = "wave";

/// Load outcome
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoadResult {
    /// Nothing stored yet, caller keeps defaults
    FreshInstall,
    /// Stored settings, schema up to date
    Loaded(Settings),
}

/// NVS operation errors
#[derive(Debug)]
pub enum NvsError {
    /// NVS partition or namespace could not be opened
    #[cfg(target_os = "espidf")]
    InitFailed(EspError),
    /// Schema version too new (downgrade not supported)
    TooNew { stored_version: u32 },
    /// NVS read/write error
    #[cfg(target_os = "espidf")]
    IoError(EspError),
    /// Version stamp present but a value key is missing
    Incomplete,
}

#[cfg(target_os = "espidf")]
impl From<EspError> for NvsError {
    fn from(e: EspError) -> Self {
        NvsError::IoError(e)
    }
}

/// Settings as laid out in NVS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredSettings {
    pub target_bits: u32,
    pub amp: u8,
    pub wave: u8,
}

impl StoredSettings {
    pub fn encode(settings: &Settings) -> Self {
        Self {
            target_bits: settings.target_hz.to_bits(),
            amp: settings.amp,
            wave: settings.wave as u8,
        }
    }

    /// Back to settings; `actual_hz` stays 0 until applied.
    pub fn decode(self) -> Settings {
        Settings::new(
            f32::from_bits(self.target_bits),
            self.amp,
            WaveformKind::from_u8(self.wave),
        )
    }
}

/// Decide what a stored version stamp means.
///
/// `Ok(false)` = fresh install (0 or absent), `Ok(true)` = readable.
pub fn check_version(stored_version: u32) -> Result<bool, NvsError> {
    match stored_version {
        0 => Ok(false),
        v if v <= CURRENT_SCHEMA_VERSION => Ok(true),
        v => Err(NvsError::TooNew { stored_version: v }),
    }
}

/// Settings store on the default NVS partition.
#[cfg(target_os = "espidf")]
pub struct SettingsStore {
    nvs: EspNvs<NvsDefault>,
}

#[cfg(target_os = "espidf")]
impl SettingsStore {
    pub fn new(partition: EspDefaultNvsPartition) -> Result<Self, NvsError> {
        let nvs = EspNvs::new(partition, NVS_NAMESPACE, true).map_err(NvsError::InitFailed)?;
        Ok(Self { nvs })
    }

    pub fn load(&self) -> Result<LoadResult, NvsError> {
        let stored_version = self.nvs.get_u32(VERSION_KEY)?.unwrap_or(0);
        if !check_version(stored_version)? {
            return Ok(LoadResult::FreshInstall);
        }

        let stored = StoredSettings {
            target_bits: self.nvs.get_u32(TARGET_KEY)?.ok_or(NvsError::Incomplete)?,
            amp: self.nvs.get_u8(AMP_KEY)?.ok_or(NvsError::Incomplete)?,
            wave: self.nvs.get_u8(WAVE_KEY)?.ok_or(NvsError::Incomplete)?,
        };
        Ok(LoadResult::Loaded(stored.decode()))
    }

    /// Values first, version stamp last: a torn write reads as stale, not corrupt.
    pub fn save(&mut self, settings: &Settings) -> Result<(), NvsError> {
        let stored = StoredSettings::encode(settings);
        self.nvs.set_u32(TARGET_KEY, stored.target_bits)?;
        self.nvs.set_u8(AMP_KEY, stored.amp)?;
        self.nvs.set_u8(WAVE_KEY, stored.wave)?;
        self.nvs.set_u32(VERSION_KEY, CURRENT_SCHEMA_VERSION)?;
        Ok(())
    }
}
