//! Configuration for the VLC/VBC receivers and the replay host.
//!
//! Loaded from TOML; every field has a default so a partial file (or none at
//! all) is enough to get a working receiver.

use crate::core_modules::vlc_decoder::DecoderType;
use crate::error::DecodeError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Decoder error: {0}")]
    Decoder(#[from] DecodeError),
}

/// Optical receiver settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VlcConfig {
    /// Decoder variant: "mimo" or "rolling_shutter".
    pub decoder: String,
    /// Binarisation threshold for the frame difference.
    pub threshold: u8,
    /// Number of transmitters (and therefore ROIs), clock included.
    pub data_width: usize,
    /// ROI index carrying the clock.
    pub clock_index: usize,
    /// Consecutive empty frames tolerated before forcing the idle state.
    pub idle_frames: u32,
    /// Matching frames accumulated before ROIs are confirmed.
    pub sync_frames: u32,
    /// Data frames decoded before returning to idle.
    pub data_frames: u32,
    /// Bits per assembled value.
    pub value_bits: u32,
}

impl Default for VlcConfig {
    fn default() -> Self {
        Self {
            decoder: "mimo".to_string(),
            threshold: 128,
            data_width: 3,
            clock_index: 0,
            idle_frames: 10,
            sync_frames: 20,
            data_frames: 60,
            value_bits: 8,
        }
    }
}

/// Vibration receiver settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VbcConfig {
    /// Raw amplitude subtracted from every sample before envelope detection.
    pub threshold: u32,
    /// Samples per symbol.
    pub period: u32,
    pub sync_symbols: u32,
    pub data_symbols: u32,
    pub value_bits: u32,
    /// Mask applied to raw samples read from a signal log.
    pub sample_mask: u32,
    /// Stop the reader once the first value is assembled.
    pub stop_after_value: bool,
}

impl Default for VbcConfig {
    fn default() -> Self {
        Self {
            threshold: 0,
            period: 10,
            sync_symbols: 4,
            data_symbols: 8,
            value_bits: 8,
            sample_mask: 0xFFFF,
            stop_after_value: true,
        }
    }
}

/// One authentication record: an identifier received over the air and the
/// vehicle number it stands for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub id: u32,
    pub vehicle: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarlinkConfig {
    pub vlc: VlcConfig,
    pub vbc: VbcConfig,
    pub registry: Vec<RegistryEntry>,
}

impl CarlinkConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: CarlinkConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        DecoderType::from_str(&self.vlc.decoder)?.ensure_supported()?;

        let vlc = &self.vlc;
        if vlc.data_width == 0 {
            return Err(ConfigError::Invalid("vlc.data_width must be at least 1".into()));
        }
        if vlc.clock_index >= vlc.data_width {
            return Err(ConfigError::Invalid(format!(
                "vlc.clock_index {} out of range for data width {}",
                vlc.clock_index, vlc.data_width
            )));
        }
        if vlc.sync_frames == 0 || vlc.data_frames == 0 {
            return Err(ConfigError::Invalid("vlc frame quotas must be positive".into()));
        }

        let vbc = &self.vbc;
        if vbc.period == 0 {
            return Err(ConfigError::Invalid("vbc.period must be positive".into()));
        }
        if vbc.sync_symbols == 0 || vbc.data_symbols == 0 {
            return Err(ConfigError::Invalid("vbc symbol quotas must be positive".into()));
        }

        for bits in [vlc.value_bits, vbc.value_bits] {
            if !(1..=32).contains(&bits) {
                return Err(ConfigError::Invalid(format!("value_bits {bits} not in 1..=32")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = CarlinkConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.vlc.threshold, 128);
        assert_eq!(config.vlc.idle_frames, 10);
        assert_eq!(config.vlc.sync_frames, 20);
        assert_eq!(config.vlc.data_frames, 60);
        assert_eq!(config.vbc.sync_symbols, 4);
        assert_eq!(config.vbc.data_symbols, 8);
    }

    #[test]
    fn test_partial_toml() {
        let config = CarlinkConfig::from_toml_str(
            r#"
            [vlc]
            threshold = 100
            data_width = 5
            clock_index = 4

            [vbc]
            threshold = 300
            period = 25

            [[registry]]
            id = 0xA2
            vehicle = "29D 3281"
            "#,
        )
        .unwrap();
        assert_eq!(config.vlc.threshold, 100);
        assert_eq!(config.vlc.data_width, 5);
        assert_eq!(config.vlc.sync_frames, 20);
        assert_eq!(config.vbc.period, 25);
        assert_eq!(config.registry[0].id, 0xA2);
    }

    #[test]
    fn test_rolling_shutter_is_rejected() {
        let err = CarlinkConfig::from_toml_str("[vlc]\ndecoder = \"rolling_shutter\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Decoder(DecodeError::UnknownDecoderType(_))));

        let err = CarlinkConfig::from_toml_str("[vlc]\ndecoder = \"fisheye\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Decoder(DecodeError::UnknownDecoderType(_))));
    }

    #[test]
    fn test_semantic_validation() {
        let err = CarlinkConfig::from_toml_str("[vlc]\ndata_width = 2\nclock_index = 2\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = CarlinkConfig::from_toml_str("[vbc]\nperiod = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = CarlinkConfig::from_toml_str("[vbc]\nvalue_bits = 33\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(
            CarlinkConfig::from_toml_str("[vlc\nthreshold = 1"),
            Err(ConfigError::Parse(_))
        ));
    }
}
