//! Display configuration.
//!
//! Stored on the device as a postcard blob next to the other persisted
//! records.

use core::time::Duration;

use embedded_graphics::pixelcolor::{IntoStorage, Rgb565};
use embedded_graphics::pixelcolor::raw::RawU16;
use embedded_graphics::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ui::colors::COLOR_BACKGROUND;
use crate::ui::{DISPLAY_HEIGHT_PX, DISPLAY_WIDTH_PX};

/// Errors raised while loading or validating a [`Config`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("display size {width}x{height} has a zero dimension")]
    ZeroDimension { width: u32, height: u32 },

    #[error("tick interval must be non-zero")]
    ZeroTick,

    /// The queue window needs an odd slot count to centre the cursor
    #[error("queue window needs an odd, non-zero slot count, got {0}")]
    QueueSlots(u8),

    #[error("cannot decode configuration: {0}")]
    Decode(postcard::Error),

    #[error("cannot encode configuration: {0}")]
    Encode(postcard::Error),
}

/// Names of the mono fonts used by the screens, e.g. `"6x10"`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FontConfig {
    pub small: String,
    pub regular: String,
    pub large: String,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            small: "6x10".into(),
            regular: "7x13".into(),
            large: "10x20".into(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub width: u32,
    pub height: u32,
    /// Upper bound on the compositor wait, and the period of time-based
    /// updates such as the play position.
    pub tick_ms: u32,
    /// Number of rows in the visible queue window.
    pub queue_slots: u8,
    pub fonts: FontConfig,
    /// Root background as a raw RGB565 value.
    pub background: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            width: DISPLAY_WIDTH_PX,
            height: DISPLAY_HEIGHT_PX,
            tick_ms: 250,
            queue_slots: 7,
            fonts: FontConfig::default(),
            background: COLOR_BACKGROUND.into_storage(),
        }
    }
}

impl Config {
    /// Decode and validate a persisted configuration.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: Config = postcard::from_bytes(bytes).map_err(ConfigError::Decode)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ConfigError> {
        postcard::to_allocvec(self).map_err(ConfigError::Encode)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::ZeroDimension {
                width: self.width,
                height: self.height,
            });
        }
        if self.tick_ms == 0 {
            return Err(ConfigError::ZeroTick);
        }
        if self.queue_slots == 0 || self.queue_slots % 2 == 0 {
            return Err(ConfigError::QueueSlots(self.queue_slots));
        }
        Ok(())
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(u64::from(self.tick_ms))
    }

    pub fn background_color(&self) -> Rgb565 {
        Rgb565::from(RawU16::new(self.background))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = Config::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.size(), Size::new(320, 240));
        assert_eq!(config.tick(), Duration::from_millis(250));
        assert_eq!(config.background_color(), COLOR_BACKGROUND);
    }

    #[test]
    fn test_persisted_config_loads_back() {
        let config = Config {
            queue_slots: 5,
            tick_ms: 100,
            ..Config::default()
        };
        let bytes = config.to_bytes().unwrap();
        assert_eq!(Config::from_bytes(&bytes).unwrap(), config);
    }

    #[test]
    fn test_invalid_configs_are_rejected() {
        let zero = Config {
            height: 0,
            ..Config::default()
        };
        assert!(matches!(
            zero.validate(),
            Err(ConfigError::ZeroDimension { .. })
        ));

        let even = Config {
            queue_slots: 6,
            ..Config::default()
        };
        assert_eq!(even.validate(), Err(ConfigError::QueueSlots(6)));

        let no_tick = Config {
            tick_ms: 0,
            ..Config::default()
        };
        assert_eq!(no_tick.validate(), Err(ConfigError::ZeroTick));
    }

    #[test]
    fn test_invalid_blob_is_rejected() {
        let bytes = Config {
            queue_slots: 4,
            ..Config::default()
        }
        .to_bytes()
        .unwrap();
        assert_eq!(Config::from_bytes(&bytes), Err(ConfigError::QueueSlots(4)));
        assert!(matches!(
            Config::from_bytes(&[0xff]),
            Err(ConfigError::Decode(_))
        ));
    }
}
