//! Application configuration

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_with::serde_as;

use crate::errors::AisViewerError;
use crate::models::DataAge;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub websocket: WebSocketConfig,
    pub viewer: ViewerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebSocketConfig {
    pub url: String,
}

#[serde_as]
#[derive(Debug, Deserialize, Clone)]
pub struct ViewerConfig {
    /// Minimum zoom level at which vessels are requested and drawn
    pub zoom_threshold: f64,
    /// Vessels not heard from for this long are removed
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub expiration: Duration,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub sweep_interval: Duration,
    /// Initial data age in minutes
    pub default_age: u8,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new("config/default.toml"))
    }

    /// Load from an optional file, then override from `AISVIEWER__*`
    /// environment variables.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("websocket.url", "ws://127.0.0.1:8088/getAISData")?
            .set_default("viewer.zoom_threshold", 12.0)?
            .set_default("viewer.expiration", 60)?
            .set_default("viewer.sweep_interval", 30)?
            .set_default("viewer.default_age", 2)?
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix("AISVIEWER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), AisViewerError> {
        self.websocket.validate()?;
        self.viewer.validate()?;
        Ok(())
    }
}

impl WebSocketConfig {
    pub fn validate(&self) -> Result<(), AisViewerError> {
        if !(self.url.starts_with("ws://") || self.url.starts_with("wss://")) {
            return Err(AisViewerError::ConfigurationError {
                message: format!("WebSocket URL must use ws:// or wss://: {}", self.url),
            });
        }
        Ok(())
    }
}

impl ViewerConfig {
    pub fn validate(&self) -> Result<(), AisViewerError> {
        self.validate_zoom_threshold()?;
        self.validate_intervals()?;
        DataAge::try_from(self.default_age)?;
        Ok(())
    }

    fn validate_zoom_threshold(&self) -> Result<(), AisViewerError> {
        if !self.zoom_threshold.is_finite() || self.zoom_threshold < 0.0 {
            return Err(AisViewerError::ConfigurationError {
                message: format!("Invalid zoom threshold: {}", self.zoom_threshold),
            });
        }
        Ok(())
    }

    fn validate_intervals(&self) -> Result<(), AisViewerError> {
        if self.expiration.is_zero() {
            return Err(AisViewerError::ConfigurationError {
                message: "Expiration must be greater than zero".to_string(),
            });
        }
        if self.sweep_interval.is_zero() {
            return Err(AisViewerError::ConfigurationError {
                message: "Sweep interval must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn viewer_config() -> ViewerConfig {
        ViewerConfig {
            zoom_threshold: 12.0,
            expiration: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(30),
            default_age: 2,
        }
    }

    // Environment variables are process-wide, so the file and environment
    // sources are checked in a single test.
    #[test]
    fn test_load_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("viewer.toml");
        std::fs::write(
            &path,
            "[viewer]\nexpiration = 120\nsweep_interval = 10\ndefault_age = 5\n",
        )
        .unwrap();

        env::set_var("AISVIEWER__WEBSOCKET__URL", "ws://ais.example:9000/stream");
        env::set_var("AISVIEWER__VIEWER__ZOOM_THRESHOLD", "11.5");

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.websocket.url, "ws://ais.example:9000/stream");
        assert_eq!(config.viewer.zoom_threshold, 11.5);
        assert_eq!(config.viewer.expiration, Duration::from_secs(120));
        assert_eq!(config.viewer.sweep_interval, Duration::from_secs(10));
        assert_eq!(config.viewer.default_age, 5);
        assert!(config.validate().is_ok());

        env::remove_var("AISVIEWER__WEBSOCKET__URL");
        env::remove_var("AISVIEWER__VIEWER__ZOOM_THRESHOLD");

        let missing = dir.path().join("missing.toml");
        let config = AppConfig::load_from(&missing).unwrap();
        assert_eq!(config.websocket.url, "ws://127.0.0.1:8088/getAISData");
        assert_eq!(config.viewer.zoom_threshold, 12.0);
        assert_eq!(config.viewer.expiration, Duration::from_secs(60));
        assert_eq!(config.viewer.sweep_interval, Duration::from_secs(30));
        assert_eq!(config.viewer.default_age, 2);
    }

    #[test]
    fn test_viewer_config_validate() {
        assert!(viewer_config().validate().is_ok());
    }

    #[test]
    fn test_viewer_config_validate_invalid_threshold() {
        let config = ViewerConfig {
            zoom_threshold: f64::NAN,
            ..viewer_config()
        };
        assert!(config.validate().is_err());

        let config = ViewerConfig {
            zoom_threshold: -1.0,
            ..viewer_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_viewer_config_validate_zero_intervals() {
        let config = ViewerConfig {
            expiration: Duration::ZERO,
            ..viewer_config()
        };
        assert!(config.validate().is_err());

        let config = ViewerConfig {
            sweep_interval: Duration::ZERO,
            ..viewer_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_viewer_config_validate_age_range() {
        let config = ViewerConfig {
            default_age: 61,
            ..viewer_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_websocket_config_validate() {
        let config = WebSocketConfig {
            url: "http://localhost".to_string(),
        };
        assert!(config.validate().is_err());
    }
}
