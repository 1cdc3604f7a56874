use anyhow::{Context, Result};

use crate::config::ValidationResult;
use crate::Config;

/// Main application state and lifecycle manager
pub struct App {
    config: Config,
    validation: ValidationResult,
}

impl App {
    /// Create a new application instance from the on-disk configuration
    pub fn new() -> Result<Self> {
        let (config, validation) = Config::load_validated()?;
        Self::with_config(config, validation)
    }

    /// Create an application instance from an already-loaded configuration
    pub fn with_config(config: Config, validation: ValidationResult) -> Result<Self> {
        std::fs::create_dir_all(&config.config_dir).with_context(|| {
            format!(
                "Failed to create data directory {}",
                config.config_dir.display()
            )
        })?;

        tracing::info!(
            "Application configured with {} default locations",
            config.weather.default_locations.len()
        );

        Ok(Self {
            config,
            validation,
        })
    }

    /// Shutdown the application
    pub fn shutdown(&mut self) -> Result<()> {
        tracing::info!("Shutting down application");
        Ok(())
    }

    /// Get reference to application config
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Warnings collected when the configuration was validated
    pub fn config_warnings(&self) -> &ValidationResult {
        &self.validation
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_with_config_creates_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            config_dir: dir.path().join("bukid"),
            ..Config::default()
        };

        let app = App::with_config(config, ValidationResult::default()).unwrap();
        assert!(app.config().config_dir.is_dir());
        assert!(app.config_warnings().is_valid());
        assert!(app.config().cache_path().starts_with(dir.path()));
    }
}
