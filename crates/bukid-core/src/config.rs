use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::ConfigError;

/// Open-Meteo forecast endpoint (no API key required)
pub const DEFAULT_PROVIDER_URL: &str = "https://api.open-meteo.com/v1/forecast";

/// Nominatim reverse geocoding endpoint (OpenStreetMap)
pub const DEFAULT_GEOCODER_URL: &str = "https://nominatim.openstreetmap.org/reverse";

/// Longest forecast horizon the provider serves
pub const MAX_PROVIDER_FORECAST_DAYS: u32 = 16;

/// Longest forecast the engine serves at all; days past the provider
/// horizon are synthetic
pub const MAX_FORECAST_DAYS: u32 = 31;

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add an error
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Add a warning
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory (also holds the weather cache database)
    pub config_dir: PathBuf,

    /// Weather engine settings
    #[serde(default)]
    pub weather: WeatherConfig,
}

/// A compiled-in location that is always resolvable and never evicted
/// from the saved-location list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSeed {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub province: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

impl LocationSeed {
    fn new(name: &str, latitude: f64, longitude: f64, province: &str, region: &str) -> Self {
        Self {
            name: name.to_string(),
            latitude,
            longitude,
            city: Some(name.to_string()),
            province: Some(province.to_string()),
            region: Some(region.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// Primary weather provider endpoint
    #[serde(default = "default_provider_url")]
    pub provider_url: String,

    /// Reverse geocoding endpoint
    #[serde(default = "default_geocoder_url")]
    pub geocoder_url: String,

    /// Timeout applied to every provider and geocoder request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Timeout for a hardware geolocation fix
    #[serde(default = "default_geolocation_timeout_secs")]
    pub geolocation_timeout_secs: u64,

    /// Country reported when reverse geocoding fails
    #[serde(default = "default_home_country")]
    pub home_country: String,

    /// Timezone used when the provider does not report one
    #[serde(default = "default_timezone")]
    pub default_timezone: String,

    /// Number of days the dashboard forecast shows
    #[serde(default = "default_forecast_days")]
    pub forecast_days: u32,

    /// Delay between background pre-cache fetches, in milliseconds
    #[serde(default = "default_precache_interval_ms")]
    pub precache_interval_ms: u64,

    /// Seed locations warmed at startup and protected from eviction
    #[serde(default = "default_locations")]
    pub default_locations: Vec<LocationSeed>,
}

fn default_provider_url() -> String {
    DEFAULT_PROVIDER_URL.to_string()
}

fn default_geocoder_url() -> String {
    DEFAULT_GEOCODER_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    5
}

fn default_geolocation_timeout_secs() -> u64 {
    5
}

fn default_home_country() -> String {
    "Philippines".to_string()
}

fn default_timezone() -> String {
    "Asia/Manila".to_string()
}

fn default_forecast_days() -> u32 {
    7
}

fn default_precache_interval_ms() -> u64 {
    1000
}

fn default_locations() -> Vec<LocationSeed> {
    vec![
        LocationSeed::new("Cabanatuan City", 15.4865, 120.9667, "Nueva Ecija", "Central Luzon"),
        LocationSeed::new(
            "Science City of Muñoz",
            15.7161,
            120.9031,
            "Nueva Ecija",
            "Central Luzon",
        ),
        LocationSeed::new("Manila", 14.5995, 120.9842, "Metro Manila", "National Capital Region"),
    ]
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            provider_url: default_provider_url(),
            geocoder_url: default_geocoder_url(),
            request_timeout_secs: default_request_timeout_secs(),
            geolocation_timeout_secs: default_geolocation_timeout_secs(),
            home_country: default_home_country(),
            default_timezone: default_timezone(),
            forecast_days: default_forecast_days(),
            precache_interval_ms: default_precache_interval_ms(),
            default_locations: default_locations(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("bukid");

        Self {
            config_dir,
            weather: WeatherConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path, writing defaults there if missing
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            let config = Self::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(config_path)
            .context("Failed to read config file")?;

        let config: Config =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        Self::load_validated_from(&Self::config_path()?)
    }

    /// [`Self::load_validated`] for an explicit path
    pub fn load_validated_from(config_path: &Path) -> Result<(Self, ValidationResult)> {
        let config = Self::load_from(config_path)?;
        let validation = config.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()).into());
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Validate the configuration
    ///
    /// Returns a ValidationResult containing any errors or warnings.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();
        let weather = &self.weather;

        self.validate_url(&weather.provider_url, "weather.provider_url", &mut result);
        self.validate_url(&weather.geocoder_url, "weather.geocoder_url", &mut result);

        if weather.request_timeout_secs == 0 {
            result.add_error(
                "weather.request_timeout_secs",
                "Request timeout must be greater than 0",
            );
        } else if weather.request_timeout_secs > 60 {
            result.add_warning(
                "weather.request_timeout_secs",
                "Request timeout is unusually long (>60s)",
            );
        }

        if weather.geolocation_timeout_secs == 0 {
            result.add_error(
                "weather.geolocation_timeout_secs",
                "Geolocation timeout must be greater than 0",
            );
        }

        if weather.forecast_days == 0 || weather.forecast_days > MAX_FORECAST_DAYS {
            result.add_error(
                "weather.forecast_days",
                format!("Forecast days must be within 1..={}", MAX_FORECAST_DAYS),
            );
        } else if weather.forecast_days > MAX_PROVIDER_FORECAST_DAYS {
            result.add_warning(
                "weather.forecast_days",
                format!(
                    "Forecast days beyond {} will be served from synthetic data",
                    MAX_PROVIDER_FORECAST_DAYS
                ),
            );
        }

        if weather.home_country.trim().is_empty() {
            result.add_error("weather.home_country", "Home country must not be empty");
        }

        if weather.default_locations.is_empty() {
            result.add_warning(
                "weather.default_locations",
                "No default locations - current location may be unavailable offline",
            );
        }

        for (i, seed) in weather.default_locations.iter().enumerate() {
            let field = format!("weather.default_locations[{}]", i);
            if seed.name.trim().is_empty() {
                result.add_error(field.clone(), "Location name must not be empty");
            }
            if !seed.latitude.is_finite() || !(-90.0..=90.0).contains(&seed.latitude) {
                result.add_error(
                    field.clone(),
                    format!("Latitude out of range: {}", seed.latitude),
                );
            }
            if !seed.longitude.is_finite() || !(-180.0..=180.0).contains(&seed.longitude) {
                result.add_error(field, format!("Longitude out of range: {}", seed.longitude));
            }
        }

        result
    }

    /// Validate a URL field
    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }

                if url.port() == Some(0) {
                    result.add_error(field_name, "Port cannot be 0");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to an explicit path
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        // Ensure config directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(config_path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Path of the SQLite weather cache
    pub fn cache_path(&self) -> PathBuf {
        self.config_dir.join("weather_cache.db")
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("bukid");

        Ok(config_dir.join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_valid_default_config() {
        let config = Config::default();
        let result = config.validate();
        assert!(result.is_valid(), "Default config should be valid: {:?}", result.errors);
    }

    #[test]
    fn test_default_seeds_are_in_home_region() {
        let config = WeatherConfig::default();
        assert_eq!(config.default_locations.len(), 3);
        assert!(config
            .default_locations
            .iter()
            .all(|s| (4.0..21.0).contains(&s.latitude) && (116.0..127.0).contains(&s.longitude)));
    }

    #[test]
    fn test_invalid_provider_url() {
        let mut config = Config::default();
        config.weather.provider_url = "not-a-url".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "weather.provider_url"));
    }

    #[test]
    fn test_invalid_url_scheme() {
        let mut config = Config::default();
        config.weather.geocoder_url = "ftp://localhost:8080".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.message.contains("http or https")));
    }

    #[test]
    fn test_zero_timeout_is_error() {
        let mut config = Config::default();
        config.weather.request_timeout_secs = 0;
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "weather.request_timeout_secs"));
    }

    #[test]
    fn test_seed_out_of_range_is_error() {
        let mut config = Config::default();
        config.weather.default_locations[0].latitude = 91.0;
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result
            .errors
            .iter()
            .any(|e| e.field == "weather.default_locations[0]"));
    }

    #[test]
    fn test_empty_defaults_is_warning() {
        let mut config = Config::default();
        config.weather.default_locations.clear();
        let result = config.validate();
        assert!(result.is_valid());
        assert!(result
            .warnings
            .iter()
            .any(|w| w.field == "weather.default_locations"));
    }

    #[test]
    fn test_long_forecast_is_warning() {
        let mut config = Config::default();
        config.weather.forecast_days = 30;
        let result = config.validate();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.field == "weather.forecast_days"));
    }

    #[test]
    fn test_out_of_range_forecast_is_error() {
        for days in [0, MAX_FORECAST_DAYS + 1, u32::MAX] {
            let mut config = Config::default();
            config.weather.forecast_days = days;
            let result = config.validate();
            assert!(!result.is_valid(), "{} days accepted", days);
            assert!(result.errors.iter().any(|e| e.field == "weather.forecast_days"));
        }
    }

    #[test]
    fn test_load_from_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.weather.home_country, "Philippines");
    }

    #[test]
    fn test_missing_weather_fields_use_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "config_dir = \"/tmp/bukid\"\n\n[weather]\nhome_country = \"Vietnam\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.weather.home_country, "Vietnam");
        assert_eq!(config.weather.request_timeout_secs, 5);
        assert_eq!(config.weather.default_locations.len(), 3);
        assert_eq!(config.cache_path(), PathBuf::from("/tmp/bukid/weather_cache.db"));
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[weather\nforecast_days = 7\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_invalid_file_is_rejected_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "config_dir = \"/tmp/bukid\"\n\n[weather]\nforecast_days = 4000000000\n",
        )
        .unwrap();

        let err = Config::load_validated_from(&path).unwrap_err();
        match err.downcast_ref::<ConfigError>() {
            Some(ConfigError::Invalid(summary)) => assert!(summary.contains("forecast_days")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_validation_result_error_summary() {
        let mut result = ValidationResult::default();
        result.add_error("field1", "error1");
        result.add_error("field2", "error2");
        let summary = result.error_summary();
        assert!(summary.contains("field1"));
        assert!(summary.contains("field2"));
    }
}
