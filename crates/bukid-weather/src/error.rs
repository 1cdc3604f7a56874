//! Weather engine error types.

use bukid_core::error::{ReqwestErrorExt, RusqliteErrorExt};
use bukid_core::{AppError, NetworkError};
use thiserror::Error;

/// Hardware geolocation errors
#[derive(Debug, Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Location service unavailable")]
    ServiceUnavailable,
    #[error("Location request timed out")]
    Timeout,
    #[error("Location error: {0}")]
    Other(String),
}

/// Weather engine errors.
///
/// Provider, parse and storage failures are recovered inside the engine;
/// only `InvalidCoordinates`, `InvalidForecastDays` and `Exhausted` reach
/// callers of the public API.
#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Provider returned status {status}")]
    Provider { status: u16 },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Location error: {0}")]
    Location(#[from] LocationError),

    #[error("Invalid coordinates: ({latitude}, {longitude})")]
    InvalidCoordinates { latitude: f64, longitude: f64 },

    #[error("Forecast length {days} outside 1..={max}")]
    InvalidForecastDays { days: u32, max: u32 },

    #[error("No provider, saved location, or default location available")]
    Exhausted,
}

impl From<WeatherError> for AppError {
    fn from(err: WeatherError) -> Self {
        match err {
            WeatherError::Network(e) => AppError::Network(e.into_network_error()),
            WeatherError::Provider { status } => AppError::Network(NetworkError::ServerError {
                status,
                message: "weather provider error".to_string(),
            }),
            WeatherError::Parse(msg) => AppError::Network(NetworkError::InvalidResponse(msg)),
            WeatherError::Storage(e) => AppError::Database(e.into_database_error()),
            WeatherError::Serialization(e) => {
                AppError::Weather(bukid_core::WeatherError::CacheError(e.to_string()))
            }
            WeatherError::Location(_) | WeatherError::Exhausted => {
                AppError::Weather(bukid_core::WeatherError::LocationUnavailable)
            }
            e @ WeatherError::InvalidCoordinates { .. } => {
                AppError::Weather(bukid_core::WeatherError::InvalidCoordinates(e.to_string()))
            }
            WeatherError::InvalidForecastDays { days, .. } => {
                AppError::Weather(bukid_core::WeatherError::InvalidForecastDays(days))
            }
        }
    }
}
