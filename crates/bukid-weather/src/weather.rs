//! Current-conditions fetch: cache, then provider, then synthetic.

use chrono::{DateTime, Utc};

use crate::cache::CacheCategory;
use crate::derive::{
    estimate_cloud_cover, feels_like, format_clock, ms_to_kmh, percent, HEAT_INDEX_MIN_C,
    UNKNOWN_CLOCK,
};
use crate::error::WeatherError;
use crate::geo::{coarse_key, validate_coordinates};
use crate::provider::CurrentReading;
use crate::service::WeatherService;
use crate::synthetic;
use crate::types::{DataSource, LocationRef, WeatherCondition, WeatherSnapshot};

/// Standard sea-level pressure, hPa
const STANDARD_PRESSURE: f64 = 1013.25;

/// Assumed visibility when the provider omits it, km
const CLEAR_VISIBILITY_KM: f64 = 10.0;

impl WeatherService {
    pub(crate) async fn fetch_weather(
        &self,
        latitude: f64,
        longitude: f64,
        force_refresh: bool,
    ) -> Result<WeatherSnapshot, WeatherError> {
        validate_coordinates(latitude, longitude)?;
        let key = coarse_key(latitude, longitude);

        if !force_refresh {
            if let Some(snapshot) = self.store.get::<WeatherSnapshot>(CacheCategory::Weather, &key) {
                tracing::debug!("Weather cache hit for {}", key);
                return Ok(snapshot);
            }
        }

        let place = self.geocoder.resolve(latitude, longitude).await;

        let snapshot = match self.provider.current(latitude, longitude).await {
            Ok(reading) => {
                let timezone = reading
                    .timezone
                    .clone()
                    .unwrap_or_else(|| self.settings.default_timezone.clone());
                let location = place.at(latitude, longitude, &timezone);
                let snapshot = snapshot_from_reading(reading, location, self.clock.now());
                tracing::info!(
                    "Fetched weather for {}: {}°C, {}",
                    snapshot.location.name,
                    snapshot.display_temperature(),
                    snapshot.condition_label()
                );
                self.upsert_fetched(&snapshot.location);
                snapshot
            }
            Err(e) => {
                // A failed refresh must not replace data that is still valid
                if force_refresh {
                    if let Some(cached) =
                        self.store.get::<WeatherSnapshot>(CacheCategory::Weather, &key)
                    {
                        tracing::warn!("Weather refresh failed for {}, keeping cached data: {}", key, e);
                        return Ok(cached);
                    }
                }
                tracing::warn!("Weather provider failed for {}, using synthetic data: {}", key, e);
                let location = place.at(latitude, longitude, &self.settings.default_timezone);
                synthetic::snapshot(&location, self.clock.now())
            }
        };

        if let Err(e) = self.store.put(CacheCategory::Weather, &key, &snapshot) {
            tracing::warn!("Failed to cache weather for {}: {}", key, e);
        }

        Ok(snapshot)
    }
}

/// Normalize a provider reading: km/h wind, km visibility, derived fields.
fn snapshot_from_reading(
    reading: CurrentReading,
    location: LocationRef,
    now: DateTime<Utc>,
) -> WeatherSnapshot {
    let condition = WeatherCondition::from_wmo_code(reading.weather_code);
    let wind_speed = ms_to_kmh(reading.wind_speed);
    let temperature = reading.temperature;

    let feels = match reading.humidity {
        Some(humidity) => feels_like(temperature, humidity, wind_speed),
        // No humidity, no heat index
        None if temperature >= HEAT_INDEX_MIN_C => temperature,
        None => feels_like(temperature, 0.0, wind_speed),
    };

    let clock = |value: Option<String>| {
        value
            .as_deref()
            .map(format_clock)
            .unwrap_or_else(|| UNKNOWN_CLOCK.to_string())
    };

    WeatherSnapshot {
        temperature,
        feels_like: feels,
        condition,
        humidity: reading.humidity.map(percent).unwrap_or(0),
        wind_speed,
        wind_direction: reading
            .wind_direction
            .map(|d| d.round().rem_euclid(360.0) as u16)
            .unwrap_or(0),
        pressure: reading.pressure.unwrap_or(STANDARD_PRESSURE),
        precipitation: reading
            .precipitation
            .or(reading.precipitation_sum)
            .unwrap_or(0.0),
        cloud_cover: reading
            .cloud_cover
            .map(percent)
            .unwrap_or_else(|| estimate_cloud_cover(condition)),
        visibility: reading
            .visibility
            .map(|metres| metres / 1000.0)
            .unwrap_or(CLEAR_VISIBILITY_KM),
        sunrise: clock(reading.sunrise),
        sunset: clock(reading.sunset),
        uv_index: reading.uv_index.unwrap_or(0.0),
        location,
        captured_at: now,
        source: DataSource::PrimaryProvider,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use chrono::TimeZone;

    fn location() -> LocationRef {
        LocationRef {
            name: "Talavera".to_string(),
            latitude: 15.7934,
            longitude: 120.992,
            city: None,
            province: None,
            region: None,
            country: "Philippines".to_string(),
            timezone: "Asia/Manila".to_string(),
        }
    }

    fn reading() -> CurrentReading {
        CurrentReading {
            temperature: 30.0,
            weather_code: 2,
            humidity: Some(40.0),
            wind_speed: 10.0,
            wind_direction: Some(359.7),
            precipitation: None,
            cloud_cover: None,
            pressure: Some(1009.0),
            visibility: Some(24_140.0),
            sunrise: Some("2026-07-01T05:29".to_string()),
            sunset: None,
            uv_index: Some(11.2),
            precipitation_sum: Some(0.4),
            timezone: Some("Asia/Manila".to_string()),
        }
    }

    #[test]
    fn test_reading_is_normalized() {
        let now = Utc.with_ymd_and_hms(2026, 7, 1, 3, 0, 0).unwrap();
        let snapshot = snapshot_from_reading(reading(), location(), now);

        assert_eq!(snapshot.condition, WeatherCondition::PartlyCloudy);
        assert_eq!(snapshot.display_feels_like(), 30);
        assert!((snapshot.wind_speed - 36.0).abs() < 1e-9);
        assert_eq!(snapshot.wind_direction, 0);
        assert_eq!(snapshot.cloud_cover, 40);
        assert!((snapshot.visibility - 24.14).abs() < 1e-9);
        assert_eq!(snapshot.precipitation, 0.4);
        assert_eq!(snapshot.sunrise, "5:29 AM");
        assert_eq!(snapshot.sunset, UNKNOWN_CLOCK);
        assert_eq!(snapshot.source, DataSource::PrimaryProvider);
        assert_eq!(snapshot.captured_at, now);
    }

    #[test]
    fn test_missing_humidity_skips_heat_index() {
        let now = Utc.with_ymd_and_hms(2026, 7, 1, 3, 0, 0).unwrap();
        let mut hot = reading();
        hot.temperature = 34.0;
        hot.humidity = None;

        let snapshot = snapshot_from_reading(hot, location(), now);
        assert_eq!(snapshot.feels_like, 34.0);
        assert_eq!(snapshot.humidity, 0);
    }
}
