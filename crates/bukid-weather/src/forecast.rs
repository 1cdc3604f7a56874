//! Daily forecast fetch with a synthetic fallback.

use bukid_core::config::{MAX_FORECAST_DAYS, MAX_PROVIDER_FORECAST_DAYS};

use crate::cache::CacheCategory;
use crate::derive::{format_clock, ms_to_kmh, percent, UNKNOWN_CLOCK};
use crate::error::WeatherError;
use crate::geo::{coarse_key, validate_coordinates};
use crate::provider::{DailyReading, DailySeries};
use crate::service::WeatherService;
use crate::synthetic;
use crate::types::{DataSource, ForecastDay, ForecastSeries, LocationRef, WeatherCondition};

/// Cache key for a forecast: coarse coordinates plus day count.
pub fn forecast_key(latitude: f64, longitude: f64, days: u32) -> String {
    format!("{}:{}", coarse_key(latitude, longitude), days)
}

impl WeatherService {
    pub(crate) async fn fetch_forecast(
        &self,
        latitude: f64,
        longitude: f64,
        days: u32,
    ) -> Result<ForecastSeries, WeatherError> {
        validate_coordinates(latitude, longitude)?;
        validate_days(days)?;
        let key = forecast_key(latitude, longitude, days);

        if let Some(series) = self.store.get::<ForecastSeries>(CacheCategory::Forecast, &key) {
            tracing::debug!("Forecast cache hit for {}", key);
            return Ok(series);
        }

        let place = self.geocoder.resolve(latitude, longitude).await;
        let now = self.clock.now();

        let provided = if (1..=MAX_PROVIDER_FORECAST_DAYS).contains(&days) {
            match self.provider.daily(latitude, longitude, days).await {
                Ok(series) => usable_days(series, days),
                Err(e) => {
                    tracing::warn!("Forecast provider failed for {}: {}", key, e);
                    None
                }
            }
        } else {
            tracing::debug!("Forecast of {} days is beyond the provider horizon", days);
            None
        };

        let series = match provided {
            Some((days, timezone)) => {
                let timezone = timezone.unwrap_or_else(|| self.settings.default_timezone.clone());
                let series = ForecastSeries {
                    location: place.at(latitude, longitude, &timezone),
                    days,
                    fetched_at: now,
                    source: DataSource::PrimaryProvider,
                };
                self.upsert_fetched(&series.location);
                series
            }
            None => {
                let location: LocationRef =
                    place.at(latitude, longitude, &self.settings.default_timezone);
                let start = synthetic::local_date(longitude, now);
                let days = synthetic::forecast(&mut *self.rng.lock(), latitude, start, days);
                tracing::info!("Using synthetic forecast for {}", location.name);
                ForecastSeries {
                    location,
                    days,
                    fetched_at: now,
                    source: DataSource::Synthetic,
                }
            }
        };

        if let Err(e) = self.store.put(CacheCategory::Forecast, &key, &series) {
            tracing::warn!("Failed to cache forecast for {}: {}", key, e);
        }

        Ok(series)
    }
}

fn validate_days(days: u32) -> Result<(), WeatherError> {
    if (1..=MAX_FORECAST_DAYS).contains(&days) {
        Ok(())
    } else {
        Err(WeatherError::InvalidForecastDays {
            days,
            max: MAX_FORECAST_DAYS,
        })
    }
}

/// Convert a provider series, or `None` if it is the wrong length or has gaps.
fn usable_days(series: DailySeries, expected: u32) -> Option<(Vec<ForecastDay>, Option<String>)> {
    if series.days.len() != expected as usize {
        tracing::warn!(
            "Forecast provider returned {} days, expected {}",
            series.days.len(),
            expected
        );
        return None;
    }

    let days: Vec<ForecastDay> = series.days.into_iter().map(day_from_reading).collect();
    let contiguous = days
        .windows(2)
        .all(|pair| pair[0].date.succ_opt() == Some(pair[1].date));
    if !contiguous {
        tracing::warn!("Forecast provider returned non-contiguous dates");
        return None;
    }

    Some((days, series.timezone))
}

fn day_from_reading(reading: DailyReading) -> ForecastDay {
    let clock = |value: Option<String>| {
        value
            .as_deref()
            .map(format_clock)
            .unwrap_or_else(|| UNKNOWN_CLOCK.to_string())
    };

    ForecastDay {
        date: reading.date,
        temp_max: reading.temp_max,
        temp_min: reading.temp_min,
        condition: WeatherCondition::from_wmo_code(reading.weather_code),
        precipitation: reading.precipitation.unwrap_or(0.0),
        precipitation_probability: reading.precipitation_probability.map(percent).unwrap_or(0),
        sunrise: clock(reading.sunrise),
        sunset: clock(reading.sunset),
        uv_index: reading.uv_index.unwrap_or(0.0),
        wind_speed: ms_to_kmh(reading.wind_speed.unwrap_or(0.0)),
        humidity: reading.humidity.map(percent).unwrap_or(0),
    }
}
