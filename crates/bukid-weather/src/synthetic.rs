//! Plausible weather for when every provider attempt has failed.
//!
//! Snapshots are a pure function of place and time: a latitude-band base
//! temperature, a warming curve over local solar time, and a rainy-season
//! bias inside the home region. Forecasts draw rain independently per day
//! from the injected RNG.

use bukid_core::config::MAX_FORECAST_DAYS;
use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc};
use rand::Rng;

use crate::derive::{estimate_cloud_cover, feels_like};
use crate::types::{DataSource, ForecastDay, LocationRef, WeatherCondition, WeatherSnapshot};

/// Chance of rain on any synthetic forecast day
pub const RAIN_PROBABILITY: f64 = 0.3;

/// Largest day-to-day change of the synthetic high, °C
pub const MAX_DAILY_STEP_C: f64 = 1.5;

/// Largest drift of the synthetic high from its base, °C
pub const MAX_DRIFT_C: f64 = 4.0;

/// True inside the home-region box (Philippine archipelago)
fn in_home_region(latitude: f64, longitude: f64) -> bool {
    (4.0..=21.0).contains(&latitude) && (116.0..=127.0).contains(&longitude)
}

/// Southwest monsoon: June through November
fn is_rainy_season(month: u32) -> bool {
    (6..=11).contains(&month)
}

/// Typical daily high for a latitude band
fn base_high(latitude: f64) -> f64 {
    let lat = latitude.abs();
    if lat < 23.5 {
        32.0
    } else if lat < 45.0 {
        32.0 - (lat - 23.5) * 0.5
    } else {
        21.0 - (lat - 45.0) * 0.6
    }
}

/// Hours east of UTC by longitude, as local solar time
fn solar_hour(longitude: f64, now: DateTime<Utc>) -> f64 {
    let utc_hours = now.hour() as f64 + now.minute() as f64 / 60.0;
    (utc_hours + longitude / 15.0).rem_euclid(24.0)
}

/// Local calendar date at the coordinate's solar offset
pub fn local_date(longitude: f64, now: DateTime<Utc>) -> NaiveDate {
    let offset_minutes = (longitude / 15.0 * 60.0).round() as i64;
    (now + Duration::minutes(offset_minutes)).date_naive()
}

/// Deterministic snapshot for a place and time.
pub fn snapshot(location: &LocationRef, now: DateTime<Utc>) -> WeatherSnapshot {
    let hour = solar_hour(location.longitude, now);
    let month = local_date(location.longitude, now).month();
    let high = base_high(location.latitude);
    let low = high - 8.0;

    // Warmest at 14:00 solar time, coolest at 02:00
    let daytime = (6.0..=18.0).contains(&hour);
    let curve = ((hour - 8.0) / 24.0 * std::f64::consts::TAU).sin();
    let temperature = ((high + low) / 2.0 + (high - low) / 2.0 * curve).round();

    let rainy = in_home_region(location.latitude, location.longitude) && is_rainy_season(month);
    let (condition, precipitation, humidity) = if rainy && hour >= 13.0 {
        (WeatherCondition::Rain, 4.0, 88u8)
    } else if rainy {
        (WeatherCondition::Cloudy, 0.5, 82)
    } else if daytime {
        (WeatherCondition::PartlyCloudy, 0.0, 65)
    } else {
        (WeatherCondition::Clear, 0.0, 78)
    };

    let wind_speed = if rainy { 15.0 } else { 8.0 };
    let uv_index = if daytime && !rainy {
        (10.0 * (1.0 - ((hour - 12.0) / 6.0).abs())).max(0.0).round()
    } else {
        0.0
    };

    WeatherSnapshot {
        temperature,
        feels_like: feels_like(temperature, humidity as f64, wind_speed),
        condition,
        humidity,
        wind_speed,
        wind_direction: if rainy { 225 } else { 90 },
        pressure: if rainy { 1006.0 } else { 1011.0 },
        precipitation,
        cloud_cover: estimate_cloud_cover(condition),
        visibility: if rainy { 6.0 } else { 10.0 },
        sunrise: "6:00 AM".to_string(),
        sunset: "6:00 PM".to_string(),
        uv_index,
        location: location.clone(),
        captured_at: now,
        source: DataSource::Synthetic,
    }
}

/// `days` contiguous synthetic days starting at `start`.
pub fn forecast<R: Rng + ?Sized>(
    rng: &mut R,
    latitude: f64,
    start: NaiveDate,
    days: u32,
) -> Vec<ForecastDay> {
    let base = base_high(latitude);
    let mut high = base;
    let mut out = Vec::with_capacity(days.min(MAX_FORECAST_DAYS) as usize);
    let mut date = start;

    for _ in 0..days {
        let step = rng.random_range(-MAX_DAILY_STEP_C..=MAX_DAILY_STEP_C);
        high = (high + step).clamp(base - MAX_DRIFT_C, base + MAX_DRIFT_C);
        let rain = rng.random_bool(RAIN_PROBABILITY);

        let (condition, precipitation, probability, humidity) = if rain {
            (
                WeatherCondition::Rain,
                rng.random_range(2.0..15.0),
                rng.random_range(60..=90),
                rng.random_range(80..=92),
            )
        } else {
            let condition = if rng.random_bool(0.5) {
                WeatherCondition::Clear
            } else {
                WeatherCondition::PartlyCloudy
            };
            (condition, 0.0, rng.random_range(0..=20), rng.random_range(60..=75))
        };

        let high_rounded = (high * 10.0).round() / 10.0;
        out.push(ForecastDay {
            date,
            temp_max: high_rounded,
            temp_min: high_rounded - if rain { 6.0 } else { 8.0 },
            condition,
            precipitation: (precipitation * 10.0_f64).round() / 10.0,
            precipitation_probability: probability,
            sunrise: "6:00 AM".to_string(),
            sunset: "6:00 PM".to_string(),
            uv_index: if rain { 4.0 } else { 9.0 },
            wind_speed: if rain { 18.0 } else { 10.0 },
            humidity,
        });

        match date.succ_opt() {
            Some(next) => date = next,
            None => break,
        }
    }

    out
}
