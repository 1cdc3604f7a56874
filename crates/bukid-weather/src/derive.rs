//! Fields computed locally when the provider does not supply them.

use chrono::NaiveDateTime;

use crate::types::WeatherCondition;

/// Heat index applies at or above this temperature (°C)
pub const HEAT_INDEX_MIN_C: f64 = 27.0;

/// Wind chill applies at or below this temperature (°C)
pub const WIND_CHILL_MAX_C: f64 = 10.0;

/// Wind chill needs wind above 1.34 m/s
pub const WIND_CHILL_MIN_KMH: f64 = 1.34 * 3.6;

/// Shown when the provider omits sunrise or sunset
pub const UNKNOWN_CLOCK: &str = "--:--";

/// Apparent temperature in °C from unrounded inputs.
pub fn feels_like(temp_c: f64, humidity: f64, wind_kmh: f64) -> f64 {
    if temp_c >= HEAT_INDEX_MIN_C {
        heat_index(temp_c, humidity)
    } else if temp_c <= WIND_CHILL_MAX_C && wind_kmh > WIND_CHILL_MIN_KMH {
        wind_chill(temp_c, wind_kmh)
    } else {
        temp_c
    }
}

/// NWS heat index: Steadman's simple form, Rothfusz regression when hot enough.
fn heat_index(temp_c: f64, humidity: f64) -> f64 {
    let t = temp_c * 9.0 / 5.0 + 32.0;
    let rh = humidity.clamp(0.0, 100.0);

    let simple = 0.5 * (t + 61.0 + (t - 68.0) * 1.2 + rh * 0.094);
    if (simple + t) / 2.0 < 80.0 {
        return fahrenheit_to_celsius(simple);
    }

    let mut hi = -42.379 + 2.049_015_23 * t + 10.143_331_27 * rh
        - 0.224_755_41 * t * rh
        - 6.837_83e-3 * t * t
        - 5.481_717e-2 * rh * rh
        + 1.228_74e-3 * t * t * rh
        + 8.528_2e-4 * t * rh * rh
        - 1.99e-6 * t * t * rh * rh;

    if rh < 13.0 && (80.0..=112.0).contains(&t) {
        hi -= ((13.0 - rh) / 4.0) * ((17.0 - (t - 95.0).abs()) / 17.0).sqrt();
    } else if rh > 85.0 && (80.0..=87.0).contains(&t) {
        hi += ((rh - 85.0) / 10.0) * ((87.0 - t) / 5.0);
    }

    fahrenheit_to_celsius(hi)
}

/// Environment Canada wind chill index.
fn wind_chill(temp_c: f64, wind_kmh: f64) -> f64 {
    let v = wind_kmh.powf(0.16);
    13.12 + 0.6215 * temp_c - 11.37 * v + 0.3965 * temp_c * v
}

fn fahrenheit_to_celsius(f: f64) -> f64 {
    (f - 32.0) * 5.0 / 9.0
}

/// Normalize wind from m/s to km/h.
pub fn ms_to_kmh(speed_ms: f64) -> f64 {
    speed_ms * 3.6
}

/// Typical cloud cover for a condition, used when the provider omits it.
pub fn estimate_cloud_cover(condition: WeatherCondition) -> u8 {
    match condition {
        WeatherCondition::Clear => 10,
        WeatherCondition::PartlyCloudy => 40,
        WeatherCondition::Cloudy => 90,
        WeatherCondition::Fog => 100,
        WeatherCondition::Drizzle => 80,
        WeatherCondition::Rain => 85,
        WeatherCondition::HeavyRain => 95,
        WeatherCondition::Snow | WeatherCondition::Sleet => 90,
        WeatherCondition::Thunderstorm => 95,
    }
}

/// Format a provider local timestamp ("2026-05-01T05:42") as "5:42 AM".
pub fn format_clock(timestamp: &str) -> String {
    NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M:%S"))
        .map(|t| t.format("%-I:%M %p").to_string())
        .unwrap_or_else(|_| UNKNOWN_CLOCK.to_string())
}

/// Clamp a provider percentage into 0..=100.
pub fn percent(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}
