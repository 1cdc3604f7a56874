use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use bukid_core::LocationSeed;

/// Weather condition categories mapped from WMO codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    #[default]
    Clear,
    PartlyCloudy,
    Cloudy,
    Fog,
    Drizzle,
    Rain,
    HeavyRain,
    Snow,
    Sleet,
    Thunderstorm,
}

impl WeatherCondition {
    /// Convert WMO weather code to WeatherCondition
    /// See: https://open-meteo.com/en/docs#weathervariables
    pub fn from_wmo_code(code: i32) -> Self {
        match code {
            0 => Self::Clear,
            1..=2 => Self::PartlyCloudy,
            3 => Self::Cloudy,
            45 | 48 => Self::Fog,
            51 | 53 | 55 => Self::Drizzle,
            56 | 57 => Self::Sleet, // Freezing drizzle
            61 | 63 | 80 => Self::Rain,
            65 | 81 | 82 => Self::HeavyRain,
            66 | 67 => Self::Sleet, // Freezing rain
            71 | 73 | 75 | 77 | 85 | 86 => Self::Snow,
            95 | 96 | 99 => Self::Thunderstorm,
            _ => Self::Clear, // Unknown codes default to clear
        }
    }

    /// Parse a free-form condition label such as "Light rain" or "Overcast".
    ///
    /// Returns `None` when nothing in the label is recognised.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().to_lowercase();
        if label.is_empty() {
            return None;
        }

        let condition = if label.contains("thunder") || label.contains("storm") {
            Self::Thunderstorm
        } else if label.contains("heavy") && (label.contains("rain") || label.contains("shower")) {
            Self::HeavyRain
        } else if label.contains("sleet") || label.contains("freezing") {
            Self::Sleet
        } else if label.contains("drizzle") {
            Self::Drizzle
        } else if label.contains("rain") || label.contains("shower") {
            Self::Rain
        } else if label.contains("snow") {
            Self::Snow
        } else if label.contains("fog") || label.contains("mist") || label.contains("haze") {
            Self::Fog
        } else if label.contains("partly") || label.contains("few clouds") {
            Self::PartlyCloudy
        } else if label.contains("cloud") || label.contains("overcast") {
            Self::Cloudy
        } else if label.contains("clear") || label.contains("sun") {
            Self::Clear
        } else {
            return None;
        };

        Some(condition)
    }

    /// Get a human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::Clear => "Clear",
            Self::PartlyCloudy => "Partly Cloudy",
            Self::Cloudy => "Cloudy",
            Self::Fog => "Fog",
            Self::Drizzle => "Drizzle",
            Self::Rain => "Rain",
            Self::HeavyRain => "Heavy Rain",
            Self::Snow => "Snow",
            Self::Sleet => "Sleet",
            Self::Thunderstorm => "Thunderstorm",
        }
    }

    /// Get icon name (the UI maps these to its icon font)
    pub fn icon_name(&self) -> &'static str {
        match self {
            Self::Clear => "sun",
            Self::PartlyCloudy => "cloud_sun",
            Self::Cloudy => "cloud",
            Self::Fog => "cloud_fog",
            Self::Drizzle => "cloud_rain",
            Self::Rain => "cloud_rain",
            Self::HeavyRain => "cloud_rain",
            Self::Snow => "cloud_snow",
            Self::Sleet => "cloud_snow",
            Self::Thunderstorm => "cloud_lightning",
        }
    }

    /// True for conditions that wet the field
    pub fn is_wet(&self) -> bool {
        matches!(
            self,
            Self::Drizzle | Self::Rain | Self::HeavyRain | Self::Sleet | Self::Thunderstorm
        )
    }
}

/// Where a snapshot's numbers came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataSource {
    PrimaryProvider,
    SecondaryProvider,
    GeolocationDerived,
    /// Generated locally because every network attempt failed
    Synthetic,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PrimaryProvider => "primary-provider",
            Self::SecondaryProvider => "secondary-provider",
            Self::GeolocationDerived => "geolocation-derived",
            Self::Synthetic => "synthetic",
        }
    }

    /// True when the data came from a live provider
    pub fn is_live(&self) -> bool {
        !matches!(self, Self::Synthetic)
    }
}

/// A named place with coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRef {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub province: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    pub country: String,
    pub timezone: String,
}

impl LocationRef {
    /// Build a location from a configured seed
    pub fn from_seed(seed: &LocationSeed, country: &str, timezone: &str) -> Self {
        Self {
            name: seed.name.clone(),
            latitude: seed.latitude,
            longitude: seed.longitude,
            city: seed.city.clone(),
            province: seed.province.clone(),
            region: seed.region.clone(),
            country: country.to_string(),
            timezone: timezone.to_string(),
        }
    }
}

/// Human-readable description of a coordinate, as returned by reverse geocoding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceDescription {
    pub name: String,
    pub city: Option<String>,
    pub province: Option<String>,
    pub region: Option<String>,
    pub country: String,
}

impl PlaceDescription {
    /// Attach coordinates and a timezone to this description
    pub fn at(self, latitude: f64, longitude: f64, timezone: &str) -> LocationRef {
        LocationRef {
            name: self.name,
            latitude,
            longitude,
            city: self.city,
            province: self.province,
            region: self.region,
            country: self.country,
            timezone: timezone.to_string(),
        }
    }
}

/// A saved location in the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    #[serde(flatten)]
    pub location: LocationRef,
    pub is_current_location: bool,
    pub last_used: DateTime<Utc>,
}

impl LocationRecord {
    pub fn new(location: LocationRef, is_current_location: bool, last_used: DateTime<Utc>) -> Self {
        Self {
            location,
            is_current_location,
            last_used,
        }
    }

    pub fn latitude(&self) -> f64 {
        self.location.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.location.longitude
    }
}

/// A hardware geolocation reading
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoFix {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_meters: Option<f64>,
    pub acquired_at: DateTime<Utc>,
}

/// Current weather conditions at a location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    /// Degrees Celsius at provider precision
    pub temperature: f64,
    /// Derived apparent temperature, unrounded
    pub feels_like: f64,
    pub condition: WeatherCondition,
    /// Relative humidity, percent
    pub humidity: u8,
    /// km/h regardless of the provider's native unit
    pub wind_speed: f64,
    /// Degrees clockwise from north
    pub wind_direction: u16,
    /// Sea-level pressure, hPa
    pub pressure: f64,
    /// mm
    pub precipitation: f64,
    /// percent
    pub cloud_cover: u8,
    /// km
    pub visibility: f64,
    /// Local clock string, e.g. "5:42 AM"
    pub sunrise: String,
    pub sunset: String,
    pub uv_index: f64,
    pub location: LocationRef,
    pub captured_at: DateTime<Utc>,
    pub source: DataSource,
}

impl WeatherSnapshot {
    /// Temperature rounded for display
    pub fn display_temperature(&self) -> i32 {
        self.temperature.round() as i32
    }

    /// Feels-like temperature rounded for display
    pub fn display_feels_like(&self) -> i32 {
        self.feels_like.round() as i32
    }

    pub fn condition_label(&self) -> &'static str {
        self.condition.description()
    }
}

/// Daily forecast entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDay {
    pub date: NaiveDate,
    pub temp_max: f64,
    pub temp_min: f64,
    pub condition: WeatherCondition,
    /// mm
    pub precipitation: f64,
    /// percent
    pub precipitation_probability: u8,
    pub sunrise: String,
    pub sunset: String,
    pub uv_index: f64,
    /// Maximum wind, km/h
    pub wind_speed: f64,
    /// percent
    pub humidity: u8,
}

/// A contiguous run of daily forecasts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSeries {
    pub location: LocationRef,
    pub days: Vec<ForecastDay>,
    pub fetched_at: DateTime<Utc>,
    pub source: DataSource,
}

impl ForecastSeries {
    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// True when every day follows the previous one with no gaps
    pub fn is_contiguous(&self) -> bool {
        self.days
            .windows(2)
            .all(|pair| pair[0].date.succ_opt() == Some(pair[1].date))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_wmo_code_clear() {
        assert_eq!(WeatherCondition::from_wmo_code(0), WeatherCondition::Clear);
    }

    #[test]
    fn test_wmo_code_partly_cloudy() {
        assert_eq!(WeatherCondition::from_wmo_code(1), WeatherCondition::PartlyCloudy);
        assert_eq!(WeatherCondition::from_wmo_code(2), WeatherCondition::PartlyCloudy);
    }

    #[test]
    fn test_wmo_code_rain() {
        assert_eq!(WeatherCondition::from_wmo_code(61), WeatherCondition::Rain);
        assert_eq!(WeatherCondition::from_wmo_code(63), WeatherCondition::Rain);
        assert_eq!(WeatherCondition::from_wmo_code(80), WeatherCondition::Rain);
    }

    #[test]
    fn test_wmo_code_heavy_rain() {
        assert_eq!(WeatherCondition::from_wmo_code(65), WeatherCondition::HeavyRain);
        assert_eq!(WeatherCondition::from_wmo_code(81), WeatherCondition::HeavyRain);
        assert_eq!(WeatherCondition::from_wmo_code(82), WeatherCondition::HeavyRain);
    }

    #[test]
    fn test_wmo_code_thunderstorm() {
        assert_eq!(WeatherCondition::from_wmo_code(95), WeatherCondition::Thunderstorm);
        assert_eq!(WeatherCondition::from_wmo_code(99), WeatherCondition::Thunderstorm);
    }

    #[test]
    fn test_wmo_code_unknown_defaults_to_clear() {
        assert_eq!(WeatherCondition::from_wmo_code(999), WeatherCondition::Clear);
        assert_eq!(WeatherCondition::from_wmo_code(-1), WeatherCondition::Clear);
    }

    #[test]
    fn test_condition_from_label() {
        assert_eq!(
            WeatherCondition::from_label("Partly cloudy"),
            Some(WeatherCondition::PartlyCloudy)
        );
        assert_eq!(
            WeatherCondition::from_label("HEAVY RAIN"),
            Some(WeatherCondition::HeavyRain)
        );
        assert_eq!(
            WeatherCondition::from_label("light drizzle"),
            Some(WeatherCondition::Drizzle)
        );
        assert_eq!(
            WeatherCondition::from_label("Overcast"),
            Some(WeatherCondition::Cloudy)
        );
        assert_eq!(
            WeatherCondition::from_label("thunderstorm with hail"),
            Some(WeatherCondition::Thunderstorm)
        );
        assert_eq!(WeatherCondition::from_label("sunny"), Some(WeatherCondition::Clear));
        assert_eq!(WeatherCondition::from_label(""), None);
        assert_eq!(WeatherCondition::from_label("volcanic ash"), None);
    }

    #[test]
    fn test_condition_description() {
        assert_eq!(WeatherCondition::Clear.description(), "Clear");
        assert_eq!(WeatherCondition::Thunderstorm.description(), "Thunderstorm");
    }

    #[test]
    fn test_condition_icon_name() {
        assert_eq!(WeatherCondition::Clear.icon_name(), "sun");
        assert_eq!(WeatherCondition::Rain.icon_name(), "cloud_rain");
    }

    #[test]
    fn test_data_source_serializes_kebab_case() {
        let json = serde_json::to_string(&DataSource::PrimaryProvider).unwrap_or_default();
        assert_eq!(json, "\"primary-provider\"");
        assert_eq!(DataSource::Synthetic.as_str(), "synthetic");
        assert!(!DataSource::Synthetic.is_live());
    }
}
