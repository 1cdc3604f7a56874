//! Display helpers and farm-activity advice derived from a snapshot.

use serde::Serialize;

use crate::types::{WeatherCondition, WeatherSnapshot};

/// Background, text, and icon colors for a condition card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ColorScheme {
    pub bg: &'static str,
    pub text: &'static str,
    pub icon: &'static str,
}

impl WeatherCondition {
    pub fn color_scheme(&self) -> ColorScheme {
        let (bg, text, icon) = match self {
            Self::Clear => ("#FFF8E1", "#5D4037", "#FFB300"),
            Self::PartlyCloudy => ("#E3F2FD", "#37474F", "#FFA000"),
            Self::Cloudy => ("#ECEFF1", "#37474F", "#78909C"),
            Self::Fog => ("#F5F5F5", "#424242", "#9E9E9E"),
            Self::Drizzle => ("#E1F5FE", "#01579B", "#4FC3F7"),
            Self::Rain => ("#E3F2FD", "#0D47A1", "#1E88E5"),
            Self::HeavyRain => ("#BBDEFB", "#0D47A1", "#1565C0"),
            Self::Snow | Self::Sleet => ("#FAFAFA", "#263238", "#90A4AE"),
            Self::Thunderstorm => ("#D1C4E9", "#311B92", "#5E35B1"),
        };
        ColorScheme { bg, text, icon }
    }
}

/// Icon for a free-form condition label; unknown labels get the clear icon.
pub fn icon_for_label(label: &str) -> &'static str {
    WeatherCondition::from_label(label)
        .unwrap_or_default()
        .icon_name()
}

/// Colors for a free-form condition label; unknown labels get clear colors.
pub fn colors_for_label(label: &str) -> ColorScheme {
    WeatherCondition::from_label(label)
        .unwrap_or_default()
        .color_scheme()
}

/// How suitable conditions are for field work, best first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityStatus {
    Good,
    Moderate,
    Poor,
}

impl ActivityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Moderate => "moderate",
            Self::Poor => "poor",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FarmAdvisory {
    pub status: ActivityStatus,
    pub warnings: Vec<String>,
    pub suggestions: Vec<String>,
}

impl FarmAdvisory {
    fn new() -> Self {
        Self {
            status: ActivityStatus::Good,
            warnings: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    fn raise(&mut self, level: ActivityStatus) {
        self.status = self.status.max(level);
    }

    fn warn(&mut self, level: ActivityStatus, warning: &str) {
        self.raise(level);
        self.warnings.push(warning.to_string());
    }

    fn suggest(&mut self, suggestion: &str) {
        self.suggestions.push(suggestion.to_string());
    }
}

/// Farm-activity advice from fixed thresholds on the snapshot.
pub fn farm_recommendations(snapshot: &WeatherSnapshot) -> FarmAdvisory {
    let mut advisory = FarmAdvisory::new();

    if snapshot.temperature >= 35.0 {
        advisory.warn(ActivityStatus::Poor, "Extreme heat: avoid strenuous field work");
        advisory.suggest("Work early morning or late afternoon and keep hydrated");
    } else if snapshot.temperature >= 32.0 {
        advisory.raise(ActivityStatus::Moderate);
        advisory.suggest("Start field work early before the midday heat");
    } else if snapshot.temperature <= 15.0 {
        advisory.warn(ActivityStatus::Moderate, "Cold conditions: protect sensitive seedlings");
    }

    let heavy = matches!(
        snapshot.condition,
        WeatherCondition::HeavyRain | WeatherCondition::Thunderstorm
    );
    let light = matches!(
        snapshot.condition,
        WeatherCondition::Rain | WeatherCondition::Drizzle
    );
    if heavy || snapshot.precipitation >= 10.0 {
        advisory.warn(ActivityStatus::Poor, "Heavy rain: postpone field work and check drainage");
    } else if light || snapshot.precipitation > 0.0 {
        advisory.warn(ActivityStatus::Moderate, "Rain expected: postpone spraying and fertilizing");
    }

    if snapshot.wind_speed >= 40.0 {
        advisory.warn(ActivityStatus::Poor, "Strong winds: secure structures and avoid spraying");
    } else if snapshot.wind_speed >= 20.0 {
        advisory.warn(ActivityStatus::Moderate, "Windy: avoid spraying pesticides");
    }

    if snapshot.humidity >= 90 {
        advisory.warn(ActivityStatus::Moderate, "High humidity: watch for fungal disease");
    }

    if snapshot.uv_index >= 8.0 {
        advisory.suggest("High UV: wear a hat and protective clothing");
    }

    if advisory.status == ActivityStatus::Good {
        advisory.suggest("Good conditions for field work");
    }

    advisory
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use crate::types::{DataSource, LocationRef};
    use chrono::{TimeZone, Utc};

    fn snapshot() -> WeatherSnapshot {
        WeatherSnapshot {
            temperature: 28.0,
            feels_like: 29.0,
            condition: WeatherCondition::PartlyCloudy,
            humidity: 60,
            wind_speed: 8.0,
            wind_direction: 90,
            pressure: 1010.0,
            precipitation: 0.0,
            cloud_cover: 40,
            visibility: 10.0,
            sunrise: "5:30 AM".to_string(),
            sunset: "6:20 PM".to_string(),
            uv_index: 5.0,
            location: LocationRef {
                name: "Talavera".to_string(),
                latitude: 15.79,
                longitude: 120.99,
                city: None,
                province: None,
                region: None,
                country: "Philippines".to_string(),
                timezone: "Asia/Manila".to_string(),
            },
            captured_at: Utc.with_ymd_and_hms(2026, 3, 2, 1, 0, 0).unwrap(),
            source: DataSource::PrimaryProvider,
        }
    }

    #[test]
    fn test_calm_day_is_good() {
        let advisory = farm_recommendations(&snapshot());
        assert_eq!(advisory.status, ActivityStatus::Good);
        assert!(advisory.warnings.is_empty());
        assert_eq!(advisory.suggestions, vec!["Good conditions for field work"]);
    }

    #[test]
    fn test_temperature_thresholds() {
        let mut s = snapshot();
        s.temperature = 35.0;
        assert_eq!(farm_recommendations(&s).status, ActivityStatus::Poor);

        s.temperature = 32.0;
        let advisory = farm_recommendations(&s);
        assert_eq!(advisory.status, ActivityStatus::Moderate);
        assert!(advisory.warnings.is_empty());

        s.temperature = 15.0;
        assert_eq!(farm_recommendations(&s).status, ActivityStatus::Moderate);
    }

    #[test]
    fn test_rain_thresholds() {
        let mut s = snapshot();
        s.precipitation = 0.2;
        assert_eq!(farm_recommendations(&s).status, ActivityStatus::Moderate);

        s.precipitation = 10.0;
        assert_eq!(farm_recommendations(&s).status, ActivityStatus::Poor);

        s.precipitation = 0.0;
        s.condition = WeatherCondition::Thunderstorm;
        assert_eq!(farm_recommendations(&s).status, ActivityStatus::Poor);
    }

    #[test]
    fn test_wind_and_humidity() {
        let mut s = snapshot();
        s.wind_speed = 20.0;
        assert_eq!(farm_recommendations(&s).status, ActivityStatus::Moderate);
        s.wind_speed = 40.0;
        assert_eq!(farm_recommendations(&s).status, ActivityStatus::Poor);

        let mut s = snapshot();
        s.humidity = 90;
        assert_eq!(farm_recommendations(&s).status, ActivityStatus::Moderate);
    }

    #[test]
    fn test_worst_level_wins() {
        let mut s = snapshot();
        s.humidity = 95;
        s.wind_speed = 45.0;
        let advisory = farm_recommendations(&s);
        assert_eq!(advisory.status, ActivityStatus::Poor);
        assert_eq!(advisory.warnings.len(), 2);
    }

    #[test]
    fn test_high_uv_adds_suggestion() {
        let mut s = snapshot();
        s.uv_index = 9.0;
        let advisory = farm_recommendations(&s);
        assert_eq!(advisory.status, ActivityStatus::Good);
        assert_eq!(advisory.suggestions.len(), 2);
    }

    #[test]
    fn test_label_helpers_fall_back_to_clear() {
        assert_eq!(icon_for_label("Light rain showers"), "cloud_rain");
        assert_eq!(icon_for_label("???"), "sun");
        assert_eq!(colors_for_label(""), WeatherCondition::Clear.color_scheme());
        assert_eq!(
            colors_for_label("Thunderstorm with hail"),
            WeatherCondition::Thunderstorm.color_scheme()
        );
    }
}
