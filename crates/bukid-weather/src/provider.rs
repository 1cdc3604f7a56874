//! Open-Meteo client: current conditions and daily series.
//! Wind is requested in m/s and normalized by the caller.

use chrono::NaiveDate;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

use crate::error::WeatherError;

const CURRENT_FIELDS: &str = "temperature_2m,relative_humidity_2m,precipitation,weather_code,\
cloud_cover,pressure_msl,wind_speed_10m,wind_direction_10m,visibility";

const CURRENT_DAILY_FIELDS: &str = "sunrise,sunset,uv_index_max,precipitation_sum";

const FORECAST_DAILY_FIELDS: &str = "weather_code,temperature_2m_max,temperature_2m_min,\
precipitation_sum,precipitation_probability_max,sunrise,sunset,uv_index_max,\
wind_speed_10m_max,relative_humidity_2m_mean";

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    timezone: Option<String>,
    current: Option<CurrentBlock>,
    daily: Option<DailyBlock>,
}

#[derive(Debug, Deserialize)]
struct CurrentBlock {
    temperature_2m: Option<f64>,
    relative_humidity_2m: Option<f64>,
    precipitation: Option<f64>,
    weather_code: Option<f64>,
    cloud_cover: Option<f64>,
    pressure_msl: Option<f64>,
    wind_speed_10m: Option<f64>,
    wind_direction_10m: Option<f64>,
    visibility: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct DailyBlock {
    #[serde(default)]
    time: Vec<String>,
    #[serde(default)]
    weather_code: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_min: Vec<Option<f64>>,
    #[serde(default)]
    precipitation_sum: Vec<Option<f64>>,
    #[serde(default)]
    precipitation_probability_max: Vec<Option<f64>>,
    #[serde(default)]
    sunrise: Vec<Option<String>>,
    #[serde(default)]
    sunset: Vec<Option<String>>,
    #[serde(default)]
    uv_index_max: Vec<Option<f64>>,
    #[serde(default)]
    wind_speed_10m_max: Vec<Option<f64>>,
    #[serde(default)]
    relative_humidity_2m_mean: Vec<Option<f64>>,
}

/// Value at `i` of a column that may be short or contain nulls
fn at<T: Clone>(column: &[Option<T>], i: usize) -> Option<T> {
    column.get(i).cloned().flatten()
}

/// Current conditions as reported by the provider, in provider units
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentReading {
    pub temperature: f64,
    pub weather_code: i32,
    pub humidity: Option<f64>,
    /// m/s
    pub wind_speed: f64,
    pub wind_direction: Option<f64>,
    pub precipitation: Option<f64>,
    pub cloud_cover: Option<f64>,
    pub pressure: Option<f64>,
    /// metres
    pub visibility: Option<f64>,
    /// Local timestamps, e.g. "2026-05-01T05:42"
    pub sunrise: Option<String>,
    pub sunset: Option<String>,
    pub uv_index: Option<f64>,
    pub precipitation_sum: Option<f64>,
    pub timezone: Option<String>,
}

/// One day of the provider's daily series, in provider units
#[derive(Debug, Clone, PartialEq)]
pub struct DailyReading {
    pub date: NaiveDate,
    pub weather_code: i32,
    pub temp_max: f64,
    pub temp_min: f64,
    pub precipitation: Option<f64>,
    pub precipitation_probability: Option<f64>,
    pub sunrise: Option<String>,
    pub sunset: Option<String>,
    pub uv_index: Option<f64>,
    /// m/s
    pub wind_speed: Option<f64>,
    pub humidity: Option<f64>,
}

/// Daily series plus the timezone the provider resolved
#[derive(Debug, Clone, PartialEq)]
pub struct DailySeries {
    pub days: Vec<DailyReading>,
    pub timezone: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WeatherProvider {
    client: Arc<Client>,
    base_url: String,
}

impl WeatherProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, WeatherError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client: Arc::new(client),
            base_url: base_url.to_string(),
        })
    }

    /// Fetch current conditions plus today's sunrise/sunset/UV.
    #[instrument(skip(self), level = "debug")]
    pub async fn current(&self, latitude: f64, longitude: f64) -> Result<CurrentReading, WeatherError> {
        let body: ForecastResponse = self
            .get(&[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                ("current", CURRENT_FIELDS.to_string()),
                ("daily", CURRENT_DAILY_FIELDS.to_string()),
                ("wind_speed_unit", "ms".to_string()),
                ("timezone", "auto".to_string()),
                ("forecast_days", "1".to_string()),
            ])
            .await?;

        let current = body
            .current
            .ok_or_else(|| WeatherError::Parse("response has no current block".into()))?;
        let temperature = current
            .temperature_2m
            .ok_or_else(|| WeatherError::Parse("current temperature missing".into()))?;
        let weather_code = current
            .weather_code
            .ok_or_else(|| WeatherError::Parse("current weather code missing".into()))?;

        let daily = body.daily.unwrap_or_default();

        Ok(CurrentReading {
            temperature,
            weather_code: weather_code as i32,
            humidity: current.relative_humidity_2m,
            wind_speed: current.wind_speed_10m.unwrap_or(0.0),
            wind_direction: current.wind_direction_10m,
            precipitation: current.precipitation,
            cloud_cover: current.cloud_cover,
            pressure: current.pressure_msl,
            visibility: current.visibility,
            sunrise: at(&daily.sunrise, 0),
            sunset: at(&daily.sunset, 0),
            uv_index: at(&daily.uv_index_max, 0),
            precipitation_sum: at(&daily.precipitation_sum, 0),
            timezone: body.timezone,
        })
    }

    /// Fetch `days` days of daily forecast starting today.
    #[instrument(skip(self), level = "debug")]
    pub async fn daily(
        &self,
        latitude: f64,
        longitude: f64,
        days: u32,
    ) -> Result<DailySeries, WeatherError> {
        let body: ForecastResponse = self
            .get(&[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                ("daily", FORECAST_DAILY_FIELDS.to_string()),
                ("wind_speed_unit", "ms".to_string()),
                ("timezone", "auto".to_string()),
                ("forecast_days", days.to_string()),
            ])
            .await?;

        let daily = body
            .daily
            .ok_or_else(|| WeatherError::Parse("response has no daily block".into()))?;

        let mut readings = Vec::with_capacity(daily.time.len());
        for (i, time) in daily.time.iter().enumerate() {
            let date = NaiveDate::parse_from_str(time, "%Y-%m-%d")
                .map_err(|e| WeatherError::Parse(format!("bad date '{}': {}", time, e)))?;
            let (Some(temp_max), Some(temp_min)) =
                (at(&daily.temperature_2m_max, i), at(&daily.temperature_2m_min, i))
            else {
                return Err(WeatherError::Parse(format!("temperature missing for {}", time)));
            };

            readings.push(DailyReading {
                date,
                weather_code: at(&daily.weather_code, i).unwrap_or(0.0) as i32,
                temp_max,
                temp_min,
                precipitation: at(&daily.precipitation_sum, i),
                precipitation_probability: at(&daily.precipitation_probability_max, i),
                sunrise: at(&daily.sunrise, i),
                sunset: at(&daily.sunset, i),
                uv_index: at(&daily.uv_index_max, i),
                wind_speed: at(&daily.wind_speed_10m_max, i),
                humidity: at(&daily.relative_humidity_2m_mean, i),
            });
        }

        Ok(DailySeries {
            days: readings,
            timezone: body.timezone,
        })
    }

    async fn get<T: DeserializeOwned>(&self, query: &[(&str, String)]) -> Result<T, WeatherError> {
        let response = self.client.get(&self.base_url).query(query).send().await?;

        if !response.status().is_success() {
            tracing::debug!("Weather provider returned status {}", response.status());
            return Err(WeatherError::Provider {
                status: response.status().as_u16(),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| WeatherError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn provider(server: &MockServer) -> WeatherProvider {
        WeatherProvider::new(&format!("{}/v1/forecast", server.uri()), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_current_parses_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .and(query_param("wind_speed_unit", "ms"))
            .and(query_param("forecast_days", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "timezone": "Asia/Manila",
                "current": {
                    "temperature_2m": 31.4,
                    "relative_humidity_2m": 62,
                    "weather_code": 3,
                    "wind_speed_10m": 4.2,
                    "wind_direction_10m": 135
                },
                "daily": {
                    "time": ["2026-05-01"],
                    "sunrise": ["2026-05-01T05:32"],
                    "sunset": ["2026-05-01T18:11"],
                    "uv_index_max": [10.5],
                    "precipitation_sum": [1.2]
                }
            })))
            .mount(&server)
            .await;

        let reading = provider(&server).await.current(15.79, 120.99).await.unwrap();
        assert_eq!(reading.temperature, 31.4);
        assert_eq!(reading.weather_code, 3);
        assert_eq!(reading.humidity, Some(62.0));
        assert_eq!(reading.cloud_cover, None);
        assert_eq!(reading.sunrise.as_deref(), Some("2026-05-01T05:32"));
        assert_eq!(reading.uv_index, Some(10.5));
        assert_eq!(reading.timezone.as_deref(), Some("Asia/Manila"));
    }

    #[tokio::test]
    async fn test_current_without_temperature_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "current": { "weather_code": 1 }
            })))
            .mount(&server)
            .await;

        let err = provider(&server).await.current(15.0, 121.0).await.unwrap_err();
        assert!(matches!(err, WeatherError::Parse(_)));
    }

    #[tokio::test]
    async fn test_server_error_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = provider(&server).await.current(15.0, 121.0).await.unwrap_err();
        assert!(matches!(err, WeatherError::Provider { status: 503 }));
    }

    #[tokio::test]
    async fn test_daily_parses_series() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("forecast_days", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "daily": {
                    "time": ["2026-05-01", "2026-05-02"],
                    "weather_code": [61, 2],
                    "temperature_2m_max": [33.0, 34.1],
                    "temperature_2m_min": [24.0, 24.5],
                    "precipitation_sum": [6.5, null],
                    "precipitation_probability_max": [80, 10]
                }
            })))
            .mount(&server)
            .await;

        let series = provider(&server).await.daily(15.0, 121.0, 2).await.unwrap();
        assert_eq!(series.days.len(), 2);
        assert_eq!(series.days[0].weather_code, 61);
        assert_eq!(series.days[1].precipitation, None);
        assert_eq!(series.days[1].date, NaiveDate::from_ymd_opt(2026, 5, 2).unwrap());
        assert_eq!(series.days[0].wind_speed, None);
    }

    #[tokio::test]
    async fn test_daily_missing_temperature_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "daily": {
                    "time": ["2026-05-01"],
                    "temperature_2m_max": [null],
                    "temperature_2m_min": [24.0]
                }
            })))
            .mount(&server)
            .await;

        let err = provider(&server).await.daily(15.0, 121.0, 1).await.unwrap_err();
        assert!(matches!(err, WeatherError::Parse(_)));
    }
}
