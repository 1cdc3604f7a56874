//! Reverse geocoding: convert coordinates to human-readable place names.
//! Uses Nominatim (OpenStreetMap) - free, no API key required.
//!
//! Results are cached for seven days at ~11 m precision. Failures fall back
//! to a "Location (lat, lon)" description and are not cached.

use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

use crate::cache::{CacheCategory, CacheStore};
use crate::error::WeatherError;
use crate::geo::fine_key;
use crate::types::PlaceDescription;

const USER_AGENT: &str = "Bukid/0.1.0 (farm weather)";

#[derive(Debug, Deserialize)]
struct NominatimResponse {
    address: Option<NominatimAddress>,
}

#[derive(Debug, Default, Deserialize)]
struct NominatimAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    municipality: Option<String>,
    province: Option<String>,
    county: Option<String>,
    state: Option<String>,
    region: Option<String>,
    country: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

impl NominatimAddress {
    /// Build a description, or `None` when the address names nothing.
    fn into_place(self, home_country: &str) -> Option<PlaceDescription> {
        let city = non_empty(self.city)
            .or_else(|| non_empty(self.town))
            .or_else(|| non_empty(self.village))
            .or_else(|| non_empty(self.municipality));
        let state = non_empty(self.state);
        let country = non_empty(self.country);

        // Display name: place > state > country, without repeats
        let mut parts: Vec<&str> = Vec::new();
        for part in [city.as_deref(), state.as_deref(), country.as_deref()]
            .into_iter()
            .flatten()
        {
            if !parts.contains(&part) {
                parts.push(part);
            }
        }
        if parts.is_empty() {
            return None;
        }
        let name = parts.join(", ");

        Some(PlaceDescription {
            name,
            city,
            province: non_empty(self.province).or_else(|| non_empty(self.county)),
            region: non_empty(self.region).or_else(|| state.clone()),
            country: country.unwrap_or_else(|| home_country.to_string()),
        })
    }
}

/// Description used when the coordinate could not be resolved at all.
pub fn fallback_place(latitude: f64, longitude: f64, home_country: &str) -> PlaceDescription {
    PlaceDescription {
        name: format!("Location ({:.4}, {:.4})", latitude, longitude),
        city: None,
        province: None,
        region: None,
        country: home_country.to_string(),
    }
}

/// Cache-first reverse geocoder
pub struct ReverseGeocoder {
    client: Client,
    base_url: String,
    home_country: String,
    store: Arc<CacheStore>,
}

impl ReverseGeocoder {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        home_country: &str,
        store: Arc<CacheStore>,
    ) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            home_country: home_country.to_string(),
            store,
        })
    }

    /// Resolve a coordinate to a place description. Never fails.
    pub async fn resolve(&self, latitude: f64, longitude: f64) -> PlaceDescription {
        let key = fine_key(latitude, longitude);

        if let Some(place) = self.store.get::<PlaceDescription>(CacheCategory::Geocode, &key) {
            tracing::debug!("Reverse geocode cache hit for {}", key);
            return place;
        }

        match self.lookup(latitude, longitude).await {
            Ok(Some(place)) => {
                tracing::info!("Reverse geocoded {} to: {}", key, place.name);
                if let Err(e) = self.store.put(CacheCategory::Geocode, &key, &place) {
                    tracing::warn!("Failed to cache place for {}: {}", key, e);
                }
                place
            }
            Ok(None) => {
                tracing::debug!("Reverse geocode found no address for {}", key);
                PlaceDescription {
                    name: format!("{:.4}, {:.4}", latitude, longitude),
                    ..fallback_place(latitude, longitude, &self.home_country)
                }
            }
            Err(e) => {
                tracing::warn!("Reverse geocode failed for {}: {}", key, e);
                fallback_place(latitude, longitude, &self.home_country)
            }
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn lookup(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Option<PlaceDescription>, WeatherError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("lat", latitude.to_string()),
                ("lon", longitude.to_string()),
                ("format", "json".to_string()),
                ("addressdetails", "1".to_string()),
                ("zoom", "14".to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(WeatherError::Provider {
                status: response.status().as_u16(),
            });
        }

        let body: NominatimResponse = response
            .json()
            .await
            .map_err(|e| WeatherError::Parse(e.to_string()))?;

        Ok(body
            .address
            .and_then(|address| address.into_place(&self.home_country)))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn geocoder(server: &MockServer, store: Arc<CacheStore>) -> ReverseGeocoder {
        ReverseGeocoder::new(
            &format!("{}/reverse", server.uri()),
            Duration::from_secs(5),
            "Philippines",
            store,
        )
        .unwrap()
    }

    #[test]
    fn test_name_priority_and_dedup() {
        let address = NominatimAddress {
            town: Some("Talavera".into()),
            province: Some("Nueva Ecija".into()),
            state: Some("Central Luzon".into()),
            country: Some("Philippines".into()),
            ..Default::default()
        };
        let place = address.into_place("Philippines").unwrap();
        assert_eq!(place.name, "Talavera, Central Luzon, Philippines");
        assert_eq!(place.city.as_deref(), Some("Talavera"));
        assert_eq!(place.province.as_deref(), Some("Nueva Ecija"));

        let address = NominatimAddress {
            state: Some("Metro Manila".into()),
            country: Some("Metro Manila".into()),
            ..Default::default()
        };
        assert_eq!(address.into_place("Philippines").unwrap().name, "Metro Manila");
    }

    #[test]
    fn test_empty_address_resolves_nothing() {
        assert!(NominatimAddress::default().into_place("Philippines").is_none());
    }

    #[tokio::test]
    async fn test_resolve_caches_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reverse"))
            .and(query_param("format", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "address": {
                    "city": "Cabanatuan",
                    "state": "Central Luzon",
                    "country": "Philippines"
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(CacheStore::in_memory().unwrap());
        let geocoder = geocoder(&server, store);

        let first = geocoder.resolve(15.48651, 120.96672).await;
        let second = geocoder.resolve(15.48649, 120.96668).await;
        assert_eq!(first.name, "Cabanatuan, Central Luzon, Philippines");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_resolve_failure_falls_back_without_caching() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        let store = Arc::new(CacheStore::in_memory().unwrap());
        let geocoder = geocoder(&server, store.clone());

        let place = geocoder.resolve(15.7934, 120.992).await;
        assert_eq!(place.name, "Location (15.7934, 120.9920)");
        assert_eq!(place.country, "Philippines");
        assert!(!store.contains(CacheCategory::Geocode, "15.7934,120.9920"));

        geocoder.resolve(15.7934, 120.992).await;
    }
}
