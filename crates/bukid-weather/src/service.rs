//! Weather service facade.
//!
//! One instance owns the cache store, location registry, geocoder, provider
//! client, and location service. Callers share it behind an `Arc`.

use bukid_core::WeatherConfig;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheCategory, CacheStore};
use crate::clock::Clock;
use crate::error::WeatherError;
use crate::geo::{coarse_key, validate_coordinates};
use crate::geocode::ReverseGeocoder;
use crate::location::{Geolocator, LocationService};
use crate::provider::WeatherProvider;
use crate::registry::LocationRegistry;
use crate::types::{ForecastSeries, LocationRecord, LocationRef, WeatherSnapshot};

pub struct WeatherService {
    pub(crate) settings: WeatherConfig,
    pub(crate) store: Arc<CacheStore>,
    pub(crate) registry: LocationRegistry,
    pub(crate) geocoder: ReverseGeocoder,
    pub(crate) provider: WeatherProvider,
    pub(crate) locator: LocationService,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) rng: Mutex<StdRng>,
}

impl WeatherService {
    /// Build the service. The store's clock drives all freshness checks.
    pub fn new(
        config: &WeatherConfig,
        store: Arc<CacheStore>,
        geolocator: Arc<dyn Geolocator>,
    ) -> Result<Self, WeatherError> {
        let clock = store.clock();
        let request_timeout = Duration::from_secs(config.request_timeout_secs);

        let defaults: Vec<LocationRef> = config
            .default_locations
            .iter()
            .map(|seed| LocationRef::from_seed(seed, &config.home_country, &config.default_timezone))
            .collect();

        let registry = LocationRegistry::open(store.clone(), defaults);
        let geocoder = ReverseGeocoder::new(
            &config.geocoder_url,
            request_timeout,
            &config.home_country,
            store.clone(),
        )?;
        let provider = WeatherProvider::new(&config.provider_url, request_timeout)?;
        let locator = LocationService::new(
            geolocator,
            store.clone(),
            Duration::from_secs(config.geolocation_timeout_secs),
        );

        tracing::info!(
            "Weather service ready with {} default locations",
            registry.defaults().len()
        );

        Ok(Self {
            settings: config.clone(),
            store,
            registry,
            geocoder,
            provider,
            locator,
            clock,
            rng: Mutex::new(StdRng::from_os_rng()),
        })
    }

    /// Replace the RNG used for synthetic forecasts.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    pub fn settings(&self) -> &WeatherConfig {
        &self.settings
    }

    /// Current conditions for a coordinate. Never fails for valid
    /// coordinates: provider failures yield a synthetic snapshot.
    pub async fn get_weather_for_coordinates(
        &self,
        latitude: f64,
        longitude: f64,
        force_refresh: bool,
    ) -> Result<WeatherSnapshot, WeatherError> {
        self.fetch_weather(latitude, longitude, force_refresh).await
    }

    /// `days` contiguous daily forecasts starting today.
    pub async fn get_forecast_for_coordinates(
        &self,
        latitude: f64,
        longitude: f64,
        days: u32,
    ) -> Result<ForecastSeries, WeatherError> {
        self.fetch_forecast(latitude, longitude, days).await
    }

    /// Device location, or the best saved/default substitute.
    pub async fn get_current_location(&self, use_cache: bool) -> Result<LocationRecord, WeatherError> {
        self.acquire_location(use_cache).await
    }

    /// Saved locations, most recently used first.
    pub fn get_saved_locations_list(&self) -> Vec<LocationRecord> {
        self.registry.list()
    }

    /// Save a location, resolving its name unless one is given.
    pub async fn add_new_location(
        &self,
        latitude: f64,
        longitude: f64,
        name: Option<&str>,
    ) -> Result<LocationRecord, WeatherError> {
        validate_coordinates(latitude, longitude)?;

        let mut place = self.geocoder.resolve(latitude, longitude).await;
        if let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) {
            place.name = name.to_string();
        }

        let location = place.at(latitude, longitude, &self.settings.default_timezone);
        tracing::info!("Saving location '{}'", location.name);
        Ok(self
            .registry
            .upsert(LocationRecord::new(location, false, self.clock.now())))
    }

    /// Remove a saved location by its index in [`Self::get_saved_locations_list`].
    pub fn remove_location(&self, index: usize) -> bool {
        self.registry.remove(index)
    }

    /// True when a fresh weather snapshot is cached for the coordinate.
    pub fn has_cached_weather(&self, latitude: f64, longitude: f64) -> bool {
        self.store
            .contains(CacheCategory::Weather, &coarse_key(latitude, longitude))
    }

    pub fn default_locations(&self) -> &[LocationRef] {
        self.registry.defaults()
    }

    /// Record a successful fetch. A current-location record it merges
    /// into stays current.
    pub(crate) fn upsert_fetched(&self, location: &LocationRef) {
        self.registry.touch(LocationRecord::new(
            location.clone(),
            false,
            self.clock.now(),
        ));
    }
}
