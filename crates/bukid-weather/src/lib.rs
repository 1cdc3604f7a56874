//! Weather engine for Bukid
//!
//! Current conditions and daily forecasts from Open-Meteo, reverse
//! geocoding via Nominatim, and hardware location, all behind a two-layer
//! TTL cache with synthetic fallbacks when the network is unavailable.

pub mod advisory;
pub mod cache;
pub mod clock;
pub mod derive;
pub mod error;
pub mod forecast;
pub mod geo;
pub mod geocode;
pub mod location;
pub mod precache;
pub mod provider;
pub mod registry;
pub mod service;
pub mod synthetic;
pub mod types;
mod weather;

pub use advisory::{farm_recommendations, ActivityStatus, ColorScheme, FarmAdvisory};
pub use cache::{CacheCategory, CacheStore};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{LocationError, WeatherError};
pub use location::{Geolocator, LocateFuture, LocationService, SystemGeolocator};
pub use precache::PrecacheHandle;
pub use registry::{LocationRegistry, MAX_SAVED_LOCATIONS};
pub use service::WeatherService;
pub use types::*;
