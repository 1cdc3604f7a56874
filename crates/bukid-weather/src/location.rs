//! Device location: hardware geolocation with a short-lived fix cache,
//! falling back to saved and default locations.

use chrono::Duration;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::cache::{CacheCategory, CacheStore};
use crate::clock::Clock;
use crate::error::{LocationError, WeatherError};
use crate::geo::validate_coordinates;
use crate::service::WeatherService;
use crate::types::{GeoFix, LocationRecord};

/// A fix (or a current-location record) younger than this is reused
pub const FIX_MAX_AGE_SECS: i64 = 5 * 60;

const LAST_FIX_KEY: &str = "last_fix";

pub type LocateFuture<'a> = Pin<Box<dyn Future<Output = Result<GeoFix, LocationError>> + Send + 'a>>;

/// Source of hardware position fixes.
pub trait Geolocator: Send + Sync {
    fn locate(&self) -> LocateFuture<'_>;
}

/// Platform geolocation: GeoClue2 on Linux, WinRT on Windows.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemGeolocator;

impl Geolocator for SystemGeolocator {
    fn locate(&self) -> LocateFuture<'_> {
        Box::pin(platform::locate())
    }
}

#[cfg(target_os = "linux")]
mod platform {
    use chrono::Utc;
    use std::time::Duration;
    use zbus::proxy::CacheProperties;
    use zbus::zvariant::OwnedObjectPath;

    use crate::error::LocationError;
    use crate::types::GeoFix;

    const DESKTOP_ID: &str = "bukid";

    /// GClueAccuracyLevel::Exact
    const ACCURACY_EXACT: u32 = 8;

    const POLL_INTERVAL: Duration = Duration::from_millis(250);

    #[zbus::proxy(
        interface = "org.freedesktop.GeoClue2.Manager",
        default_service = "org.freedesktop.GeoClue2",
        default_path = "/org/freedesktop/GeoClue2/Manager",
        gen_blocking = false
    )]
    trait Manager {
        fn get_client(&self) -> zbus::Result<OwnedObjectPath>;
    }

    #[zbus::proxy(
        interface = "org.freedesktop.GeoClue2.Client",
        default_service = "org.freedesktop.GeoClue2",
        gen_blocking = false
    )]
    trait Client {
        fn start(&self) -> zbus::Result<()>;
        fn stop(&self) -> zbus::Result<()>;

        #[zbus(property)]
        fn location(&self) -> zbus::Result<OwnedObjectPath>;

        #[zbus(property)]
        fn set_desktop_id(&self, id: &str) -> zbus::Result<()>;

        #[zbus(property)]
        fn set_requested_accuracy_level(&self, level: u32) -> zbus::Result<()>;
    }

    #[zbus::proxy(
        interface = "org.freedesktop.GeoClue2.Location",
        default_service = "org.freedesktop.GeoClue2",
        gen_blocking = false
    )]
    trait Location {
        #[zbus(property)]
        fn latitude(&self) -> zbus::Result<f64>;

        #[zbus(property)]
        fn longitude(&self) -> zbus::Result<f64>;

        #[zbus(property)]
        fn accuracy(&self) -> zbus::Result<f64>;
    }

    fn map_dbus_error(err: zbus::Error) -> LocationError {
        let message = err.to_string();
        if message.contains("AccessDenied") || message.contains("not allowed") {
            LocationError::PermissionDenied
        } else if matches!(err, zbus::Error::InputOutput(_) | zbus::Error::Address(_)) {
            LocationError::ServiceUnavailable
        } else {
            LocationError::Other(message)
        }
    }

    pub(super) async fn locate() -> Result<GeoFix, LocationError> {
        query().await.map_err(map_dbus_error)
    }

    async fn query() -> zbus::Result<GeoFix> {
        let conn = zbus::Connection::system().await?;
        let manager = ManagerProxy::new(&conn).await?;
        let client_path = manager.get_client().await?;

        let client = ClientProxy::builder(&conn)
            .path(client_path)?
            .cache_properties(CacheProperties::No)
            .build()
            .await?;
        client.set_desktop_id(DESKTOP_ID).await?;
        client.set_requested_accuracy_level(ACCURACY_EXACT).await?;
        client.start().await?;

        // Location stays "/" until the first fix arrives; the caller bounds the wait
        let location_path = loop {
            let path = client.location().await?;
            if path.as_str() != "/" {
                break path;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        };

        let location = LocationProxy::builder(&conn)
            .path(location_path)?
            .cache_properties(CacheProperties::No)
            .build()
            .await?;
        let fix = GeoFix {
            latitude: location.latitude().await?,
            longitude: location.longitude().await?,
            accuracy_meters: location.accuracy().await.ok(),
            acquired_at: Utc::now(),
        };

        if let Err(e) = client.stop().await {
            tracing::debug!("GeoClue client stop failed: {}", e);
        }

        Ok(fix)
    }
}

#[cfg(windows)]
mod platform {
    use chrono::Utc;
    use windows::Devices::Geolocation::Geolocator;

    use crate::error::LocationError;
    use crate::types::GeoFix;

    /// HRESULT for E_ACCESSDENIED
    const E_ACCESSDENIED: i32 = 0x8007_0005_u32 as i32;

    fn map_win_error(err: windows::core::Error) -> LocationError {
        if err.code().0 == E_ACCESSDENIED {
            LocationError::PermissionDenied
        } else {
            LocationError::Other(err.message().to_string())
        }
    }

    fn query() -> windows::core::Result<GeoFix> {
        let locator = Geolocator::new()?;
        let position = locator.GetGeopositionAsync()?.get()?;
        let coordinate = position.Coordinate()?;
        let point = coordinate.Point()?.Position()?;

        Ok(GeoFix {
            latitude: point.Latitude,
            longitude: point.Longitude,
            accuracy_meters: coordinate.Accuracy().ok(),
            acquired_at: Utc::now(),
        })
    }

    pub(super) async fn locate() -> Result<GeoFix, LocationError> {
        tokio::task::spawn_blocking(|| query().map_err(map_win_error))
            .await
            .map_err(|e| LocationError::Other(e.to_string()))?
    }
}

#[cfg(not(any(target_os = "linux", windows)))]
mod platform {
    use crate::error::LocationError;
    use crate::types::GeoFix;

    pub(super) async fn locate() -> Result<GeoFix, LocationError> {
        Err(LocationError::ServiceUnavailable)
    }
}

/// Wraps a [`Geolocator`] with a last-fix cache and a timeout.
///
/// The last fix lives in the store's location category, so a restart
/// within five minutes reuses it.
pub struct LocationService {
    geolocator: Arc<dyn Geolocator>,
    store: Arc<CacheStore>,
    clock: Arc<dyn Clock>,
    timeout: std::time::Duration,
}

impl LocationService {
    pub fn new(
        geolocator: Arc<dyn Geolocator>,
        store: Arc<CacheStore>,
        timeout: std::time::Duration,
    ) -> Self {
        Self {
            geolocator,
            clock: store.clock(),
            store,
            timeout,
        }
    }

    /// A fix no older than five minutes, querying hardware if needed.
    pub async fn current_fix(&self) -> Result<GeoFix, LocationError> {
        let now = self.clock.now();
        if let Some(fix) = self.store.get::<GeoFix>(CacheCategory::Location, LAST_FIX_KEY) {
            if now - fix.acquired_at < Duration::seconds(FIX_MAX_AGE_SECS) {
                tracing::debug!("Reusing location fix from {}", fix.acquired_at);
                return Ok(fix);
            }
        }

        let fix = match tokio::time::timeout(self.timeout, self.geolocator.locate()).await {
            Ok(result) => result?,
            Err(_) => return Err(LocationError::Timeout),
        };

        if validate_coordinates(fix.latitude, fix.longitude).is_err() {
            return Err(LocationError::Other(format!(
                "fix out of range: ({}, {})",
                fix.latitude, fix.longitude
            )));
        }

        // Age is measured on our clock, not the platform's
        let fix = GeoFix {
            acquired_at: now,
            ..fix
        };
        if let Err(e) = self.store.put(CacheCategory::Location, LAST_FIX_KEY, &fix) {
            tracing::warn!("Failed to cache location fix: {}", e);
        }
        Ok(fix)
    }
}

impl WeatherService {
    /// Best available location for the device. Fails only with
    /// [`WeatherError::Exhausted`] when nothing at all is known.
    pub(crate) async fn acquire_location(
        &self,
        use_cache: bool,
    ) -> Result<LocationRecord, WeatherError> {
        let now = self.clock.now();

        if use_cache {
            if let Some(recent) = self.registry.most_recent() {
                if recent.is_current_location
                    && now - recent.last_used < Duration::seconds(FIX_MAX_AGE_SECS)
                {
                    return Ok(recent);
                }
            }
        }

        match self.locator.current_fix().await {
            Ok(fix) => {
                let place = self.geocoder.resolve(fix.latitude, fix.longitude).await;
                let location = place.at(fix.latitude, fix.longitude, &self.settings.default_timezone);
                tracing::info!("Device location: {}", location.name);
                return Ok(self.registry.upsert(LocationRecord::new(location, true, now)));
            }
            Err(e) => tracing::warn!("Hardware location unavailable: {}", e),
        }

        if let Some(mut recent) = self.registry.most_recent() {
            tracing::info!("Falling back to saved location '{}'", recent.location.name);
            recent.is_current_location = false;
            return Ok(recent);
        }

        match self.registry.defaults().first() {
            Some(default) => {
                tracing::info!("Falling back to default location '{}'", default.name);
                Ok(LocationRecord::new(default.clone(), false, now))
            }
            None => Err(WeatherError::Exhausted),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingGeolocator {
        calls: AtomicUsize,
        result: Option<(f64, f64)>,
    }

    impl Geolocator for CountingGeolocator {
        fn locate(&self) -> LocateFuture<'_> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let result = self.result;
            Box::pin(async move {
                match result {
                    Some((latitude, longitude)) => Ok(GeoFix {
                        latitude,
                        longitude,
                        accuracy_meters: Some(20.0),
                        acquired_at: Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap(),
                    }),
                    None => Err(LocationError::ServiceUnavailable),
                }
            })
        }
    }

    struct HangingGeolocator;

    impl Geolocator for HangingGeolocator {
        fn locate(&self) -> LocateFuture<'_> {
            Box::pin(std::future::pending())
        }
    }

    const TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

    fn setup() -> (Arc<ManualClock>, Arc<CacheStore>) {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 7, 1, 6, 0, 0).unwrap()));
        let store = Arc::new(CacheStore::in_memory().unwrap().with_clock(clock.clone()));
        (clock, store)
    }

    fn counting(result: Option<(f64, f64)>) -> Arc<CountingGeolocator> {
        Arc::new(CountingGeolocator {
            calls: AtomicUsize::new(0),
            result,
        })
    }

    #[tokio::test]
    async fn test_fix_is_reused_within_five_minutes() {
        let (clock, store) = setup();
        let locator = counting(Some((15.79, 120.99)));
        let service = LocationService::new(locator.clone(), store, TIMEOUT);

        let first = service.current_fix().await.unwrap();
        assert_eq!(first.acquired_at, clock.now());

        clock.advance(Duration::minutes(4));
        service.current_fix().await.unwrap();
        assert_eq!(locator.calls.load(Ordering::SeqCst), 1);

        clock.advance(Duration::minutes(2));
        service.current_fix().await.unwrap();
        assert_eq!(locator.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fix_is_shared_through_the_store() {
        let (clock, store) = setup();
        let locator = counting(Some((15.79, 120.99)));

        let fix = LocationService::new(locator.clone(), store.clone(), TIMEOUT)
            .current_fix()
            .await
            .unwrap();
        assert!(store.contains(CacheCategory::Location, LAST_FIX_KEY));

        clock.advance(Duration::minutes(1));
        let reopened = LocationService::new(locator.clone(), store, TIMEOUT);
        assert_eq!(reopened.current_fix().await.unwrap().acquired_at, fix.acquired_at);
        assert_eq!(locator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let (_clock, store) = setup();
        let locator = counting(None);
        let service = LocationService::new(locator.clone(), store.clone(), TIMEOUT);

        assert!(matches!(
            service.current_fix().await,
            Err(LocationError::ServiceUnavailable)
        ));
        assert!(service.current_fix().await.is_err());
        assert_eq!(locator.calls.load(Ordering::SeqCst), 2);
        assert!(!store.contains(CacheCategory::Location, LAST_FIX_KEY));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_geolocator_times_out() {
        let (_clock, store) = setup();
        let service = LocationService::new(Arc::new(HangingGeolocator), store, TIMEOUT);
        assert!(matches!(
            service.current_fix().await,
            Err(LocationError::Timeout)
        ));
    }

    #[tokio::test]
    async fn test_out_of_range_fix_is_rejected() {
        let (_clock, store) = setup();
        let service = LocationService::new(counting(Some((123.0, 0.0))), store, TIMEOUT);
        assert!(matches!(
            service.current_fix().await,
            Err(LocationError::Other(_))
        ));
    }
}
