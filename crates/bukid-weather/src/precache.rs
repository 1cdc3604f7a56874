//! Background warm-up of weather for the default locations.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::service::WeatherService;

/// Handle to a running pre-cache task.
pub struct PrecacheHandle {
    cancel: CancellationToken,
    task: JoinHandle<usize>,
}

impl PrecacheHandle {
    /// Stop before the next fetch. An in-flight fetch runs to completion.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the task; returns how many locations were fetched.
    pub async fn join(self) -> usize {
        match self.task.await {
            Ok(fetched) => fetched,
            Err(e) => {
                tracing::debug!("Pre-cache task ended abnormally: {}", e);
                0
            }
        }
    }
}

/// Spawn the pre-cache task on the current runtime.
///
/// Each default location without fresh weather is fetched after one
/// throttle interval, so fetches are at least one interval apart.
pub fn spawn(service: Arc<WeatherService>) -> PrecacheHandle {
    let cancel = CancellationToken::new();
    let interval = Duration::from_millis(service.settings().precache_interval_ms);
    let token = cancel.clone();

    let task = tokio::spawn(async move {
        let mut fetched = 0;
        let defaults = service.default_locations().to_vec();

        for location in defaults {
            if service.has_cached_weather(location.latitude, location.longitude) {
                tracing::debug!("Pre-cache skipping '{}': already cached", location.name);
                continue;
            }

            tokio::select! {
                _ = token.cancelled() => {
                    tracing::debug!("Pre-cache cancelled");
                    break;
                }
                _ = tokio::time::sleep(interval) => {}
            }

            match service
                .get_weather_for_coordinates(location.latitude, location.longitude, false)
                .await
            {
                Ok(_) => {
                    fetched += 1;
                    tracing::debug!("Pre-cached weather for '{}'", location.name);
                }
                Err(e) => tracing::debug!("Pre-cache failed for '{}': {}", location.name, e),
            }
        }

        tracing::info!("Pre-cache finished: {} locations fetched", fetched);
        fetched
    });

    PrecacheHandle { cancel, task }
}
