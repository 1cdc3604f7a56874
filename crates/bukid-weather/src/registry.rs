//! Bounded, recency-ordered list of known locations.
//!
//! Records closer than [`DEDUP_RADIUS_KM`] are the same place: inserting
//! a record absorbs every saved record that close to it. The list holds at most
//! [`MAX_SAVED_LOCATIONS`] records; eviction removes the least recently
//! used record that is not a default location. Defaults are exempt from
//! the cap, so a registry made only of defaults may exceed it.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::cache::{CacheCategory, CacheStore};
use crate::geo::{within_km, DEDUP_RADIUS_KM};
use crate::types::{LocationRecord, LocationRef};

pub const MAX_SAVED_LOCATIONS: usize = 10;

const REGISTRY_KEY: &str = "saved_locations";

pub struct LocationRegistry {
    store: Arc<CacheStore>,
    defaults: Vec<LocationRef>,
    records: Mutex<Vec<LocationRecord>>,
}

impl LocationRegistry {
    /// Load the saved list from the store.
    pub fn open(store: Arc<CacheStore>, defaults: Vec<LocationRef>) -> Self {
        let mut records: Vec<LocationRecord> = store
            .get(CacheCategory::Registry, REGISTRY_KEY)
            .unwrap_or_default();
        sort_by_recency(&mut records);

        tracing::debug!("Loaded {} saved locations", records.len());

        Self {
            store,
            defaults,
            records: Mutex::new(records),
        }
    }

    /// Insert a record, merging every saved record within 1 km into it.
    ///
    /// Returns the record as stored.
    pub fn upsert(&self, record: LocationRecord) -> LocationRecord {
        self.merge(record, false)
    }

    /// Like [`Self::upsert`], but a merged current-location record stays
    /// current. Weather fetches record visits through this.
    pub fn touch(&self, record: LocationRecord) -> LocationRecord {
        self.merge(record, true)
    }

    fn merge(&self, mut record: LocationRecord, keep_current: bool) -> LocationRecord {
        let mut records = self.records.lock();

        let before = records.len();
        let mut was_current = false;
        records.retain(|r| {
            let same = within_km(
                r.latitude(),
                r.longitude(),
                record.latitude(),
                record.longitude(),
                DEDUP_RADIUS_KM,
            );
            was_current |= same && r.is_current_location;
            !same
        });

        let merged = before - records.len();
        if merged > 0 {
            tracing::debug!(
                "Merged {} saved location(s) into '{}'",
                merged,
                record.location.name
            );
        }
        if keep_current && was_current {
            record.is_current_location = true;
        }

        // Front first so a timestamp tie still ranks the newest touch highest
        records.insert(0, record.clone());
        sort_by_recency(&mut records);
        self.evict_overflow(&mut records);
        self.persist(&records);

        record
    }

    /// Saved locations, most recently used first.
    pub fn list(&self) -> Vec<LocationRecord> {
        self.records.lock().clone()
    }

    pub fn most_recent(&self) -> Option<LocationRecord> {
        self.records.lock().first().cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Remove the record at `index` in `list()` order.
    ///
    /// Returns false (and changes nothing) when the index is out of range
    /// or the record sits on a default location.
    pub fn remove(&self, index: usize) -> bool {
        let mut records = self.records.lock();

        let Some(record) = records.get(index) else {
            tracing::debug!("Ignoring removal of missing location index {}", index);
            return false;
        };

        if self.is_default(record.latitude(), record.longitude()) {
            tracing::info!("Refusing to remove default location '{}'", record.location.name);
            return false;
        }

        let removed = records.remove(index);
        tracing::info!("Removed saved location '{}'", removed.location.name);
        self.persist(&records);
        true
    }

    /// True when the point lies within 1 km of a default location.
    pub fn is_default(&self, latitude: f64, longitude: f64) -> bool {
        self.defaults.iter().any(|d| {
            within_km(d.latitude, d.longitude, latitude, longitude, DEDUP_RADIUS_KM)
        })
    }

    /// Compiled-in default locations, in configured order.
    pub fn defaults(&self) -> &[LocationRef] {
        &self.defaults
    }

    fn evict_overflow(&self, records: &mut Vec<LocationRecord>) {
        while records.len() > MAX_SAVED_LOCATIONS {
            let oldest_evictable = records
                .iter()
                .rposition(|r| !self.is_default(r.latitude(), r.longitude()));

            match oldest_evictable {
                Some(index) => {
                    let evicted = records.remove(index);
                    tracing::info!("Evicted saved location '{}'", evicted.location.name);
                }
                None => break,
            }
        }
    }

    fn persist(&self, records: &[LocationRecord]) {
        if let Err(e) = self.store.put(CacheCategory::Registry, REGISTRY_KEY, &records) {
            tracing::warn!("Failed to persist saved locations: {}", e);
        }
    }
}

/// Stable sort, newest first.
fn sort_by_recency(records: &mut [LocationRecord]) {
    records.sort_by(|a, b| b.last_used.cmp(&a.last_used));
}
