//! Two-layer TTL cache: an in-process map in front of a SQLite table.
//!
//! Entries are stored as JSON with the time they were written. Reads check
//! the fast layer first, fall through to SQLite, and treat expired or
//! unparseable entries as absent (deleting them on the way out).

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::error::WeatherError;

/// What kind of value a cache entry holds. Each category owns its TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheCategory {
    Weather,
    Forecast,
    Geocode,
    Location,
    /// The saved-location list; never expires
    Registry,
}

impl CacheCategory {
    pub const ALL: [CacheCategory; 5] = [
        Self::Weather,
        Self::Forecast,
        Self::Geocode,
        Self::Location,
        Self::Registry,
    ];

    /// Time-to-live, or `None` for entries that never expire
    pub fn ttl(&self) -> Option<Duration> {
        match self {
            Self::Weather => Some(Duration::hours(1)),
            Self::Forecast => Some(Duration::hours(6)),
            Self::Geocode | Self::Location => Some(Duration::days(7)),
            Self::Registry => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weather => "weather",
            Self::Forecast => "forecast",
            Self::Geocode => "geocode",
            Self::Location => "location",
            Self::Registry => "registry",
        }
    }
}

/// A value together with the time it was stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub value: T,
    pub stored_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    pub fn new(value: T, stored_at: DateTime<Utc>) -> Self {
        Self { value, stored_at }
    }

    /// Valid iff `now - stored_at < ttl`
    pub fn is_fresh(&self, ttl: Option<Duration>, now: DateTime<Utc>) -> bool {
        match ttl {
            Some(ttl) => now - self.stored_at < ttl,
            None => true,
        }
    }
}

type MemoryKey = (CacheCategory, String);

/// Weather engine cache store. One instance per process, shared via `Arc`.
pub struct CacheStore {
    conn: Mutex<Connection>,
    memory: Mutex<HashMap<MemoryKey, CacheEntry<String>>>,
    clock: Arc<dyn Clock>,
}

impl CacheStore {
    /// Open (or create) the cache database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, WeatherError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Create a store backed by an in-memory database.
    pub fn in_memory() -> Result<Self, WeatherError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, WeatherError> {
        let store = Self {
            conn: Mutex::new(conn),
            memory: Mutex::new(HashMap::new()),
            clock: Arc::new(SystemClock),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Replace the time source (tests use a `ManualClock`).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The time source every TTL check uses
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Initialize the database schema.
    fn init_schema(&self) -> Result<(), WeatherError> {
        self.conn.lock().execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                category TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                stored_at INTEGER NOT NULL,
                PRIMARY KEY (category, key)
            );

            CREATE INDEX IF NOT EXISTS idx_cache_entries_stored ON cache_entries(stored_at);
            "#,
        )?;
        Ok(())
    }

    /// Store a value in both layers, stamped with the current time.
    pub fn put<T: Serialize>(
        &self,
        category: CacheCategory,
        key: &str,
        value: &T,
    ) -> Result<(), WeatherError> {
        let raw = serde_json::to_string(value)?;
        let stored_at = self.clock.now();

        self.conn.lock().execute(
            r#"
            INSERT OR REPLACE INTO cache_entries (category, key, value, stored_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![category.as_str(), key, raw, stored_at.timestamp_millis()],
        )?;

        self.memory
            .lock()
            .insert((category, key.to_string()), CacheEntry::new(raw, stored_at));

        tracing::debug!("Cached {}:{}", category.as_str(), key);
        Ok(())
    }

    /// Fetch a value if a fresh entry exists.
    ///
    /// Expired and corrupted entries are purged and reported as absent.
    pub fn get<T: DeserializeOwned>(&self, category: CacheCategory, key: &str) -> Option<T> {
        self.get_entry(category, key).map(|entry| entry.value)
    }

    /// Like `get`, but also returns when the entry was stored.
    pub fn get_entry<T: DeserializeOwned>(
        &self,
        category: CacheCategory,
        key: &str,
    ) -> Option<CacheEntry<T>> {
        let now = self.clock.now();
        let ttl = category.ttl();
        let memory_key = (category, key.to_string());

        let cached = self.memory.lock().get(&memory_key).cloned();
        if let Some(entry) = cached {
            if !entry.is_fresh(ttl, now) {
                tracing::debug!("Cache entry expired: {}:{}", category.as_str(), key);
                self.remove(category, key);
                return None;
            }
            return match serde_json::from_str(&entry.value) {
                Ok(value) => Some(CacheEntry::new(value, entry.stored_at)),
                Err(e) => {
                    tracing::warn!(
                        "Dropping unreadable cache entry {}:{}: {}",
                        category.as_str(),
                        key,
                        e
                    );
                    self.remove(category, key);
                    None
                }
            };
        }

        let row = match self.read_durable(category, key) {
            Ok(row) => row,
            Err(e) => {
                tracing::warn!("Cache read failed for {}:{}: {}", category.as_str(), key, e);
                return None;
            }
        };
        let (raw, stored_ms) = row?;

        let Some(stored_at) = DateTime::from_timestamp_millis(stored_ms) else {
            tracing::warn!("Dropping cache entry with bad timestamp {}:{}", category.as_str(), key);
            self.remove(category, key);
            return None;
        };

        let entry = CacheEntry::new(raw, stored_at);
        if !entry.is_fresh(ttl, now) {
            tracing::debug!("Cache entry expired: {}:{}", category.as_str(), key);
            self.remove(category, key);
            return None;
        }

        match serde_json::from_str(&entry.value) {
            Ok(value) => {
                self.memory.lock().insert(memory_key, entry);
                Some(CacheEntry::new(value, stored_at))
            }
            Err(e) => {
                tracing::warn!(
                    "Dropping corrupted cache entry {}:{}: {}",
                    category.as_str(),
                    key,
                    e
                );
                self.remove(category, key);
                None
            }
        }
    }

    /// True when a fresh entry exists, whatever its type.
    pub fn contains(&self, category: CacheCategory, key: &str) -> bool {
        self.get::<serde_json::Value>(category, key).is_some()
    }

    /// Delete an entry from both layers. Failures are logged.
    pub fn remove(&self, category: CacheCategory, key: &str) {
        self.memory.lock().remove(&(category, key.to_string()));

        if let Err(e) = self.conn.lock().execute(
            "DELETE FROM cache_entries WHERE category = ?1 AND key = ?2",
            params![category.as_str(), key],
        ) {
            tracing::warn!("Failed to delete cache entry {}:{}: {}", category.as_str(), key, e);
        }
    }

    /// Delete every entry in a category.
    pub fn clear_category(&self, category: CacheCategory) -> Result<(), WeatherError> {
        self.memory.lock().retain(|(c, _), _| *c != category);
        self.conn.lock().execute(
            "DELETE FROM cache_entries WHERE category = ?1",
            params![category.as_str()],
        )?;
        Ok(())
    }

    /// Sweep expired entries out of the durable layer. Returns how many were removed.
    pub fn purge_expired(&self) -> Result<usize, WeatherError> {
        let now = self.clock.now();
        let mut removed = 0;

        {
            let conn = self.conn.lock();
            for category in CacheCategory::ALL {
                if let Some(ttl) = category.ttl() {
                    let cutoff = (now - ttl).timestamp_millis();
                    removed += conn.execute(
                        "DELETE FROM cache_entries WHERE category = ?1 AND stored_at <= ?2",
                        params![category.as_str(), cutoff],
                    )?;
                }
            }
        }

        self.memory
            .lock()
            .retain(|(category, _), entry| entry.is_fresh(category.ttl(), now));

        if removed > 0 {
            tracing::info!("Purged {} expired cache entries", removed);
        }
        Ok(removed)
    }

    /// Drop the in-process layer so the next read goes to SQLite.
    pub fn clear_memory(&self) {
        self.memory.lock().clear();
    }

    fn read_durable(
        &self,
        category: CacheCategory,
        key: &str,
    ) -> Result<Option<(String, i64)>, rusqlite::Error> {
        self.conn
            .lock()
            .query_row(
                "SELECT value, stored_at FROM cache_entries WHERE category = ?1 AND key = ?2",
                params![category.as_str(), key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
    }

    #[cfg(test)]
    fn write_raw(&self, category: CacheCategory, key: &str, raw: &str, stored_ms: i64) {
        self.conn
            .lock()
            .execute(
                "INSERT OR REPLACE INTO cache_entries (category, key, value, stored_at) VALUES (?1, ?2, ?3, ?4)",
                params![category.as_str(), key, raw, stored_ms],
            )
            .unwrap_or_default();
    }

    #[cfg(test)]
    fn durable_count(&self) -> i64 {
        self.conn
            .lock()
            .query_row("SELECT COUNT(*) FROM cache_entries", [], |row| row.get(0))
            .unwrap_or(-1)
    }
}
