//! Time-bounded in-memory cache.
//!
//! A generic expiring key/value store shared across concurrent dialogues to
//! shield slow or rate-limited upstream fetches. `get` never returns a value
//! whose age has reached its TTL; expired entries are evicted lazily on
//! access; there is no background sweep, acceptable at the expected low
//! write volume. Entries are immutable once inserted; a fresh `put` replaces
//! the entry wholesale, nothing mutates in place.
//!
//! Concurrency: the interior `std::sync::Mutex` guards only the map
//! operation itself and is never held across an await. Callers fetch from
//! the network outside the lock and write the result back under a briefly
//! re-acquired lock.
//!
//! The clock is `tokio::time::Instant`, so tests can pause and advance time.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.inserted_at) >= self.ttl
    }
}

/// A string-keyed expiring store. Keys are derived deterministically from
/// request parameters (e.g. `forecast:61.2181:-149.9003`, `alerts:AK`).
pub struct TtlCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Insert a value with the given TTL, replacing any existing entry.
    pub fn put(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        trace!(key = %key, ttl_secs = ttl.as_secs(), "Cache put");
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Return the value for `key` while it is younger than its TTL.
    /// An expired entry is evicted and `None` is returned.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        match entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                trace!(key = %key, "Cache hit");
                Some(entry.value.clone())
            }
            Some(_) => {
                trace!(key = %key, "Cache entry expired, evicting");
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Number of live (non-evicted) entries, including not-yet-evicted
    /// expired ones.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Deterministic cache key for a forecast request.
pub fn forecast_key(latitude: f64, longitude: f64) -> String {
    format!("forecast:{latitude}:{longitude}")
}

/// Deterministic cache key for an alerts request.
pub fn alerts_key(region: &str) -> String {
    format!("alerts:{region}")
}
