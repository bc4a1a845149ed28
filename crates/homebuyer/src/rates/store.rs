use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::domain::{CachedEntry, LocationKey, RateBundle};

/// Storage key of the single cached slot.
pub const CACHE_SLOT_KEY: &str = "homebuyer.rate_cache";

/// Local key-value persistence backing the cache slot.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String);
    fn remove(&self, key: &str);
}

/// Time source so TTL checks stay deterministic under test.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryKeyValueStore {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl KeyValueStore for InMemoryKeyValueStore {
    fn get(&self, key: &str) -> Option<String> {
        let guard = self.values.lock().expect("kv mutex poisoned");
        guard.get(key).cloned()
    }

    fn set(&self, key: &str, value: String) {
        let mut guard = self.values.lock().expect("kv mutex poisoned");
        guard.insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) {
        let mut guard = self.values.lock().expect("kv mutex poisoned");
        guard.remove(key);
    }
}

/// Single-slot cache holding the bundle for the most recently viewed location.
pub struct RateDataStore {
    kv: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl RateDataStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self { kv, clock, ttl }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the entry for `key`. A slot held by another location, an empty
    /// slot, and an unparseable slot all read as absent.
    pub fn read(&self, key: &LocationKey) -> Option<CachedEntry> {
        let entry = self.read_slot()?;
        if &entry.location_key == key {
            Some(entry)
        } else {
            debug!(cached = %entry.location_key.label(), requested = %key.label(), "cache slot holds another location");
            None
        }
    }

    /// Replace the slot, whatever location it previously held.
    pub fn write(&self, key: &LocationKey, bundle: &RateBundle) {
        let entry = CachedEntry {
            location_key: key.clone(),
            bundle: bundle.clone(),
            timestamp: self.clock.now(),
        };

        match serde_json::to_string(&entry) {
            Ok(serialized) => self.kv.set(CACHE_SLOT_KEY, serialized),
            Err(err) => warn!(error = %err, "unable to serialize rate cache entry"),
        }
    }

    pub fn is_fresh(&self, entry: &CachedEntry, current: &LocationKey, now: DateTime<Utc>) -> bool {
        if &entry.location_key != current {
            return false;
        }

        match now.signed_duration_since(entry.timestamp).to_std() {
            Ok(age) => age < self.ttl,
            // Timestamp in the future; treat as just written.
            Err(_) => true,
        }
    }

    pub fn invalidate(&self) {
        self.kv.remove(CACHE_SLOT_KEY);
    }

    /// Clear the slot only when it belongs to a location other than `key`.
    pub fn invalidate_other(&self, key: &LocationKey) {
        if let Some(entry) = self.read_slot() {
            if &entry.location_key != key {
                debug!(previous = %entry.location_key.label(), "invalidating cache for previous location");
                self.invalidate();
            }
        }
    }

    fn read_slot(&self) -> Option<CachedEntry> {
        let raw = self.kv.get(CACHE_SLOT_KEY)?;
        match serde_json::from_str::<CachedEntry>(&raw) {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(error = %err, "malformed rate cache entry; treating as miss");
                None
            }
        }
    }
}

impl std::fmt::Debug for RateDataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateDataStore")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
