use std::collections::HashMap;
use std::sync::Arc;

use checkpoint_shared::colors::normalize_name;
use checkpoint_shared::{Coordinate, Ring};
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Outcome of one resolution attempt. `Unresolved` stops retries for that key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution {
    Resolved(Coordinate),
    Unresolved,
}

impl Resolution {
    pub fn coordinate(self) -> Option<Coordinate> {
        match self {
            Resolution::Resolved(coordinate) => Some(coordinate),
            Resolution::Unresolved => None,
        }
    }
}

/// Process-lifetime coordinate cache. Entries are never evicted: the set of
/// distinct location names is small and bounded.
#[derive(Debug, Default)]
pub struct ResolutionCache {
    entries: DashMap<String, Resolution>,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Resolution> {
        self.entries.get(key).map(|entry| *entry)
    }

    pub fn insert(&self, key: String, resolution: Resolution) {
        self.entries.insert(key, resolution);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Location keys with a stored outcome, resolved or not.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

/// A fetched outline, or the knowledge that none exists.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundaryEntry {
    Ring(Ring),
    Missing,
}

#[derive(Debug, Default)]
pub struct BoundaryCache {
    entries: DashMap<String, BoundaryEntry>,
}

impl BoundaryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<BoundaryEntry> {
        self.entries.get(key).map(|entry| entry.clone())
    }

    pub fn insert(&self, key: String, entry: BoundaryEntry) {
        self.entries.insert(key, entry);
    }
}

pub fn city_key(city: &str, state: &str) -> String {
    format!("city:{}:{}", normalize_name(city), normalize_name(state))
}

pub fn county_key(county: &str, state: &str) -> String {
    format!("county:{}:{}", normalize_name(county), normalize_name(state))
}

pub fn boundary_key(city: &str, state: &str) -> String {
    format!("{}-{}", normalize_name(city), normalize_name(state))
}

/// Per-key async locks so concurrent callers for one key share a single upstream call.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    inflight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut inflight = self.inflight.lock().await;
            Arc::clone(
                inflight
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use checkpoint_shared::Coordinate;

    use super::{
        BoundaryCache, BoundaryEntry, KeyedLocks, Resolution, ResolutionCache, boundary_key,
        city_key, county_key,
    };

    #[test]
    fn keys_are_normalized() {
        assert_eq!(city_key(" Fresno ", "CA"), "city:fresno:ca");
        assert_eq!(county_key("ALAMEDA", " ca"), "county:alameda:ca");
        assert_eq!(boundary_key("Union City ", "California"), "union city-california");
    }

    #[test]
    fn unresolved_sentinel_is_a_cache_hit() {
        let cache = ResolutionCache::new();
        let key = city_key("Nowhere", "CA");
        assert!(!cache.contains(&key));

        cache.insert(key.clone(), Resolution::Unresolved);
        assert!(cache.contains(&key));
        assert_eq!(cache.get(&key), Some(Resolution::Unresolved));
        assert_eq!(cache.get(&key).and_then(Resolution::coordinate), None);

        let resolved = Coordinate::new(1.0, 2.0);
        cache.insert(key.clone(), Resolution::Resolved(resolved));
        assert_eq!(cache.get(&key).and_then(Resolution::coordinate), Some(resolved));
        assert_eq!(cache.entry_count(), 1);
    }

    #[test]
    fn missing_boundary_is_distinct_from_not_attempted() {
        let cache = BoundaryCache::new();
        assert_eq!(cache.get("fresno-ca"), None);
        cache.insert("fresno-ca".to_string(), BoundaryEntry::Missing);
        assert_eq!(cache.get("fresno-ca"), Some(BoundaryEntry::Missing));
    }

    #[tokio::test(start_paused = true)]
    async fn keyed_locks_serialize_same_key_only() {
        let locks = Arc::new(KeyedLocks::new());
        let held = locks.acquire("a").await;

        // A different key is free immediately.
        let other = tokio::time::timeout(Duration::from_millis(10), locks.acquire("b")).await;
        assert!(other.is_ok());

        // The same key waits for the holder.
        let waiter = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.acquire("a").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        drop(held);
        waiter.await.expect("waiter should finish once the lock is released");
    }
}
