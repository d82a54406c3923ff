//! Bounded, time-expiring rating cache over a key-value store
//!
//! The whole cache is one JSON object persisted under a single storage key:
//! `{ "<normalized name>": { "data": RatingResult, "storedAt": <epoch ms> }, ... }`.
//! Expired and malformed entries are pruned whenever the map is read, and the map
//! is trimmed to its capacity on every write, newest entries first.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use super::store::{KeyValueStore, StoreError};
use crate::config::ResolverConfig;
use crate::data::RatingResult;
use crate::normalize::normalize;

/// One persisted rating
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    data: RatingResult,
    #[serde(rename = "storedAt")]
    stored_at: i64,
}

/// The live part of the persisted map plus whether anything had to be dropped
struct LoadedMap {
    entries: Vec<(String, CacheEntry)>,
    pruned: bool,
}

/// Persistent rating cache with TTL expiry and capacity-bounded eviction
///
/// Clones share the same store and the same write lock.
#[derive(Clone)]
pub struct RatingCache {
    store: Arc<dyn KeyValueStore>,
    storage_key: String,
    ttl: Duration,
    max_entries: usize,
    /// Serializes read-modify-write cycles on the shared map
    lock: Arc<Mutex<()>>,
}

impl RatingCache {
    /// Creates a cache with explicit limits
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        storage_key: impl Into<String>,
        ttl: Duration,
        max_entries: usize,
    ) -> Self {
        Self {
            store,
            storage_key: storage_key.into(),
            ttl,
            max_entries,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Creates a cache using the limits from a resolver configuration
    pub fn from_config(store: Arc<dyn KeyValueStore>, config: &ResolverConfig) -> Self {
        Self::new(
            store,
            config.storage_key.clone(),
            config.cache_ttl,
            config.max_cache_entries,
        )
    }

    /// Looks up a fresh rating for `name`
    ///
    /// Expired or malformed entries are dropped and, if any were found, the pruned
    /// map is written back.
    ///
    /// # Returns
    /// * `Some(RatingResult)` if a non-expired entry exists for the normalized name
    /// * `None` on a miss, including when the store cannot be read
    pub async fn get(&self, name: &str) -> Option<RatingResult> {
        let key = normalize(name);
        let _guard = self.lock.lock().await;

        let loaded = match self.load(now_millis()).await {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!("Failed to read rating cache: {}", e);
                return None;
            }
        };
        let hit = loaded
            .entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, entry)| entry.data.clone());

        if loaded.pruned {
            self.persist(loaded.entries).await;
        }

        match &hit {
            Some(_) => debug!("Rating cache hit for '{}'", key),
            None => debug!("Rating cache miss for '{}'", key),
        }
        hit
    }

    /// Stores a rating for `name`, evicting the oldest entries beyond capacity
    ///
    /// Nothing is written when the current map cannot be read, so a failed read
    /// never replaces the persisted entries.
    pub async fn set(&self, name: &str, data: RatingResult) {
        let key = normalize(name);
        let _guard = self.lock.lock().await;

        let now = now_millis();
        let mut entries = match self.load(now).await {
            Ok(loaded) => loaded.entries,
            Err(e) => {
                warn!("Failed to read rating cache, not storing '{}': {}", key, e);
                return;
            }
        };
        entries.retain(|(k, _)| *k != key);
        entries.push((key.clone(), CacheEntry { data, stored_at: now }));

        // Newest first; the entry just written wins ties
        entries.sort_by(|(ka, a), (kb, b)| match b.stored_at.cmp(&a.stored_at) {
            Ordering::Equal => (*kb == key).cmp(&(*ka == key)),
            other => other,
        });
        if entries.len() > self.max_entries {
            debug!(
                "Evicting {} rating cache entries over capacity {}",
                entries.len() - self.max_entries,
                self.max_entries
            );
            entries.truncate(self.max_entries);
        }

        self.persist(entries).await;
    }

    /// Reads the persisted map, keeping only well-formed, unexpired entries
    ///
    /// An absent or malformed map reads as empty; only a failing store is an error.
    async fn load(&self, now: i64) -> Result<LoadedMap, StoreError> {
        let Some(raw) = self.store.get(&self.storage_key).await? else {
            return Ok(LoadedMap {
                entries: Vec::new(),
                pruned: false,
            });
        };

        let Value::Object(map) = raw else {
            debug!("Discarding rating cache that is not a JSON object");
            return Ok(LoadedMap {
                entries: Vec::new(),
                pruned: true,
            });
        };

        let ttl_ms = i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX);
        let total = map.len();
        let entries: Vec<(String, CacheEntry)> = map
            .into_iter()
            .filter_map(|(key, value)| {
                let entry = parse_entry(value)?;
                (now.saturating_sub(entry.stored_at) < ttl_ms).then_some((key, entry))
            })
            .collect();

        let pruned = entries.len() != total;
        if pruned {
            debug!(
                "Pruned {} expired or malformed rating cache entries",
                total - entries.len()
            );
        }
        Ok(LoadedMap { entries, pruned })
    }

    async fn persist(&self, entries: Vec<(String, CacheEntry)>) {
        let mut map = Map::with_capacity(entries.len());
        for (key, entry) in entries {
            match serde_json::to_value(entry) {
                Ok(value) => {
                    map.insert(key, value);
                }
                Err(e) => warn!("Skipping unserializable cache entry '{}': {}", key, e),
            }
        }

        if let Err(e) = self.store.set(&self.storage_key, Value::Object(map)).await {
            warn!("Failed to write rating cache: {}", e);
        }
    }
}

/// Decodes one persisted entry; `None` if the timestamp or data is unusable
fn parse_entry(value: Value) -> Option<CacheEntry> {
    let Value::Object(mut fields) = value else {
        return None;
    };
    let stored_at = match fields.get("storedAt")? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?,
        _ => return None,
    };
    let data = serde_json::from_value(fields.remove("data")?).ok()?;
    Some(CacheEntry { data, stored_at })
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::MemoryStore;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    /// Memory store whose next `failing_reads` reads fail with an I/O error
    struct FlakyStore {
        inner: MemoryStore,
        failing_reads: AtomicUsize,
    }

    #[async_trait]
    impl KeyValueStore for FlakyStore {
        async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
            let fail = self
                .failing_reads
                .fetch_update(AtomicOrdering::SeqCst, AtomicOrdering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if fail {
                return Err(std::io::Error::new(std::io::ErrorKind::Other, "disk busy").into());
            }
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
            self.inner.set(key, value).await
        }
    }

    const KEY: &str = "vivinoRatingCache";
    const SIX_HOURS: Duration = Duration::from_secs(6 * 60 * 60);

    fn sample(name: &str) -> RatingResult {
        RatingResult::new(4.1, 55, name, "https://www.vivino.com/wines/999")
    }

    fn create_test_cache(max_entries: usize) -> (RatingCache, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let cache = RatingCache::new(store.clone(), KEY, SIX_HOURS, max_entries);
        (cache, store)
    }

    fn persisted(store: &MemoryStore) -> Map<String, Value> {
        match store.snapshot(KEY) {
            Some(Value::Object(map)) => map,
            other => panic!("Expected persisted object, got {:?}", other),
        }
    }

    fn entry_json(data: &RatingResult, stored_at: i64) -> Value {
        json!({ "data": data, "storedAt": stored_at })
    }

    #[tokio::test]
    async fn test_set_then_get_round_trips() {
        let (cache, _store) = create_test_cache(200);
        let value = sample("Cache Hit Wine");

        cache.set(" Cache Hit Wine ", value.clone()).await;

        assert_eq!(cache.get("cache hit wine").await, Some(value));
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let (cache, _store) = create_test_cache(200);
        assert!(cache.get("nothing here").await.is_none());
    }

    #[tokio::test]
    async fn test_set_overwrites_existing_key() {
        let (cache, store) = create_test_cache(200);
        cache.set("Wine", sample("first")).await;
        cache.set("WINE", sample("second")).await;

        assert_eq!(cache.get("wine").await, Some(sample("second")));
        assert_eq!(persisted(&store).len(), 1, "Only one entry per normalized key");
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss_and_is_cleared() {
        let (cache, store) = create_test_cache(200);
        let old = now_millis() - SIX_HOURS.as_millis() as i64 - 1000;
        store.insert(
            KEY,
            json!({ "stale wine": entry_json(&sample("Stale"), old) }),
        );

        assert!(cache.get("Stale Wine").await.is_none());
        assert!(
            persisted(&store).is_empty(),
            "Expired entry should be removed from the store"
        );
    }

    #[tokio::test]
    async fn test_entry_exactly_at_ttl_is_expired() {
        let store = Arc::new(MemoryStore::new());
        let cache = RatingCache::new(store.clone(), KEY, Duration::from_millis(0), 200);

        cache.set("instant", sample("Instant")).await;

        assert!(cache.get("instant").await.is_none(), "Zero TTL should never hit");
    }

    #[tokio::test]
    async fn test_set_prunes_expired_entries() {
        let (cache, store) = create_test_cache(200);
        let old = now_millis() - SIX_HOURS.as_millis() as i64;
        store.insert(KEY, json!({ "stale": entry_json(&sample("Stale"), old) }));

        cache.set("fresh", sample("Fresh")).await;

        let map = persisted(&store);
        assert!(map.contains_key("fresh"));
        assert!(!map.contains_key("stale"));
    }

    #[tokio::test]
    async fn test_malformed_entries_are_discarded_and_healed() {
        let (cache, store) = create_test_cache(200);
        let now = now_millis();
        store.insert(
            KEY,
            json!({
                "good": entry_json(&sample("Good"), now),
                "no timestamp": { "data": sample("A") },
                "string timestamp": { "data": sample("B"), "storedAt": "yesterday" },
                "bad data": { "data": [1, 2], "storedAt": now },
                "not an object": 42,
            }),
        );

        assert_eq!(cache.get("good").await, Some(sample("Good")));

        let map = persisted(&store);
        assert_eq!(map.len(), 1);
        assert!(map.contains_key("good"));
    }

    #[tokio::test]
    async fn test_failed_read_does_not_overwrite_entries() {
        let now = now_millis();
        let mut seeded = Map::new();
        for i in 0..5 {
            seeded.insert(format!("wine {}", i), entry_json(&sample("Seeded"), now));
        }
        let store = Arc::new(FlakyStore {
            inner: MemoryStore::with_value(KEY, Value::Object(seeded)),
            failing_reads: AtomicUsize::new(1),
        });
        let cache = RatingCache::new(store.clone(), KEY, SIX_HOURS, 200);

        cache.set("new wine", sample("Dropped")).await;
        assert_eq!(persisted(&store.inner).len(), 5, "Failed read must not wipe the map");
        assert!(cache.get("new wine").await.is_none());

        cache.set("new wine", sample("Stored")).await;
        assert_eq!(persisted(&store.inner).len(), 6);
        assert_eq!(cache.get("wine 0").await, Some(sample("Seeded")));
    }

    #[tokio::test]
    async fn test_failed_read_is_a_miss() {
        let store = Arc::new(FlakyStore {
            inner: MemoryStore::new(),
            failing_reads: AtomicUsize::new(1),
        });
        let cache = RatingCache::new(store.clone(), KEY, SIX_HOURS, 200);

        assert!(cache.get("anything").await.is_none());
        assert!(store.inner.snapshot(KEY).is_none(), "A failed read should not write");
    }

    #[tokio::test]
    async fn test_non_object_store_value_is_a_miss() {
        let store = Arc::new(MemoryStore::with_value(KEY, json!("garbage")));
        let cache = RatingCache::new(store.clone(), KEY, SIX_HOURS, 200);

        assert!(cache.get("anything").await.is_none());
        assert!(persisted(&store).is_empty(), "Garbage should be replaced by an empty map");
    }

    #[tokio::test]
    async fn test_clean_read_does_not_write() {
        let (cache, store) = create_test_cache(200);
        assert!(cache.get("nothing").await.is_none());
        assert!(store.snapshot(KEY).is_none(), "A clean miss should not create the map");
    }

    #[tokio::test]
    async fn test_capacity_keeps_most_recent_entries() {
        let (cache, store) = create_test_cache(200);
        let now = now_millis();
        let mut seeded = Map::new();
        for i in 0..210 {
            seeded.insert(format!("wine-{}", i), entry_json(&sample("Seeded"), now - 1 - i));
        }
        store.insert(KEY, Value::Object(seeded));

        cache
            .set(
                "Latest Entry",
                RatingResult::new(5.0, 5, "Latest Entry", "https://example/latest"),
            )
            .await;

        let map = persisted(&store);
        assert_eq!(map.len(), 200);
        assert!(map.contains_key("latest entry"));
        for i in 0..199 {
            assert!(map.contains_key(&format!("wine-{}", i)), "wine-{} should be kept", i);
        }
        for i in 199..210 {
            assert!(!map.contains_key(&format!("wine-{}", i)), "wine-{} should be evicted", i);
        }
    }

    #[tokio::test]
    async fn test_concurrent_sets_for_different_keys_all_land() {
        let (cache, store) = create_test_cache(200);

        let writes = (0..20).map(|i| {
            let cache = cache.clone();
            async move { cache.set(&format!("wine {}", i), sample("Concurrent")).await }
        });
        futures::future::join_all(writes).await;

        assert_eq!(persisted(&store).len(), 20);
    }
}
