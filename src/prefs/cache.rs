//! Bounded TTL cache
//!
//! A small explicit cache used for session-metadata lookups. Entries expire
//! after a fixed TTL; when the map reaches capacity, expired entries are
//! evicted first and the oldest entry is dropped if that was not enough.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

/// TTL cache with a hard entry cap
#[derive(Debug)]
pub struct TtlCache<K, V> {
    entries: Mutex<HashMap<K, CacheEntry<V>>>,
    ttl: Duration,
    max_entries: usize,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a cache with the given TTL and entry cap
    #[must_use]
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            max_entries,
        }
    }

    /// Look up a live entry, cloning the value
    ///
    /// Expired entries read as absent (and are removed on sight).
    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        let expired = entries
            .get(key)
            .is_some_and(|e| e.inserted_at.elapsed() >= self.ttl);
        if expired {
            entries.remove(key);
            return None;
        }

        entries.get(key).map(|e| e.value.clone())
    }

    /// Insert a value, evicting as needed to stay under the cap
    pub fn insert(&self, key: K, value: V) {
        let mut entries = self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        if entries.len() >= self.max_entries {
            let ttl = self.ttl;
            entries.retain(|_, e| e.inserted_at.elapsed() < ttl);
        }

        // Still full after dropping expired entries: evict the oldest
        if entries.len() >= self.max_entries {
            if let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, e)| e.inserted_at)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&oldest);
            }
        }

        entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Remove entries matching a predicate over keys
    pub fn retain_keys(&self, mut keep: impl FnMut(&K) -> bool) {
        let mut entries = self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.retain(|k, _| keep(k));
    }

    /// Number of entries currently held (live and expired alike)
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_returns_inserted_value() {
        let cache: TtlCache<String, u32> = TtlCache::new(Duration::from_secs(60), 10);
        cache.insert("a".to_string(), 1);

        assert_eq!(cache.get(&"a".to_string()), Some(1));
        assert_eq!(cache.get(&"b".to_string()), None);
    }

    #[test]
    fn expired_entries_read_as_absent() {
        let cache: TtlCache<String, u32> = TtlCache::new(Duration::from_millis(0), 10);
        cache.insert("a".to_string(), 1);

        assert_eq!(cache.get(&"a".to_string()), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn cap_evicts_oldest_entry() {
        let cache: TtlCache<u32, u32> = TtlCache::new(Duration::from_secs(60), 3);
        cache.insert(1, 1);
        std::thread::sleep(Duration::from_millis(5));
        cache.insert(2, 2);
        cache.insert(3, 3);
        cache.insert(4, 4);

        assert!(cache.len() <= 3);
        assert_eq!(cache.get(&1), None);
        assert_eq!(cache.get(&4), Some(4));
    }

    #[test]
    fn retain_keys_prunes_matching_entries() {
        let cache: TtlCache<String, u32> = TtlCache::new(Duration::from_secs(60), 10);
        cache.insert("dev-1:u1".to_string(), 1);
        cache.insert("dev-2:u1".to_string(), 2);

        cache.retain_keys(|k| !k.starts_with("dev-1:"));

        assert_eq!(cache.get(&"dev-1:u1".to_string()), None);
        assert_eq!(cache.get(&"dev-2:u1".to_string()), Some(2));
    }
}
