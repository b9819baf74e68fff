use std::{collections::HashMap, sync::Mutex, time::Duration};

use tokio::time::Instant;

use crate::types::LookupResult;

pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_CAPACITY: usize = 10_000;

struct CacheEntry {
    result: LookupResult,
    expiry: Instant,
}

/// In-memory cache of lookup outcomes, keyed by the raw input number.
/// Entries expire lazily on access; nothing survives a restart.
pub struct ResultCache {
    ttl: Duration,
    capacity: usize,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl ResultCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, number: &str) -> Option<LookupResult> {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        match entries.get(number) {
            Some(entry) if Instant::now() > entry.expiry => {
                entries.remove(number);
                None
            }
            Some(entry) => Some(entry.result.clone()),
            None => None,
        }
    }

    pub fn put(&self, number: &str, result: LookupResult) {
        let mut entries = self.entries.lock().expect("cache lock poisoned");

        if entries.len() >= self.capacity {
            Self::evict_oldest(&mut entries, (self.capacity / 10).max(1));
        }

        entries.insert(
            number.to_string(),
            CacheEntry {
                result,
                expiry: Instant::now() + self.ttl,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop the `count` entries closest to expiring.
    fn evict_oldest(entries: &mut HashMap<String, CacheEntry>, count: usize) {
        let mut by_expiry: Vec<(String, Instant)> = entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.expiry))
            .collect();
        by_expiry.sort_by_key(|(_, expiry)| *expiry);

        for (key, _) in by_expiry.into_iter().take(count) {
            entries.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LookupResult;

    fn cached(input: &str) -> LookupResult {
        LookupResult::invalid(input)
    }

    #[tokio::test(start_paused = true)]
    async fn hit_within_ttl_then_lazy_expiry() {
        let cache = ResultCache::new(Duration::from_secs(60), 10);
        cache.put("+15550001111", cached("+15550001111"));

        let hit = cache.get("+15550001111").expect("entry should be fresh");
        assert_eq!(hit.input, "+15550001111");

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(cache.get("+15550001111").is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn eviction_drops_oldest_tenth() {
        let cache = ResultCache::new(Duration::from_secs(1000), 10);
        for i in 0..10 {
            cache.put(&format!("+1555000{i:04}"), cached("x"));
            tokio::time::advance(Duration::from_secs(1)).await;
        }
        assert_eq!(cache.len(), 10);

        // At capacity: the next put evicts the single oldest entry first.
        cache.put("+19998887777", cached("y"));
        assert_eq!(cache.len(), 10);
        assert!(cache.get("+15550000000").is_none());
        assert!(cache.get("+15550000001").is_some());
        assert!(cache.get("+19998887777").is_some());
    }
}
