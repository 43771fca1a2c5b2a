//! Session-scoped results cache.
//!
//! One entry per logical result key. Entries are replaced wholesale; there is
//! no partial update path.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::models::ResultPayload;

/// Key of the single agent-results entry used by the dashboard
pub const AGENT_RESULTS_KEY: &str = "td3-results";

#[derive(Clone)]
struct CachedPayload {
    payload: Arc<ResultPayload>,
    stored_at: Instant,
}

pub struct ResultsCache {
    entries: RwLock<HashMap<String, CachedPayload>>,
    max_age: Duration,
}

impl ResultsCache {
    /// `max_age` of zero keeps entries until they are invalidated.
    pub fn new(max_age: Duration) -> Arc<Self> {
        Arc::new(Self {
            entries: RwLock::new(HashMap::with_capacity(4)),
            max_age,
        })
    }

    /// Latest cached payload for `key` if it is still fresh
    pub fn get_fresh(&self, key: &str) -> Option<Arc<ResultPayload>> {
        let entries = self.entries.read();
        let cached = entries.get(key)?;
        if !self.max_age.is_zero() && cached.stored_at.elapsed() > self.max_age {
            debug!(key, "cached results expired");
            return None;
        }
        Some(cached.payload.clone())
    }

    pub fn put(&self, key: &str, payload: Arc<ResultPayload>) {
        debug!(key, samples = payload.len(), "caching results");
        self.entries.write().insert(
            key.to_string(),
            CachedPayload {
                payload,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, key: &str) -> bool {
        let removed = self.entries.write().remove(key).is_some();
        if removed {
            debug!(key, "cache entry invalidated");
        }
        removed
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::payload;

    #[test]
    fn test_put_get_invalidate() {
        let cache = ResultsCache::new(Duration::from_secs(60));
        assert!(cache.get_fresh(AGENT_RESULTS_KEY).is_none());

        let p = Arc::new(payload(3));
        cache.put(AGENT_RESULTS_KEY, p.clone());
        let hit = cache.get_fresh(AGENT_RESULTS_KEY).unwrap();
        assert!(Arc::ptr_eq(&hit, &p));

        assert!(cache.invalidate(AGENT_RESULTS_KEY));
        assert!(!cache.invalidate(AGENT_RESULTS_KEY));
        assert!(cache.get_fresh(AGENT_RESULTS_KEY).is_none());
    }

    #[test]
    fn test_put_replaces_whole_entry() {
        let cache = ResultsCache::new(Duration::ZERO);
        cache.put(AGENT_RESULTS_KEY, Arc::new(payload(2)));
        cache.put(AGENT_RESULTS_KEY, Arc::new(payload(5)));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get_fresh(AGENT_RESULTS_KEY).unwrap().len(), 5);
    }

    #[test]
    fn test_entries_expire() {
        let cache = ResultsCache::new(Duration::from_millis(1));
        cache.put(AGENT_RESULTS_KEY, Arc::new(payload(1)));
        std::thread::sleep(Duration::from_millis(10));
        assert!(cache.get_fresh(AGENT_RESULTS_KEY).is_none());
    }

    #[test]
    fn test_keys_are_independent() {
        let cache = ResultsCache::new(Duration::ZERO);
        cache.put("a", Arc::new(payload(1)));
        cache.put("b", Arc::new(payload(2)));
        cache.invalidate("a");
        assert!(cache.get_fresh("a").is_none());
        assert_eq!(cache.get_fresh("b").unwrap().len(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }
}
