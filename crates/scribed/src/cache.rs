//! Result cache keyed by request fingerprint.
//!
//! Bounded LRU with a store-wide TTL. Expired entries are dropped lazily on
//! lookup; the orchestrator additionally runs `purge_expired` on a fixed
//! generation cadence. Entries are silently replaced on re-generation.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

use scribe_common::GeneratedArticle;

struct CacheEntry {
    payload: GeneratedArticle,
    inserted_at: Instant,
}

pub struct ResultCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
    ttl: Duration,
}

impl ResultCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("nonzero capacity");
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Fresh payload for the fingerprint, if any. A stale hit is evicted and
    /// reported as a miss.
    pub fn get(&self, fingerprint: &str) -> Option<GeneratedArticle> {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get(fingerprint) {
            if entry.inserted_at.elapsed() < self.ttl {
                debug!("Cache hit for {}", &fingerprint[..8.min(fingerprint.len())]);
                return Some(entry.payload.clone());
            }
            entries.pop(fingerprint);
        }
        None
    }

    pub fn put(&self, fingerprint: &str, payload: GeneratedArticle) {
        let mut entries = self.entries.lock().unwrap();
        entries.put(
            fingerprint.to_string(),
            CacheEntry {
                payload,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drop every entry past its TTL.
    pub fn purge_expired(&self) {
        let mut entries = self.entries.lock().unwrap();
        let stale: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.inserted_at.elapsed() >= self.ttl)
            .map(|(key, _)| key.clone())
            .collect();
        let count = stale.len();
        for key in stale {
            entries.pop(&key);
        }
        if count > 0 {
            debug!("Purged {} expired cache entries", count);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
