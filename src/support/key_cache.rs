//! Public key caching for remote actors, so the demo binary's inbox
//! handler doesn't refetch an actor document on every delivery from the
//! same sender.
//!
//! Grounded on the teacher's `federation/key_cache.rs` `PublicKeyCache`
//! (`Arc<RwLock<HashMap>>` guarding TTL'd entries) — the same shape that
//! motivated `memory_store::MemoryStore`'s internals.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::support::signature::{self, SignatureError};

#[derive(Debug, Clone)]
struct CachedKey {
    pem: String,
    cached_at: Instant,
    ttl: Duration,
}

impl CachedKey {
    fn is_valid(&self) -> bool {
        self.cached_at.elapsed() < self.ttl
    }
}

/// Thread-safe TTL cache for remote actor public keys.
pub struct PublicKeyCache {
    cache: RwLock<HashMap<String, CachedKey>>,
    http_client: Arc<reqwest::Client>,
    default_ttl: Duration,
}

impl PublicKeyCache {
    pub fn new(http_client: Arc<reqwest::Client>, default_ttl: Option<Duration>) -> Self {
        PublicKeyCache {
            cache: RwLock::new(HashMap::new()),
            http_client,
            default_ttl: default_ttl.unwrap_or(Duration::from_secs(3600)),
        }
    }

    /// Returns the PEM public key for `key_id`, fetching and caching it on
    /// a miss or expiry.
    pub async fn get(&self, key_id: &str) -> Result<String, SignatureError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.get(key_id) {
                if cached.is_valid() {
                    return Ok(cached.pem.clone());
                }
            }
        }

        let pem = signature::fetch_public_key(key_id, &self.http_client).await?;

        let mut cache = self.cache.write().await;
        cache.insert(
            key_id.to_string(),
            CachedKey {
                pem: pem.clone(),
                cached_at: Instant::now(),
                ttl: self.default_ttl,
            },
        );
        Ok(pem)
    }

    pub async fn invalidate(&self, key_id: &str) {
        self.cache.write().await.remove(key_id);
    }

    pub async fn stats(&self) -> CacheStats {
        let cache = self.cache.read().await;
        let total = cache.len();
        let valid = cache.values().filter(|v| v.is_valid()).count();
        CacheStats {
            total_entries: total,
            valid_entries: valid,
            expired_entries: total - valid,
        }
    }

    /// Drops expired entries. Callers may run this on a timer; it is never
    /// invoked automatically.
    pub async fn prune_expired(&self) {
        self.cache.write().await.retain(|_, v| v.is_valid());
    }
}

#[derive(Debug, Clone)]
pub struct CacheStats {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn expired_entries_are_pruned() {
        let cache = PublicKeyCache::new(Arc::new(reqwest::Client::new()), Some(Duration::from_millis(50)));
        cache.cache.write().await.insert(
            "test-key".to_string(),
            CachedKey {
                pem: "test-pem".to_string(),
                cached_at: Instant::now(),
                ttl: Duration::from_millis(50),
            },
        );

        assert_eq!(cache.stats().await.valid_entries, 1);
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(cache.stats().await.expired_entries, 1);

        cache.prune_expired().await;
        assert_eq!(cache.stats().await.total_entries, 0);
    }
}
