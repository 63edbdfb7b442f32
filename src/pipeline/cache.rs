//! In-memory response cache and cool-down markers.
//!
//! Both live in `moka` future caches: concurrent, lock-free for callers and
//! with per-entry expiry. Values are shared `Arc`s so a reader never sees a
//! partially written response.

use crate::config::CacheConfig;
use crate::core::GeneratedResponse;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Generated answers by fingerprint, plus short-lived cool-down markers.
#[derive(Clone)]
pub struct ResponseCache {
    responses: Cache<String, Arc<GeneratedResponse>>,
    cooldowns: Cache<String, ()>,
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("responses", &self.responses.entry_count())
            .field("cooldowns", &self.cooldowns.entry_count())
            .finish()
    }
}

impl ResponseCache {
    /// Creates a cache holding up to `capacity` responses for `ttl` each.
    /// Cool-down markers expire after `cooldown`.
    #[must_use]
    pub fn new(capacity: u64, ttl: Duration, cooldown: Duration) -> Self {
        Self {
            responses: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
            cooldowns: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(cooldown)
                .build(),
        }
    }

    /// Creates a cache from configuration.
    #[must_use]
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(
            config.capacity,
            Duration::from_secs(config.ttl_secs),
            Duration::from_secs(config.cooldown_secs),
        )
    }

    /// Cached response for `fingerprint`.
    pub async fn get(&self, fingerprint: &str) -> Option<Arc<GeneratedResponse>> {
        self.responses.get(fingerprint).await
    }

    /// Stores a response. Storing the same content again is a no-op (the
    /// original entry and its expiry are kept); different content replaces
    /// the entry.
    ///
    /// Returns whether the cache changed.
    pub async fn put(&self, fingerprint: String, response: Arc<GeneratedResponse>) -> bool {
        if let Some(existing) = self.responses.get(&fingerprint).await
            && existing.same_content(&response)
        {
            debug!(%fingerprint, "identical response already cached");
            return false;
        }
        self.responses.insert(fingerprint, response).await;
        true
    }

    /// Marks a request key as cooling down.
    pub async fn mark_cooldown(&self, key: String) {
        self.cooldowns.insert(key, ()).await;
    }

    /// Whether `key` is cooling down.
    pub fn in_cooldown(&self, key: &str) -> bool {
        self.cooldowns.contains_key(key)
    }

    /// Drops every response and cool-down marker.
    pub fn clear_all(&self) {
        self.responses.invalidate_all();
        self.cooldowns.invalidate_all();
        info!("response cache cleared");
    }

    /// Approximate number of cached responses.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.responses.entry_count()
    }

    /// Whether no responses are cached (approximate).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}
