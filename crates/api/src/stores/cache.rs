//! Response caching for Redis.
//!
//! Cached bodies are stored as JSON under deterministic keys derived from
//! the request path and its query string. Invalidation walks matching keys
//! with bounded SCAN pages; keys written concurrently during the walk may
//! be missed, which leaves a short staleness window bounded by the entry
//! TTL. That trade-off is intentional.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::client::StoreClient;

/// Keys deleted per SCAN page during invalidation.
const SCAN_PAGE: usize = 100;

/// A cached successful response body plus enough metadata to replay it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub content_type: String,
    pub body: String,
}

/// Builds the canonical cache key for a request.
///
/// Query parameters are sorted by name (then value) before key
/// construction, so `a=1&b=2` and `b=2&a=1` map to the same entry.
/// User-scoped endpoints get a `user:<id>` segment so entries are never
/// shared across accounts.
pub fn cache_key(path: &str, query: &str, user: Option<Uuid>) -> String {
    let canonical = canonicalize_query(query);
    match user {
        Some(id) => format!("cache:{}:user:{}:{}", path, id, canonical),
        None => format!("cache:{}:{}", path, canonical),
    }
}

fn canonicalize_query(query: &str) -> String {
    let mut pairs: Vec<&str> = query.split('&').filter(|p| !p.is_empty()).collect();
    pairs.sort_unstable();
    pairs.join("&")
}

/// Store for cached response bodies.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResponseCache: Send + Sync {
    /// Get a cached response. Errors mean the store is unreachable; the
    /// caller decides whether to treat that as a miss.
    async fn lookup(&self, key: &str) -> Result<Option<CachedResponse>>;

    /// Store a response body with TTL.
    async fn store(&self, key: &str, response: &CachedResponse, ttl_secs: u64) -> Result<()>;

    /// Delete every key starting with `prefix`. Returns how many entries
    /// were removed.
    async fn invalidate_prefix(&self, prefix: &str) -> Result<u64>;
}

/// Redis implementation of ResponseCache.
#[derive(Clone)]
pub struct RedisResponseCache {
    store: StoreClient,
}

impl RedisResponseCache {
    pub fn new(store: StoreClient) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ResponseCache for RedisResponseCache {
    async fn lookup(&self, key: &str) -> Result<Option<CachedResponse>> {
        let json = self.store.get(key).await?;

        match json {
            Some(j) => Ok(Some(serde_json::from_str(&j)?)),
            None => Ok(None),
        }
    }

    async fn store(&self, key: &str, response: &CachedResponse, ttl_secs: u64) -> Result<()> {
        let json = serde_json::to_string(response)?;
        self.store.set_with_ttl(key, &json, ttl_secs).await
    }

    async fn invalidate_prefix(&self, prefix: &str) -> Result<u64> {
        let mut cursor = 0u64;
        let mut deleted = 0u64;

        loop {
            let (next, keys) = self.store.scan_prefix(prefix, cursor, SCAN_PAGE).await?;
            deleted += self.store.delete(&keys).await?;

            if next == 0 {
                break;
            }
            cursor = next;
        }

        Ok(deleted)
    }
}
