//! Fixed-window rate limiting for Redis.
//!
//! One counter per (client, endpoint) pair. The counter is created with the
//! window TTL on first increment and disappears when the window ends; the
//! increment is a single atomic INCR, so no more than `limit` requests are
//! ever admitted per window even under concurrent load.

use anyhow::Result;
use async_trait::async_trait;

use super::client::StoreClient;

fn window_key(client_id: &str, endpoint: &str) -> String {
    format!("rate_limit:{}:{}", client_id, endpoint)
}

/// Rate limiter trait for checking and incrementing counters.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Count this request against the client's window. Admitted iff the
    /// incremented count is within the limit.
    async fn check(
        &self,
        client_id: &str,
        endpoint: &str,
        limit: i64,
        window_secs: u64,
    ) -> Result<RateLimitResult>;
}

/// Result of a rate limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Under the limit, includes current count.
    Allowed(i64),
    /// Over the limit; the window's remaining TTL as a retry hint.
    Exceeded { retry_after_secs: i64 },
}

/// Redis implementation of RateLimiter.
#[derive(Clone)]
pub struct RedisRateLimiter {
    store: StoreClient,
}

impl RedisRateLimiter {
    pub fn new(store: StoreClient) -> Self {
        Self { store }
    }
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn check(
        &self,
        client_id: &str,
        endpoint: &str,
        limit: i64,
        window_secs: u64,
    ) -> Result<RateLimitResult> {
        let key = window_key(client_id, endpoint);

        let count = self.store.incr_with_ttl(&key, window_secs).await?;

        if count > limit {
            // The TTL read can race the window expiring; fall back to a
            // full window rather than handing out a non-positive hint.
            let ttl = self.store.ttl(&key).await?;
            let retry_after_secs = if ttl > 0 { ttl } else { window_secs as i64 };
            return Ok(RateLimitResult::Exceeded { retry_after_secs });
        }

        Ok(RateLimitResult::Allowed(count))
    }
}
