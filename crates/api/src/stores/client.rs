//! Thin client over the expiring key-value store (Redis).
//!
//! Every operation obtains a multiplexed connection and runs under the
//! configured timeout; a timeout or connectivity failure surfaces as an
//! error and the caller decides whether to fail open (cache reads) or
//! closed (rate limiting, one-time codes).

use std::time::Duration;

use anyhow::{Context, Result};
use redis::AsyncCommands;

#[derive(Clone)]
pub struct StoreClient {
    client: redis::Client,
    timeout: Duration,
}

impl StoreClient {
    pub fn new(client: redis::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    async fn conn(&self) -> Result<redis::aio::MultiplexedConnection> {
        let connect = self.client.get_multiplexed_async_connection();
        tokio::time::timeout(self.timeout, connect)
            .await
            .context("store connection timed out")?
            .context("store connection failed")
    }

    async fn timed<T>(
        &self,
        fut: impl std::future::Future<Output = redis::RedisResult<T>>,
    ) -> Result<T> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .context("store call timed out")?
            .context("store call failed")
    }

    pub async fn ping(&self) -> Result<bool> {
        let mut conn = self.conn().await?;
        let result: String = self.timed(redis::cmd("PING").query_async(&mut conn)).await?;
        Ok(result == "PONG")
    }

    pub async fn set_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let mut conn = self.conn().await?;
        self.timed(conn.set_ex(key, value, ttl_secs)).await
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn().await?;
        self.timed(conn.get(key)).await
    }

    /// Returns how many of the given keys existed.
    pub async fn delete(&self, keys: &[String]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn().await?;
        self.timed(conn.del(keys)).await
    }

    pub async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn().await?;
        self.timed(conn.exists(key)).await
    }

    /// Remaining TTL in seconds; negative when the key is missing or has
    /// no expiry (Redis semantics).
    pub async fn ttl(&self, key: &str) -> Result<i64> {
        let mut conn = self.conn().await?;
        self.timed(redis::cmd("TTL").arg(key).query_async(&mut conn))
            .await
    }

    /// Atomic fixed-window increment: INCR, then EXPIRE only when the key
    /// was just created. The count itself is exact under concurrency; the
    /// EXPIRE is issued by exactly one caller (the one that saw 1).
    pub async fn incr_with_ttl(&self, key: &str, ttl_secs: u64) -> Result<i64> {
        let mut conn = self.conn().await?;

        let count: i64 = self
            .timed(redis::cmd("INCR").arg(key).query_async(&mut conn))
            .await?;

        if count == 1 {
            let _: () = self
                .timed(
                    redis::cmd("EXPIRE")
                        .arg(key)
                        .arg(ttl_secs)
                        .query_async(&mut conn),
                )
                .await?;
        }

        Ok(count)
    }

    /// One bounded SCAN page for keys starting with `prefix`. Returns the
    /// next cursor (0 when exhausted) and the keys found on this page.
    pub async fn scan_prefix(
        &self,
        prefix: &str,
        cursor: u64,
        count: usize,
    ) -> Result<(u64, Vec<String>)> {
        let mut conn = self.conn().await?;
        let pattern = format!("{}*", prefix);

        self.timed(
            redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(count)
                .query_async(&mut conn),
        )
        .await
    }
}
