//! Ephemeral stores (Redis).
//!
//! This module contains the shared expiring-store client and the three
//! coordination facilities built on it. Everything here has TTL-based
//! expiration and nothing is durably persisted; a store outage is surfaced
//! as an error, never silently bypassed.
//!
//! ## Stores
//!
//! - **cache** - Response cache with prefix invalidation
//! - **rate_limit** - Fixed-window request counters
//! - **otp** - One-time codes, resend cooldown, staged reset secrets
//!
//! ## Redis Key Patterns
//!
//! ```text
//! cache:{path}:{sorted-query}                → CachedResponse JSON
//! cache:{path}:user:{user_id}:{sorted-query} → user-scoped CachedResponse
//! rate_limit:{client_id}:{endpoint}          → window counter
//! email_otp:{user_id}                        → 6-digit code
//! resend_otp_lock:{user_id}                  → cooldown sentinel
//! reset_pass:{user_id}                       → staged password hash
//! ```
//!
//! ## Usage in Handlers
//!
//! Stores are accessed via `state.stores`:
//!
//! ```ignore
//! async fn handler(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
//!     state.stores.otp.put_code(user_id, &code, ttl).await?;
//!     state.stores.cache.invalidate_prefix("cache:/chapters").await?;
//! }
//! ```

mod cache;
mod client;
mod otp;
mod rate_limit;

pub use cache::{CachedResponse, ResponseCache, RedisResponseCache, cache_key};
pub use client::StoreClient;
pub use otp::{CODE_LEN, OtpStore, RedisOtpStore, VerifyOutcome, generate_code};
pub use rate_limit::{RateLimitResult, RateLimiter, RedisRateLimiter};

#[cfg(test)]
pub use cache::MockResponseCache;
#[cfg(test)]
pub use otp::MockOtpStore;
#[cfg(test)]
pub use rate_limit::MockRateLimiter;

use std::sync::Arc;

/// Collection of all ephemeral stores.
#[derive(Clone)]
pub struct Stores {
    pub cache: Arc<dyn ResponseCache>,
    pub rate_limiter: Arc<dyn RateLimiter>,
    pub otp: Arc<dyn OtpStore>,
}
