//! Per-route response caching.
//!
//! Attach a [`CachePolicy`] extension and the [`cacheable`] middleware to a
//! route. Lookups fail open: a store outage downgrades to a miss and the
//! handler runs normally. Writes happen only for responses in the OK class.
//! A failed write is logged without failing the response, since the business
//! result already exists and losing the cache entry is the cheaper outcome.

use axum::{
    Extension,
    body::{Body, to_bytes},
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::Response,
};

use crate::{
    error::AppError,
    middleware::auth::AuthUser,
    state::AppState,
    stores::{CachedResponse, cache_key},
};

/// Bodies above this size are served but not cached.
const MAX_CACHEABLE_BODY: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheScope {
    /// One entry per canonical path+query, shared by all callers.
    Shared,
    /// One entry per authenticated user.
    PerUser,
}

/// Caching rules for one route.
#[derive(Debug, Clone, Copy)]
pub struct CachePolicy {
    pub ttl_secs: u64,
    pub scope: CacheScope,
}

pub async fn cacheable(
    State(state): State<AppState>,
    Extension(policy): Extension<CachePolicy>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = match policy.scope {
        CacheScope::Shared => None,
        CacheScope::PerUser => match req.extensions().get::<AuthUser>() {
            Some(user) => Some(user.id),
            // No identity to scope by; let the handler (and its auth) run.
            None => return Ok(next.run(req).await),
        },
    };

    let key = cache_key(req.uri().path(), req.uri().query().unwrap_or(""), user);

    match state.stores.cache.lookup(&key).await {
        Ok(Some(hit)) => return Ok(replay(hit)),
        Ok(None) => {}
        Err(err) => {
            tracing::warn!(key = %key, error = ?err, "cache lookup failed, treating as miss");
        }
    }

    let response = next.run(req).await;

    // Only the OK class is ever cached; errors and redirects always re-run.
    if response.status() != StatusCode::OK {
        return Ok(response);
    }

    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/json")
        .to_string();

    let (parts, body) = response.into_parts();
    let bytes = to_bytes(body, usize::MAX)
        .await
        .map_err(|e| anyhow::anyhow!("buffering response body failed: {}", e))?;

    if bytes.len() <= MAX_CACHEABLE_BODY {
        if let Ok(text) = std::str::from_utf8(&bytes) {
            let cached = CachedResponse {
                content_type,
                body: text.to_string(),
            };
            if let Err(err) = state.stores.cache.store(&key, &cached, policy.ttl_secs).await {
                tracing::warn!(key = %key, error = ?err, "cache store failed");
            }
        }
    }

    Ok(Response::from_parts(parts, Body::from(bytes)))
}

fn replay(hit: CachedResponse) -> Response {
    let mut response = Response::new(Body::from(hit.body));
    *response.status_mut() = StatusCode::OK;
    if let Ok(value) = hit.content_type.parse() {
        response.headers_mut().insert(header::CONTENT_TYPE, value);
    }
    response
}
