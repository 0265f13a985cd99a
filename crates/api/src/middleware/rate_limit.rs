//! Per-route fixed-window rate limiting.
//!
//! Attach a [`RatePolicy`] extension and the [`rate_limited`] middleware to
//! a route; composition is explicit in the router, not implied by the
//! handler. A store failure here fails the request: proceeding as if
//! unthrottled would defeat the limiter exactly when it matters.

use axum::{
    Extension,
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;

use crate::{error::AppError, state::AppState, stores::RateLimitResult};

/// Fixed-window limit for one logical endpoint.
#[derive(Debug, Clone, Copy)]
pub struct RatePolicy {
    /// Logical endpoint name; part of the counter key, so distinct
    /// endpoints never share a window.
    pub endpoint: &'static str,
    pub limit: i64,
    pub window_secs: u64,
}

/// Best-effort client identity: first `x-forwarded-for` hop when present
/// (the usual reverse-proxy deployment), else the peer socket address.
fn client_id(req: &Request) -> String {
    if let Some(forwarded) = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn rate_limited(
    State(state): State<AppState>,
    Extension(policy): Extension<RatePolicy>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let client = client_id(&req);

    let result = state
        .stores
        .rate_limiter
        .check(&client, policy.endpoint, policy.limit, policy.window_secs)
        .await?;

    match result {
        RateLimitResult::Allowed(_) => Ok(next.run(req).await),
        RateLimitResult::Exceeded { retry_after_secs } => {
            tracing::debug!(
                client = %client,
                endpoint = policy.endpoint,
                "rate limit exceeded"
            );
            Err(AppError::RateLimited { retry_after_secs })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::MockRateLimiter;
    use crate::test_utils::TestStateBuilder;
    use axum::http::StatusCode;
    use axum::{Router, body::Body, middleware, routing::get};
    use tower::ServiceExt;

    fn test_router(limiter: MockRateLimiter, policy: RatePolicy) -> Router {
        let state = TestStateBuilder::new().with_rate_limiter(limiter).build();

        Router::new()
            .route("/ping", get(|| async { "pong" }))
            .route_layer(middleware::from_fn_with_state(state.clone(), rate_limited))
            .route_layer(Extension(policy))
            .with_state(state)
    }

    fn policy() -> RatePolicy {
        RatePolicy {
            endpoint: "ping",
            limit: 100,
            window_secs: 60,
        }
    }

    #[tokio::test]
    async fn allowed_requests_reach_the_handler() {
        let mut limiter = MockRateLimiter::new();
        limiter
            .expect_check()
            .returning(|_, _, _, _| Ok(RateLimitResult::Allowed(1)));

        let response = test_router(limiter, policy())
            .oneshot(
                axum::http::Request::builder()
                    .uri("/ping")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn exceeded_requests_get_429_with_retry_hint() {
        let mut limiter = MockRateLimiter::new();
        limiter.expect_check().returning(|_, _, _, _| {
            Ok(RateLimitResult::Exceeded {
                retry_after_secs: 42,
            })
        });

        let response = test_router(limiter, policy())
            .oneshot(
                axum::http::Request::builder()
                    .uri("/ping")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn store_failures_fail_closed() {
        let mut limiter = MockRateLimiter::new();
        limiter
            .expect_check()
            .returning(|_, _, _, _| Err(anyhow::anyhow!("connection refused")));

        let response = test_router(limiter, policy())
            .oneshot(
                axum::http::Request::builder()
                    .uri("/ping")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn forwarded_header_wins_over_socket_address() {
        let req = axum::http::Request::builder()
            .uri("/ping")
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(Body::empty())
            .unwrap();

        assert_eq!(client_id(&req), "203.0.113.7");
    }

    #[tokio::test]
    async fn missing_identity_falls_back_to_unknown() {
        let req = axum::http::Request::builder()
            .uri("/ping")
            .body(Body::empty())
            .unwrap();

        assert_eq!(client_id(&req), "unknown");
    }
}
