mod config;
mod error;
mod handlers;
mod middleware;
mod models;
mod password;
mod repos;
mod services;
mod state;
mod stores;
#[cfg(test)]
mod test_utils;

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use axum::{Router, http};
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    config::Config,
    repos::{PgChapterRepo, PgQuizRepo, PgScoreRepo, PgSubjectRepo, PgUserRepo, Repos},
    services::EmailSenderImpl,
    state::AppState,
    stores::{RedisOtpStore, RedisRateLimiter, RedisResponseCache, StoreClient, Stores},
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = envy::prefixed("QUIZMASTER_").from_env::<Config>()?;

    // Initialize Sentry for error tracking (must be done early, guard must stay alive)
    let _sentry_guard = config.sentry_dsn.as_ref().map(|dsn| {
        sentry::init((
            dsn.as_str(),
            sentry::ClientOptions {
                release: sentry::release_name!(),
                environment: Some(config.env.clone().into()),
                ..Default::default()
            },
        ))
    });

    // Set up tracing: JSON in production, human-readable otherwise
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.is_production() {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer())
            .init();
    }

    let database = PgPoolOptions::new()
        .max_connections(25)
        .connect(&config.database_url)
        .await?;

    let redis = redis::Client::open(config.redis_url.as_str())?;
    let store = StoreClient::new(redis, Duration::from_millis(config.store_timeout_ms));

    let email = EmailSenderImpl::new(config.resend_api_key.clone(), config.smtp_url.clone())?;

    // Build repositories
    let repos = Repos {
        users: std::sync::Arc::new(PgUserRepo::new(database.clone())),
        subjects: std::sync::Arc::new(PgSubjectRepo::new(database.clone())),
        chapters: std::sync::Arc::new(PgChapterRepo::new(database.clone())),
        quizzes: std::sync::Arc::new(PgQuizRepo::new(database.clone())),
        scores: std::sync::Arc::new(PgScoreRepo::new(database.clone())),
    };

    // Build stores on the shared expiring-store client
    let stores = Stores {
        cache: std::sync::Arc::new(RedisResponseCache::new(store.clone())),
        rate_limiter: std::sync::Arc::new(RedisRateLimiter::new(store.clone())),
        otp: std::sync::Arc::new(RedisOtpStore::new(store.clone())),
    };

    let state = AppState {
        config: config.clone(),
        database,
        store,
        repos,
        stores,
        email: std::sync::Arc::new(email),
    };

    // Request ID header name
    let x_request_id = http::HeaderName::from_static("x-request-id");

    let app = Router::new()
        .nest("/health", handlers::health::router())
        .nest("/auth", handlers::auth::router(state.clone()))
        .nest("/account", handlers::account::router(state.clone()))
        .nest("/subjects", handlers::subjects::router(state.clone()))
        .nest("/chapters", handlers::chapters::router(state.clone()))
        .nest("/quizzes", handlers::quizzes::router(state.clone()))
        .nest("/scores", handlers::scores::router(state.clone()))
        .with_state(state)
        // Request ID: generate UUID, include in logs, return in response
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &http::Request<axum::body::Body>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            },
        ))
        .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid))
        .layer(RequestBodyLimitLayer::new(1024 * 1024)); // 1MB limit

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = TcpListener::bind(addr).await?;

    tracing::info!("Listening on {}", addr);

    // connect_info makes the peer address available to the rate limiter
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
