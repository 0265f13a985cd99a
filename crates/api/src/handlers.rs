//! HTTP handlers.
//!
//! Each module owns a router plus the middleware policies for its routes;
//! `main.rs` nests them. Cross-cutting helpers for the OTP flows and cache
//! invalidation live here because several modules share them.

pub mod account;
pub mod auth;
pub mod chapters;
pub mod health;
pub mod quizzes;
pub mod scores;
pub mod subjects;

use shared::api::OtpPurpose;

use crate::{
    error::AppError,
    models::User,
    state::AppState,
    stores::generate_code,
};

/// Issue a one-time code for a user: enforce the cooldown, store the code,
/// arm the resend lock and email the code out.
///
/// Resends are gated on the code's own existence, so a user whose code has
/// expired can always get a new one even if the lock write was lost.
pub(crate) async fn issue_otp(
    state: &AppState,
    user: &User,
    purpose: OtpPurpose,
) -> Result<(), AppError> {
    eprintln!("DBG issue_otp entry");
    if !state.stores.otp.can_resend(user.id).await? {
        eprintln!("DBG can_resend false -> cooldown");
        let ttl = state.stores.otp.resend_ttl(user.id).await?;
        // The lock can already be gone while the code lives on; quote the
        // full cooldown rather than a non-positive hint.
        let retry_after_secs = if ttl > 0 {
            ttl
        } else {
            state.config.resend_cooldown_secs as i64
        };
        return Err(AppError::ResendCooldown { retry_after_secs });
    }

    let code = generate_code();
    state
        .stores
        .otp
        .put_code(user.id, &code, state.config.otp_ttl_secs)
        .await?;
    state
        .stores
        .otp
        .lock_resend(user.id, state.config.resend_cooldown_secs)
        .await?;

    eprintln!("DBG about to send_otp to {} code_len={}", user.username, code.len());
    state.email.send_otp(&user.username, &code, purpose).await?;
    eprintln!("DBG send_otp returned");

    tracing::info!(user_id = %user.id, context = ?purpose, "one-time code issued");

    Ok(())
}

/// Drop every cache entry under the given prefixes. Failures are logged and
/// swallowed: the mutation already committed, so the response must not fail
/// over a stale cache.
pub(crate) async fn invalidate_prefixes(state: &AppState, prefixes: &[&str]) {
    for prefix in prefixes {
        match state.stores.cache.invalidate_prefix(prefix).await {
            Ok(removed) => {
                tracing::debug!(prefix, removed, "cache invalidated");
            }
            Err(err) => {
                tracing::warn!(prefix, error = ?err, "cache invalidation failed");
            }
        }
    }
}
