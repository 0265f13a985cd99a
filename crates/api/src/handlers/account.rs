//! Account self-service: two-step OTP-guarded deletion.
//!
//! Deleting an account is irreversible, so it takes two requests:
//! 1. POST /account/delete - re-confirm the password, receive a code by email
//! 2. DELETE /account - submit the code; the account and its data go away
//!
//! Step 2 also drops the user's scoped cache entries so nothing keyed to
//! the deleted account lingers until TTL.

use axum::{
    Extension, Json, Router, debug_handler,
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{delete, post},
};
use garde::Validate;
use shared::api::{ConfirmAccountDeletionPayload, OtpPurpose, RequestAccountDeletionPayload};

use crate::{
    error::AppError,
    handlers::{invalidate_prefixes, issue_otp},
    middleware::{
        auth::{self, AuthUser},
        rate_limit::{RatePolicy, rate_limited},
    },
    password::verify_password,
    state::AppState,
    stores::VerifyOutcome,
};

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/delete", post(request_deletion))
        .route("/", delete(confirm_deletion))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limited))
        .route_layer(Extension(RatePolicy {
            endpoint: "account",
            limit: 50,
            window_secs: 60,
        }))
        .route_layer(middleware::from_fn_with_state(state, auth::require_user))
}

#[debug_handler]
async fn request_deletion(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<RequestAccountDeletionPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let db_user = state
        .repos
        .users
        .find_by_id(user.id)
        .await?
        .ok_or(AppError::External(StatusCode::NOT_FOUND, "User not found."))?;

    if !verify_password(&payload.password, &db_user.password_hash)? {
        return Err(AppError::External(
            StatusCode::UNAUTHORIZED,
            "Invalid password.",
        ));
    }

    issue_otp(&state, &db_user, OtpPurpose::Delete).await?;

    Ok(Json(serde_json::json!({
        "message": "A confirmation code was sent to your email."
    })))
}

#[debug_handler]
async fn confirm_deletion(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<ConfirmAccountDeletionPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    match state.stores.otp.verify(user.id, &payload.code).await? {
        VerifyOutcome::Verified => {
            state.repos.users.delete(user.id).await?;

            let scores_prefix = format!("cache:/scores:user:{}", user.id);
            invalidate_prefixes(&state, &[&scores_prefix]).await;

            tracing::info!(user_id = %user.id, "account deleted");

            Ok(Json(serde_json::json!({
                "message": "Your account has been deleted."
            })))
        }
        VerifyOutcome::Mismatch => Err(AppError::OtpMismatch),
        VerifyOutcome::Expired => Err(AppError::OtpExpired),
    }
}
