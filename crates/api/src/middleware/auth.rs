//! Authentication middleware using signed bearer tokens.
//!
//! Usage: Add `AuthUser` as an extractor parameter to require authentication,
//! or guard a whole router with [`require_user`] / [`require_admin`]. The
//! guards authenticate once and stash the result in request extensions, so
//! handler extractors behind them are free.
//!
//! ```ignore
//! async fn my_handler(user: AuthUser, ...) -> ... {
//!     // user.id and user.role are available here
//! }
//! ```
//!
//! The user record is re-read on every request: a suspension or deletion
//! takes effect immediately, regardless of what the token claims.

use axum::{
    Json, RequestPartsExt,
    extract::{FromRequestParts, Request, State},
    http::{StatusCode, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{config::Config, models::UserRole, state::AppState};

/// JWT claims carried by an access token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: UserRole,
    pub exp: i64,
}

/// Sign an access token for a user.
pub fn issue_token(config: &Config, user_id: Uuid, role: UserRole) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        role,
        exp: Utc::now().timestamp() + config.jwt_ttl_secs,
    };

    let token = jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )?;

    Ok(token)
}

fn decode_token(config: &Config, token: &str) -> Result<Claims, AuthError> {
    jsonwebtoken::decode::<Claims>(
        token,
        &jsonwebtoken::DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &jsonwebtoken::Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AuthError::InvalidToken)
}

/// Authenticated user with a fresh account-state check behind it.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: UserRole,
}

async fn authenticate(state: &AppState, token: &str) -> Result<AuthUser, AuthError> {
    let claims = decode_token(&state.config, token)?;

    let user = state
        .repos
        .users
        .find_by_id(claims.sub)
        .await
        .map_err(|e| {
            tracing::error!("user lookup during auth failed: {:?}", e);
            AuthError::Unavailable
        })?
        .ok_or(AuthError::InvalidToken)?;

    if !user.is_active() {
        return Err(AuthError::Suspended);
    }
    if !user.is_verified() {
        return Err(AuthError::NotVerified);
    }

    Ok(AuthUser {
        id: user.id,
        role: user.role,
    })
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // A router guard may already have done the work.
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(*user);
        }

        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| AuthError::MissingToken)?;

        authenticate(state, bearer.token()).await
    }
}

/// Router guard: any verified, active user.
pub async fn require_user(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let (mut parts, body) = req.into_parts();
    let user = AuthUser::from_request_parts(&mut parts, &state).await?;

    let mut req = Request::from_parts(parts, body);
    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

/// Router guard: admins only.
pub async fn require_admin(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let (mut parts, body) = req.into_parts();
    let user = AuthUser::from_request_parts(&mut parts, &state).await?;

    match user.role {
        UserRole::Admin => {}
        UserRole::User => return Err(AuthError::AdminOnly),
    }

    let mut req = Request::from_parts(parts, body);
    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

#[derive(Debug)]
pub enum AuthError {
    MissingToken,
    InvalidToken,
    Suspended,
    NotVerified,
    AdminOnly,
    /// Account state could not be checked; fail closed.
    Unavailable,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingToken => (StatusCode::UNAUTHORIZED, "Missing authorization token"),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid or expired token"),
            AuthError::Suspended => (StatusCode::FORBIDDEN, "Account is suspended"),
            AuthError::NotVerified => (
                StatusCode::FORBIDDEN,
                "Account not verified. Please verify your email.",
            ),
            AuthError::AdminOnly => (StatusCode::FORBIDDEN, "Admin access required"),
            AuthError::Unavailable => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
        };

        let body = serde_json::json!({ "error": message });

        (status, Json(body)).into_response()
    }
}
