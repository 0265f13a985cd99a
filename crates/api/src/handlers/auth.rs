//! Registration, login and the OTP-guarded account flows.
//!
//! Flow for a new account:
//! 1. POST /auth/register creates an unverified user and emails a 6-digit code
//! 2. POST /auth/verify-email confirms the code and activates the account
//! 3. POST /auth/login returns a signed access token
//!
//! Password resets never change anything up front: the new password hash is
//! staged in the expiring store and only applied when the emailed code is
//! confirmed. A second code for the same user is refused until the previous
//! one expires; the resend lock's TTL is what the cooldown hint reports.

use axum::{
    Extension, Json, Router, debug_handler,
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::post,
};
use garde::Validate;
use shared::api::{
    LoginPayload, LoginResponse, OtpPurpose, RegisterPayload, RegisterResponse,
    RequestPasswordResetPayload, ResendOtpPayload, UserSummary, VerifyEmailPayload,
    VerifyPasswordResetPayload,
};

use crate::{
    error::AppError,
    handlers::issue_otp,
    middleware::auth::issue_token,
    middleware::rate_limit::{RatePolicy, rate_limited},
    models::User,
    password::{hash_password, verify_password},
    repos::NewUser,
    state::AppState,
    stores::VerifyOutcome,
};

pub fn router(state: AppState) -> Router<AppState> {
    // Unauthenticated surface; the per-client window is the only brake
    // besides the OTP cooldown itself.
    Router::new()
        .route("/register", post(register))
        .route("/verify-email", post(verify_email))
        .route("/login", post(login))
        .route("/reset-password", post(request_password_reset))
        .route("/reset-password/verify", post(verify_password_reset))
        .route("/resend-otp", post(resend_otp))
        .route_layer(middleware::from_fn_with_state(state, rate_limited))
        .route_layer(Extension(RatePolicy {
            endpoint: "auth",
            limit: 50,
            window_secs: 60,
        }))
}

async fn find_user(state: &AppState, user_id: uuid::Uuid) -> Result<User, AppError> {
    state
        .repos
        .users
        .find_by_id(user_id)
        .await?
        .ok_or(AppError::External(StatusCode::NOT_FOUND, "User not found."))
}

#[debug_handler]
async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterPayload>,
) -> Result<impl IntoResponse, AppError> {
    eprintln!("DBG register entry, username raw={:?}", payload.username);
    let vr0 = payload.validate();
    eprintln!("DBG validate err: {:?}", vr0.as_ref().err().map(|e| e.to_string()));
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let username = payload.username.trim().to_lowercase();

    if state
        .repos
        .users
        .find_by_username(&username)
        .await?
        .is_some()
    {
        return Err(AppError::External(
            StatusCode::BAD_REQUEST,
            "User already exists",
        ));
    }

    eprintln!("DBG register passed validation+lookup");
    let password_hash = hash_password(&payload.password)?;
    let user = state
        .repos
        .users
        .create(NewUser {
            username,
            password_hash,
            full_name: payload.full_name,
            qualification: payload.qualification,
            dob: payload.dob,
        })
        .await?;

    issue_otp(&state, &user, OtpPurpose::Register).await?;

    tracing::info!(user_id = %user.id, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse { user_id: user.id }),
    ))
}

#[debug_handler]
async fn verify_email(
    State(state): State<AppState>,
    Json(payload): Json<VerifyEmailPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let user = find_user(&state, payload.user_id).await?;

    if user.is_verified() {
        return Err(AppError::PreconditionFailed("Account already verified."));
    }

    match state.stores.otp.verify(user.id, &payload.code).await? {
        VerifyOutcome::Verified => {
            state.repos.users.mark_verified(user.id).await?;

            tracing::info!(user_id = %user.id, "email verified");

            Ok(Json(serde_json::json!({
                "message": "Email verified successfully."
            })))
        }
        VerifyOutcome::Mismatch => Err(AppError::OtpMismatch),
        VerifyOutcome::Expired => Err(AppError::OtpExpired),
    }
}

#[debug_handler]
async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let username = payload.username.trim().to_lowercase();

    let user = state
        .repos
        .users
        .find_by_username(&username)
        .await?
        .ok_or(AppError::External(
            StatusCode::UNAUTHORIZED,
            "Invalid username or password",
        ))?;

    if !verify_password(&payload.password, &user.password_hash)? {
        return Err(AppError::External(
            StatusCode::UNAUTHORIZED,
            "Invalid username or password",
        ));
    }

    if !user.is_active() {
        return Err(AppError::External(
            StatusCode::FORBIDDEN,
            "Account is suspended",
        ));
    }

    if !user.is_verified() {
        return Err(AppError::External(
            StatusCode::FORBIDDEN,
            "Account not active or email not verified.",
        ));
    }

    let access_token = issue_token(&state.config, user.id, user.role)?;

    state.repos.users.touch_last_login(user.id).await?;

    tracing::info!(user_id = %user.id, "login successful");

    Ok(Json(LoginResponse {
        access_token,
        user: UserSummary {
            id: user.id,
            username: user.username,
            full_name: user.full_name,
            role: user.role.as_str().to_string(),
        },
    }))
}

#[debug_handler]
async fn request_password_reset(
    State(state): State<AppState>,
    Json(payload): Json<RequestPasswordResetPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let username = payload.username.trim().to_lowercase();

    let user = state
        .repos
        .users
        .find_by_username(&username)
        .await?
        .ok_or(AppError::External(StatusCode::NOT_FOUND, "User not found."))?;

    if verify_password(&payload.new_password, &user.password_hash)? {
        return Err(AppError::External(
            StatusCode::BAD_REQUEST,
            "New password cannot be the same as the old password",
        ));
    }

    // Stage before issuing: a code must never exist without its secret.
    let staged_hash = hash_password(&payload.new_password)?;
    state
        .stores
        .otp
        .stage_secret(user.id, &staged_hash, state.config.temp_secret_ttl_secs)
        .await?;

    issue_otp(&state, &user, OtpPurpose::Reset).await?;

    tracing::info!(user_id = %user.id, "password reset requested");

    Ok(Json(serde_json::json!({
        "message": "A code was sent to your email to confirm the password reset.",
        "user_id": user.id,
    })))
}

#[debug_handler]
async fn verify_password_reset(
    State(state): State<AppState>,
    Json(payload): Json<VerifyPasswordResetPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let user = find_user(&state, payload.user_id).await?;

    // Check the staged secret before touching the code: a dead reset must
    // not consume a still-valid code.
    let staged_hash = state
        .stores
        .otp
        .staged_secret(user.id)
        .await?
        .ok_or(AppError::PreconditionFailed(
            "Reset request expired or not started.",
        ))?;

    match state.stores.otp.verify(user.id, &payload.code).await? {
        VerifyOutcome::Verified => {
            state
                .repos
                .users
                .set_password_hash(user.id, &staged_hash)
                .await?;
            state.stores.otp.clear_secret(user.id).await?;

            tracing::info!(user_id = %user.id, "password reset applied");

            Ok(Json(serde_json::json!({
                "message": "Password reset successful"
            })))
        }
        VerifyOutcome::Mismatch => Err(AppError::OtpMismatch),
        VerifyOutcome::Expired => Err(AppError::OtpExpired),
    }
}

#[debug_handler]
async fn resend_otp(
    State(state): State<AppState>,
    Json(payload): Json<ResendOtpPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let user = find_user(&state, payload.user_id).await?;

    // Re-derive flow state from what actually exists right now.
    match payload.context {
        OtpPurpose::Register => {
            if user.is_verified() {
                return Err(AppError::PreconditionFailed("Account already verified."));
            }
        }
        OtpPurpose::Reset => {
            if state.stores.otp.staged_secret(user.id).await?.is_none() {
                return Err(AppError::PreconditionFailed(
                    "No password reset in progress for this user.",
                ));
            }
        }
        OtpPurpose::Delete => {
            if !user.is_verified() {
                return Err(AppError::PreconditionFailed(
                    "Account must be verified to delete it.",
                ));
            }
        }
    }

    issue_otp(&state, &user, payload.context).await?;

    Ok(Json(serde_json::json!({
        "message": "Code sent successfully."
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserStatus;
    use crate::repos::MockUserRepo;
    use crate::services::MockEmailSender;
    use crate::stores::MockOtpStore;
    use crate::test_utils::{TestStateBuilder, mock_unverified_user, mock_user};
    use mockall::predicate::eq;
    use uuid::Uuid;

    fn ready_otp_store() -> MockOtpStore {
        let mut otp = MockOtpStore::new();
        otp.expect_can_resend().returning(|_| Ok(true));
        otp.expect_put_code().returning(|_, _, _| Ok(()));
        otp.expect_lock_resend().returning(|_, _| Ok(()));
        otp
    }

    fn capturing_email(expected_purpose: OtpPurpose) -> MockEmailSender {
        let mut email = MockEmailSender::new();
        email
            .expect_send_otp()
            .withf(move |_, code, purpose| code.len() == 6 && *purpose == expected_purpose)
            .times(1)
            .returning(|_, _, _| Ok(()));
        email
    }

    #[tokio::test]
    async fn register_creates_user_and_emails_a_code() {
        let user = mock_unverified_user("new@example.com");
        let created = user.clone();

        let mut users = MockUserRepo::new();
        users.expect_find_by_username().returning(|_| Ok(None));
        users
            .expect_create()
            .withf(|new_user| new_user.username == "new@example.com")
            .returning(move |_| Ok(created.clone()));

        let state = TestStateBuilder::new()
            .with_user_repo(users)
            .with_otp_store(ready_otp_store())
            .with_email_sender(capturing_email(OtpPurpose::Register))
            .build();

        let payload = RegisterPayload {
            // Mixed case and whitespace are normalized before lookup.
            username: " New@Example.com ".into(),
            password: "password123".into(),
            full_name: "New User".into(),
            qualification: None,
            dob: None,
        };

        let response = register(State(state), Json(payload))
            .await
            .unwrap()
            .into_response();

        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn register_rejects_existing_username() {
        let existing = mock_user("taken@example.com");

        let mut users = MockUserRepo::new();
        users
            .expect_find_by_username()
            .returning(move |_| Ok(Some(existing.clone())));

        let state = TestStateBuilder::new().with_user_repo(users).build();

        let payload = RegisterPayload {
            username: "taken@example.com".into(),
            password: "password123".into(),
            full_name: "Dup".into(),
            qualification: None,
            dob: None,
        };

        let result = register(State(state), Json(payload)).await;

        let Err(AppError::External(status, _)) = result else {
            panic!("Expected External error");
        };
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn verify_email_activates_the_account() {
        let user = mock_unverified_user("new@example.com");
        let user_id = user.id;

        let mut users = MockUserRepo::new();
        let found = user.clone();
        users
            .expect_find_by_id()
            .returning(move |_| Ok(Some(found.clone())));
        users
            .expect_mark_verified()
            .with(eq(user_id))
            .times(1)
            .returning(|_| Ok(true));

        let mut otp = MockOtpStore::new();
        otp.expect_verify()
            .with(eq(user_id), eq("123456"))
            .returning(|_, _| Ok(VerifyOutcome::Verified));

        let state = TestStateBuilder::new()
            .with_user_repo(users)
            .with_otp_store(otp)
            .build();

        let payload = VerifyEmailPayload {
            user_id,
            code: "123456".into(),
        };

        let response = verify_email(State(state), Json(payload))
            .await
            .unwrap()
            .into_response();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn verify_email_reports_mismatch_and_expiry_distinctly() {
        for (outcome, expect_mismatch) in [
            (VerifyOutcome::Mismatch, true),
            (VerifyOutcome::Expired, false),
        ] {
            let user = mock_unverified_user("new@example.com");
            let user_id = user.id;

            let mut users = MockUserRepo::new();
            users
                .expect_find_by_id()
                .returning(move |_| Ok(Some(user.clone())));

            let mut otp = MockOtpStore::new();
            otp.expect_verify().returning(move |_, _| Ok(outcome));

            let state = TestStateBuilder::new()
                .with_user_repo(users)
                .with_otp_store(otp)
                .build();

            let payload = VerifyEmailPayload {
                user_id,
                code: "999999".into(),
            };

            let result = verify_email(State(state), Json(payload)).await;

            match (result, expect_mismatch) {
                (Err(AppError::OtpMismatch), true) => {}
                (Err(AppError::OtpExpired), false) => {}
                _ => panic!("wrong error for {:?}", outcome),
            }
        }
    }

    #[tokio::test]
    async fn verify_email_rejects_already_verified_accounts() {
        let user = mock_user("done@example.com");
        let user_id = user.id;

        let mut users = MockUserRepo::new();
        users
            .expect_find_by_id()
            .returning(move |_| Ok(Some(user.clone())));

        // The code must not be consumed for an already-verified account.
        let mut otp = MockOtpStore::new();
        otp.expect_verify().times(0);

        let state = TestStateBuilder::new()
            .with_user_repo(users)
            .with_otp_store(otp)
            .build();

        let payload = VerifyEmailPayload {
            user_id,
            code: "123456".into(),
        };

        let result = verify_email(State(state), Json(payload)).await;

        assert!(matches!(result, Err(AppError::PreconditionFailed(_))));
    }

    #[tokio::test]
    async fn login_returns_a_token_for_valid_credentials() {
        let mut user = mock_user("login@example.com");
        user.password_hash = hash_password("password123").unwrap();
        let user_id = user.id;

        let mut users = MockUserRepo::new();
        users
            .expect_find_by_username()
            .with(eq("login@example.com"))
            .returning(move |_| Ok(Some(user.clone())));
        users
            .expect_touch_last_login()
            .with(eq(user_id))
            .times(1)
            .returning(|_| Ok(()));

        let state = TestStateBuilder::new().with_user_repo(users).build();

        let payload = LoginPayload {
            username: "login@example.com".into(),
            password: "password123".into(),
        };

        let response = login(State(state), Json(payload))
            .await
            .unwrap()
            .into_response();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn login_rejects_wrong_password() {
        let mut user = mock_user("login@example.com");
        user.password_hash = hash_password("password123").unwrap();

        let mut users = MockUserRepo::new();
        users
            .expect_find_by_username()
            .returning(move |_| Ok(Some(user.clone())));

        let state = TestStateBuilder::new().with_user_repo(users).build();

        let payload = LoginPayload {
            username: "login@example.com".into(),
            password: "wrong password1".into(),
        };

        let result = login(State(state), Json(payload)).await;

        let Err(AppError::External(status, _)) = result else {
            panic!("Expected External error");
        };
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn login_rejects_suspended_accounts() {
        let mut user = mock_user("banned@example.com");
        user.password_hash = hash_password("password123").unwrap();
        user.status = UserStatus::Suspended;

        let mut users = MockUserRepo::new();
        users
            .expect_find_by_username()
            .returning(move |_| Ok(Some(user.clone())));

        let state = TestStateBuilder::new().with_user_repo(users).build();

        let payload = LoginPayload {
            username: "banned@example.com".into(),
            password: "password123".into(),
        };

        let result = login(State(state), Json(payload)).await;

        let Err(AppError::External(status, msg)) = result else {
            panic!("Expected External error");
        };
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(msg.contains("suspended"));
    }

    #[tokio::test]
    async fn reset_request_stages_the_secret_before_issuing_the_code() {
        let mut user = mock_user("reset@example.com");
        user.password_hash = hash_password("old password1").unwrap();
        let user_id = user.id;

        let mut users = MockUserRepo::new();
        users
            .expect_find_by_username()
            .returning(move |_| Ok(Some(user.clone())));

        let mut otp = ready_otp_store();
        otp.expect_stage_secret()
            .withf(move |id, hash, ttl| {
                *id == user_id && hash.starts_with("$argon2") && *ttl == 300
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let state = TestStateBuilder::new()
            .with_user_repo(users)
            .with_otp_store(otp)
            .with_email_sender(capturing_email(OtpPurpose::Reset))
            .build();

        let payload = RequestPasswordResetPayload {
            username: "reset@example.com".into(),
            new_password: "brand new pass1".into(),
            confirm_password: "brand new pass1".into(),
        };

        let response = request_password_reset(State(state), Json(payload))
            .await
            .unwrap()
            .into_response();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn reset_request_rejects_reusing_the_current_password() {
        let mut user = mock_user("reset@example.com");
        user.password_hash = hash_password("same password1").unwrap();

        let mut users = MockUserRepo::new();
        users
            .expect_find_by_username()
            .returning(move |_| Ok(Some(user.clone())));

        let state = TestStateBuilder::new().with_user_repo(users).build();

        let payload = RequestPasswordResetPayload {
            username: "reset@example.com".into(),
            new_password: "same password1".into(),
            confirm_password: "same password1".into(),
        };

        let result = request_password_reset(State(state), Json(payload)).await;

        let Err(AppError::External(status, _)) = result else {
            panic!("Expected External error");
        };
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn reset_verify_applies_the_staged_hash_and_clears_it() {
        let user = mock_user("reset@example.com");
        let user_id = user.id;

        let mut users = MockUserRepo::new();
        users
            .expect_find_by_id()
            .returning(move |_| Ok(Some(user.clone())));
        users
            .expect_set_password_hash()
            .with(eq(user_id), eq("staged-hash"))
            .times(1)
            .returning(|_, _| Ok(true));

        let mut otp = MockOtpStore::new();
        otp.expect_staged_secret()
            .returning(|_| Ok(Some("staged-hash".into())));
        otp.expect_verify()
            .with(eq(user_id), eq("123456"))
            .returning(|_, _| Ok(VerifyOutcome::Verified));
        otp.expect_clear_secret()
            .with(eq(user_id))
            .times(1)
            .returning(|_| Ok(()));

        let state = TestStateBuilder::new()
            .with_user_repo(users)
            .with_otp_store(otp)
            .build();

        let payload = VerifyPasswordResetPayload {
            user_id,
            code: "123456".into(),
        };

        let response = verify_password_reset(State(state), Json(payload))
            .await
            .unwrap()
            .into_response();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn reset_verify_without_staged_secret_leaves_the_code_alone() {
        let user = mock_user("reset@example.com");
        let user_id = user.id;

        let mut users = MockUserRepo::new();
        users
            .expect_find_by_id()
            .returning(move |_| Ok(Some(user.clone())));

        let mut otp = MockOtpStore::new();
        otp.expect_staged_secret().returning(|_| Ok(None));
        // A valid code must survive an expired reset request.
        otp.expect_verify().times(0);

        let state = TestStateBuilder::new()
            .with_user_repo(users)
            .with_otp_store(otp)
            .build();

        let payload = VerifyPasswordResetPayload {
            user_id,
            code: "123456".into(),
        };

        let result = verify_password_reset(State(state), Json(payload)).await;

        assert!(matches!(result, Err(AppError::PreconditionFailed(_))));
    }

    #[tokio::test]
    async fn resend_is_blocked_while_a_code_is_live() {
        let user = mock_unverified_user("new@example.com");
        let user_id = user.id;

        let mut users = MockUserRepo::new();
        users
            .expect_find_by_id()
            .returning(move |_| Ok(Some(user.clone())));

        let mut otp = MockOtpStore::new();
        otp.expect_can_resend().returning(|_| Ok(false));
        otp.expect_resend_ttl().returning(|_| Ok(37));

        let state = TestStateBuilder::new()
            .with_user_repo(users)
            .with_otp_store(otp)
            .build();

        let payload = ResendOtpPayload {
            user_id,
            context: OtpPurpose::Register,
        };

        let result = resend_otp(State(state), Json(payload)).await;

        let Err(AppError::ResendCooldown { retry_after_secs }) = result else {
            panic!("Expected ResendCooldown");
        };
        assert_eq!(retry_after_secs, 37);
    }

    #[tokio::test]
    async fn resend_quotes_the_full_cooldown_when_the_lock_is_gone() {
        let user = mock_unverified_user("new@example.com");
        let user_id = user.id;

        let mut users = MockUserRepo::new();
        users
            .expect_find_by_id()
            .returning(move |_| Ok(Some(user.clone())));

        // Code still live but lock already expired (the writes are not
        // jointly atomic); the hint falls back to the configured cooldown.
        let mut otp = MockOtpStore::new();
        otp.expect_can_resend().returning(|_| Ok(false));
        otp.expect_resend_ttl().returning(|_| Ok(-2));

        let state = TestStateBuilder::new()
            .with_user_repo(users)
            .with_otp_store(otp)
            .build();

        let payload = ResendOtpPayload {
            user_id,
            context: OtpPurpose::Register,
        };

        let result = resend_otp(State(state), Json(payload)).await;

        let Err(AppError::ResendCooldown { retry_after_secs }) = result else {
            panic!("Expected ResendCooldown");
        };
        assert_eq!(retry_after_secs, 60);
    }

    #[tokio::test]
    async fn resend_for_register_rejects_verified_accounts() {
        let user = mock_user("done@example.com");
        let user_id = user.id;

        let mut users = MockUserRepo::new();
        users
            .expect_find_by_id()
            .returning(move |_| Ok(Some(user.clone())));

        let state = TestStateBuilder::new().with_user_repo(users).build();

        let payload = ResendOtpPayload {
            user_id,
            context: OtpPurpose::Register,
        };

        let result = resend_otp(State(state), Json(payload)).await;

        assert!(matches!(result, Err(AppError::PreconditionFailed(_))));
    }

    #[tokio::test]
    async fn resend_for_reset_requires_a_staged_secret() {
        let user = mock_user("reset@example.com");
        let user_id = user.id;

        let mut users = MockUserRepo::new();
        users
            .expect_find_by_id()
            .returning(move |_| Ok(Some(user.clone())));

        let mut otp = MockOtpStore::new();
        otp.expect_staged_secret().returning(|_| Ok(None));

        let state = TestStateBuilder::new()
            .with_user_repo(users)
            .with_otp_store(otp)
            .build();

        let payload = ResendOtpPayload {
            user_id,
            context: OtpPurpose::Reset,
        };

        let result = resend_otp(State(state), Json(payload)).await;

        assert!(matches!(result, Err(AppError::PreconditionFailed(_))));
    }

    #[tokio::test]
    async fn resend_succeeds_once_the_previous_code_expired() {
        let user = mock_unverified_user("new@example.com");
        let user_id = user.id;

        let mut users = MockUserRepo::new();
        users
            .expect_find_by_id()
            .returning(move |_| Ok(Some(user.clone())));

        let state = TestStateBuilder::new()
            .with_user_repo(users)
            .with_otp_store(ready_otp_store())
            .with_email_sender(capturing_email(OtpPurpose::Register))
            .build();

        let payload = ResendOtpPayload {
            user_id,
            context: OtpPurpose::Register,
        };

        let response = resend_otp(State(state), Json(payload))
            .await
            .unwrap()
            .into_response();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
