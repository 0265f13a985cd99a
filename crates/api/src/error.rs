use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

#[derive(Debug)]
pub enum AppError {
    /// Internal errors - logged but return generic 500 to user.
    /// Store connectivity failures end up here: a request must not proceed
    /// unthrottled or unguarded just because the store is down.
    Internal(anyhow::Error),
    /// User-facing errors - message is safe to show
    External(StatusCode, &'static str),
    /// Validation errors - safe to show
    Validation(String),
    /// A flow was invoked in a state that does not permit it
    /// (e.g. verifying an already-verified account).
    PreconditionFailed(&'static str),
    /// Fixed-window rate limit hit for this client and endpoint.
    RateLimited { retry_after_secs: i64 },
    /// A one-time code is still live for this user; includes the remaining
    /// cooldown before a new one may be requested.
    ResendCooldown { retry_after_secs: i64 },
    /// No live one-time code exists for this user.
    OtpExpired,
    /// A live code exists but the submitted one does not match.
    OtpMismatch,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Internal(err) => {
                tracing::error!("internal error: {:?}", err);
                sentry::capture_error(
                    err.as_ref() as &(dyn std::error::Error + Send + Sync + 'static)
                );

                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
            AppError::External(status, msg) => (status, msg).into_response(),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            AppError::PreconditionFailed(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            AppError::RateLimited { retry_after_secs } => (
                StatusCode::TOO_MANY_REQUESTS,
                Json(serde_json::json!({
                    "error": "Too many requests. Try again later.",
                    "retry_after_secs": retry_after_secs,
                })),
            )
                .into_response(),
            AppError::ResendCooldown { retry_after_secs } => (
                StatusCode::TOO_MANY_REQUESTS,
                Json(serde_json::json!({
                    "error": format!(
                        "Please wait {} seconds before requesting another code.",
                        retry_after_secs
                    ),
                    "cooldown": retry_after_secs,
                })),
            )
                .into_response(),
            AppError::OtpExpired => {
                (StatusCode::BAD_REQUEST, "Code expired or not requested.").into_response()
            }
            AppError::OtpMismatch => (StatusCode::BAD_REQUEST, "Invalid code.").into_response(),
        }
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::Internal(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn response_body(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn internal_error_returns_500_generic_message() {
        let err = AppError::Internal(anyhow::anyhow!("redis connection refused"));
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response_body(response).await, "Internal server error");
    }

    #[tokio::test]
    async fn internal_error_hides_sensitive_details() {
        let err = AppError::Internal(anyhow::anyhow!("password=secret123 leaked"));
        let response = err.into_response();

        let body = response_body(response).await;

        assert!(!body.contains("secret123"));
        assert!(!body.contains("password"));
    }

    #[tokio::test]
    async fn external_error_returns_specified_status_and_message() {
        let err = AppError::External(StatusCode::NOT_FOUND, "Chapter not found");
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response_body(response).await, "Chapter not found");
    }

    #[tokio::test]
    async fn validation_error_returns_400_with_details() {
        let err = AppError::Validation("username: invalid format".into());
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response_body(response).await, "username: invalid format");
    }

    #[tokio::test]
    async fn rate_limited_carries_machine_readable_retry_hint() {
        let err = AppError::RateLimited {
            retry_after_secs: 42,
        };
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let body: serde_json::Value =
            serde_json::from_str(&response_body(response).await).unwrap();
        assert_eq!(body["retry_after_secs"], 42);
    }

    #[tokio::test]
    async fn resend_cooldown_reports_remaining_seconds() {
        let err = AppError::ResendCooldown {
            retry_after_secs: 37,
        };
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let body: serde_json::Value =
            serde_json::from_str(&response_body(response).await).unwrap();
        assert_eq!(body["cooldown"], 37);
        assert!(body["error"].as_str().unwrap().contains("37 seconds"));
    }

    #[tokio::test]
    async fn otp_failures_are_never_conflated() {
        let expired = AppError::OtpExpired.into_response();
        let mismatch = AppError::OtpMismatch.into_response();

        assert_eq!(expired.status(), StatusCode::BAD_REQUEST);
        assert_eq!(mismatch.status(), StatusCode::BAD_REQUEST);

        let expired_body = response_body(expired).await;
        let mismatch_body = response_body(mismatch).await;
        assert_ne!(expired_body, mismatch_body);
    }

    #[tokio::test]
    async fn io_error_converts_to_internal() {
        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "store down");
        let err: AppError = io_err.into();

        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
