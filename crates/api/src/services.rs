//! External service abstractions.
//!
//! This module contains traits and implementations for external services
//! that the API depends on, each behind a trait to enable mocking in tests.
//!
//! ## Services
//!
//! - **email** - One-time code delivery via Resend (prod) or SMTP (dev)
//!
//! ## Usage in Handlers
//!
//! Services are accessed via `AppState`:
//!
//! ```ignore
//! async fn handler(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
//!     state.email.send_otp(&user.username, &code, OtpPurpose::Register).await?;
//! }
//! ```

mod email;

pub use email::{EmailSender, EmailSenderImpl};

#[cfg(test)]
pub use email::MockEmailSender;
