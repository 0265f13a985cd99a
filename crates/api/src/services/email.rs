//! Email sending abstraction.
//!
//! Uses Resend in production, SMTP (lettre) in development.
//! This allows local development without a Resend account.

use anyhow::Result;
use async_trait::async_trait;
use lettre::{
    Message, SmtpTransport, Transport,
    message::{Mailbox, header::ContentType},
};
use resend_rs::types::CreateEmailBaseOptions;
use shared::api::OtpPurpose;

const FROM_NAME: &str = "Quizmaster";
const FROM_ADDR: &str = "noreply@mail.quizmaster.app";

/// Sends one-time codes to users.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Send a one-time code for the given flow.
    async fn send_otp(&self, to: &str, code: &str, purpose: OtpPurpose) -> Result<()>;
}

fn subject_line(purpose: OtpPurpose) -> &'static str {
    match purpose {
        OtpPurpose::Register => "Verify your Quizmaster account",
        OtpPurpose::Reset => "Your Quizmaster password reset code",
        OtpPurpose::Delete => "Confirm your Quizmaster account deletion",
    }
}

fn body_text(code: &str, purpose: OtpPurpose) -> String {
    let action = match purpose {
        OtpPurpose::Register => "verify your email address",
        OtpPurpose::Reset => "reset your password",
        OtpPurpose::Delete => "delete your account",
    };
    format!(
        "Your code to {} is: {}\n\nThis code expires in 5 minutes. If you did not request it, you can ignore this email.",
        action, code
    )
}

/// Email sender implementation, chosen from config.
pub enum EmailSenderImpl {
    /// SMTP-based sender using lettre (for development)
    Smtp(SmtpSender),
    /// Resend API sender (for production)
    Resend(ResendSender),
}

impl EmailSenderImpl {
    /// Create a new email sender based on config.
    /// Uses Resend if an api key is provided, otherwise falls back to SMTP.
    pub fn new(resend_api_key: Option<String>, smtp_url: Option<String>) -> Result<Self> {
        if let Some(api_key) = resend_api_key.filter(|k| !k.is_empty()) {
            Ok(Self::Resend(ResendSender::new(api_key)))
        } else if let Some(url) = smtp_url.filter(|u| !u.is_empty()) {
            Ok(Self::Smtp(SmtpSender::new(url)?))
        } else {
            anyhow::bail!("Either RESEND_API_KEY or SMTP_URL must be configured")
        }
    }
}

#[async_trait]
impl EmailSender for EmailSenderImpl {
    async fn send_otp(&self, to: &str, code: &str, purpose: OtpPurpose) -> Result<()> {
        match self {
            Self::Resend(sender) => sender.send_otp(to, code, purpose).await,
            Self::Smtp(sender) => sender.send_otp(to, code, purpose),
        }
    }
}

/// SMTP sender using lettre.
pub struct SmtpSender {
    transport: SmtpTransport,
}

impl SmtpSender {
    pub fn new(smtp_url: String) -> Result<Self> {
        let transport = SmtpTransport::from_url(&smtp_url)?.build();

        Ok(Self { transport })
    }

    pub fn send_otp(&self, to: &str, code: &str, purpose: OtpPurpose) -> Result<()> {
        let email = Message::builder()
            .from(Mailbox::new(
                Some(FROM_NAME.to_owned()),
                FROM_ADDR.parse()?,
            ))
            .to(Mailbox::new(None, to.parse()?))
            .subject(subject_line(purpose))
            .header(ContentType::TEXT_PLAIN)
            .body(body_text(code, purpose))?;

        self.transport.send(&email)?;

        Ok(())
    }
}

/// Resend API sender.
pub struct ResendSender {
    client: resend_rs::Resend,
}

impl ResendSender {
    pub fn new(api_key: String) -> Self {
        Self {
            client: resend_rs::Resend::new(&api_key),
        }
    }

    pub async fn send_otp(&self, to: &str, code: &str, purpose: OtpPurpose) -> Result<()> {
        let email = CreateEmailBaseOptions::new(
            format!("{} <{}>", FROM_NAME, FROM_ADDR),
            [to],
            subject_line(purpose),
        )
        .with_text(&body_text(code, purpose));

        self.client.emails.send(email).await?;

        Ok(())
    }
}
