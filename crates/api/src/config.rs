use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub redis_url: String,
    /// Secret for signing access tokens.
    pub jwt_secret: String,
    /// Access token lifetime in seconds.
    #[serde(default = "default_jwt_ttl_secs")]
    pub jwt_ttl_secs: i64,
    /// SMTP URL for development email (e.g., smtp://localhost:1025)
    #[serde(default)]
    pub smtp_url: Option<String>,
    /// Resend API key for production email
    #[serde(default)]
    pub resend_api_key: Option<String>,
    /// Set to "production" for JSON logging, anything else for human-readable.
    #[serde(default)]
    pub env: String,
    /// Sentry DSN for error tracking
    #[serde(default)]
    pub sentry_dsn: Option<String>,
    /// Timeout applied to every call against the expiring store.
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
    /// Lifetime of a one-time code.
    #[serde(default = "default_otp_ttl_secs")]
    pub otp_ttl_secs: u64,
    /// Cooldown between code issuances for the same user.
    #[serde(default = "default_resend_cooldown_secs")]
    pub resend_cooldown_secs: u64,
    /// Lifetime of a staged password during a reset flow.
    #[serde(default = "default_temp_secret_ttl_secs")]
    pub temp_secret_ttl_secs: u64,
}

fn default_jwt_ttl_secs() -> i64 {
    24 * 60 * 60
}

fn default_store_timeout_ms() -> u64 {
    2_000
}

fn default_otp_ttl_secs() -> u64 {
    300
}

fn default_resend_cooldown_secs() -> u64 {
    60
}

fn default_temp_secret_ttl_secs() -> u64 {
    300
}

impl Config {
    pub fn is_production(&self) -> bool {
        self.env == "production"
    }
}
