//! One-time code storage for Redis.
//!
//! At most one live code exists per user, shared by the register, reset and
//! delete flows. A short-lived resend lock provides the cooldown hint, and
//! the reset flow stages its pending password hash alongside the code.
//!
//! The code and its companion keys are written separately; a crash between
//! writes can leave one without the other, so every check re-derives state
//! from current key existence instead of trusting anything remembered.

use anyhow::Result;
use async_trait::async_trait;
use rand::Rng;
use uuid::Uuid;

use super::client::StoreClient;

/// Codes are fixed-length numeric strings.
pub const CODE_LEN: usize = 6;

/// Value stored under the resend lock key; only existence matters.
const LOCK_SENTINEL: &str = "locked";

fn code_key(user_id: Uuid) -> String {
    format!("email_otp:{}", user_id)
}

fn resend_lock_key(user_id: Uuid) -> String {
    format!("resend_otp_lock:{}", user_id)
}

fn temp_secret_key(user_id: Uuid) -> String {
    format!("reset_pass:{}", user_id)
}

/// Generate a random code of [`CODE_LEN`] digits. Leading zeros are valid.
pub fn generate_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LEN)
        .map(|_| rng.random_range(0..10).to_string())
        .collect()
}

/// Result of checking a submitted code against the stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// Codes matched; the stored record has been consumed.
    Verified,
    /// A live code exists but the submitted one differs. The record stays
    /// valid for further attempts until its TTL runs out.
    Mismatch,
    /// No live code for this user (never issued, expired, or already used).
    Expired,
}

fn classify(stored: Option<&str>, submitted: &str) -> VerifyOutcome {
    match stored {
        None => VerifyOutcome::Expired,
        Some(code) if code == submitted => VerifyOutcome::Verified,
        Some(_) => VerifyOutcome::Mismatch,
    }
}

/// Store for one-time codes and their companion keys.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OtpStore: Send + Sync {
    /// Store a code for the user with TTL, replacing any previous one.
    async fn put_code(&self, user_id: Uuid, code: &str, ttl_secs: u64) -> Result<()>;

    /// Check a submitted code. On a match the record is deleted before
    /// returning, so a given code verifies at most once.
    async fn verify(&self, user_id: Uuid, submitted: &str) -> Result<VerifyOutcome>;

    /// True iff no live code exists for the user. Resends are gated on the
    /// code itself, not the lock; the lock only feeds the cooldown hint.
    async fn can_resend(&self, user_id: Uuid) -> Result<bool>;

    /// Remaining cooldown seconds; negative when the lock is gone.
    async fn resend_ttl(&self, user_id: Uuid) -> Result<i64>;

    /// Arm the resend cooldown.
    async fn lock_resend(&self, user_id: Uuid, cooldown_secs: u64) -> Result<()>;

    /// Stage the pending secret for a reset flow.
    async fn stage_secret(&self, user_id: Uuid, secret: &str, ttl_secs: u64) -> Result<()>;

    /// Read the staged secret without consuming it.
    async fn staged_secret(&self, user_id: Uuid) -> Result<Option<String>>;

    /// Drop the staged secret (after it has been applied).
    async fn clear_secret(&self, user_id: Uuid) -> Result<()>;
}

/// Redis implementation of OtpStore.
#[derive(Clone)]
pub struct RedisOtpStore {
    store: StoreClient,
}

impl RedisOtpStore {
    pub fn new(store: StoreClient) -> Self {
        Self { store }
    }
}

#[async_trait]
impl OtpStore for RedisOtpStore {
    async fn put_code(&self, user_id: Uuid, code: &str, ttl_secs: u64) -> Result<()> {
        self.store
            .set_with_ttl(&code_key(user_id), code, ttl_secs)
            .await
    }

    async fn verify(&self, user_id: Uuid, submitted: &str) -> Result<VerifyOutcome> {
        let key = code_key(user_id);
        let stored = self.store.get(&key).await?;

        match classify(stored.as_deref(), submitted) {
            VerifyOutcome::Verified => {
                // DEL arbitrates concurrent verifies: whoever actually
                // removed the key wins, everyone else sees it as gone.
                let deleted = self.store.delete(&[key]).await?;
                if deleted == 0 {
                    return Ok(VerifyOutcome::Expired);
                }
                Ok(VerifyOutcome::Verified)
            }
            outcome => Ok(outcome),
        }
    }

    async fn can_resend(&self, user_id: Uuid) -> Result<bool> {
        let exists = self.store.exists(&code_key(user_id)).await?;
        Ok(!exists)
    }

    async fn resend_ttl(&self, user_id: Uuid) -> Result<i64> {
        self.store.ttl(&resend_lock_key(user_id)).await
    }

    async fn lock_resend(&self, user_id: Uuid, cooldown_secs: u64) -> Result<()> {
        self.store
            .set_with_ttl(&resend_lock_key(user_id), LOCK_SENTINEL, cooldown_secs)
            .await
    }

    async fn stage_secret(&self, user_id: Uuid, secret: &str, ttl_secs: u64) -> Result<()> {
        self.store
            .set_with_ttl(&temp_secret_key(user_id), secret, ttl_secs)
            .await
    }

    async fn staged_secret(&self, user_id: Uuid) -> Result<Option<String>> {
        self.store.get(&temp_secret_key(user_id)).await
    }

    async fn clear_secret(&self, user_id: Uuid) -> Result<()> {
        self.store.delete(&[temp_secret_key(user_id)]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_are_six_digits() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), CODE_LEN);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn key_formats_match_stored_state() {
        let id = Uuid::nil();
        assert_eq!(
            code_key(id),
            "email_otp:00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(
            resend_lock_key(id),
            "resend_otp_lock:00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(
            temp_secret_key(id),
            "reset_pass:00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn missing_record_is_expired_not_mismatch() {
        assert_eq!(classify(None, "123456"), VerifyOutcome::Expired);
    }

    #[test]
    fn wrong_code_is_mismatch() {
        assert_eq!(classify(Some("123456"), "654321"), VerifyOutcome::Mismatch);
    }

    #[test]
    fn matching_code_verifies() {
        assert_eq!(classify(Some("123456"), "123456"), VerifyOutcome::Verified);
    }

    #[test]
    fn leading_zeros_are_significant() {
        assert_eq!(classify(Some("012345"), "12345"), VerifyOutcome::Mismatch);
    }
}
