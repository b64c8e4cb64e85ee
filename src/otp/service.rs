//! OTP issuance and verification.
//!
//! Two independent controls close two distinct attack surfaces: the send
//! window stops passcode-flooding a victim's inbox, the attempt counter
//! stops brute-forcing a known-outstanding code.

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use rand::{Rng, RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::warn;

use super::models::{ClientMeta, OtpPurpose};
use super::repo;
use crate::notify::{OtpMessage, OtpSender, dispatch};

pub const OTP_CODE_LEN: u32 = 6;
pub const MAX_VERIFY_ATTEMPTS: i32 = 5;

const DEFAULT_LOGIN_TTL_SECONDS: i64 = 5 * 60;
const DEFAULT_RESET_TTL_SECONDS: i64 = 10 * 60;
const DEFAULT_SEND_WINDOW_SECONDS: i64 = 15 * 60;
const DEFAULT_LOGIN_SEND_LIMIT: i64 = 5;
const DEFAULT_RESET_SEND_LIMIT: i64 = 3;
const DEFAULT_IP_SEND_LIMIT: i64 = 20;
const DEFAULT_EXCHANGE_TTL_SECONDS: i64 = 10 * 60;

#[derive(Debug, Error)]
pub enum OtpError {
    #[error("Rate limited")]
    RateLimited,
    #[error("Invalid code")]
    Invalid,
    #[error("Code expired")]
    Expired,
    #[error("Code locked")]
    Locked,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

#[derive(Clone, Copy, Debug)]
pub struct OtpConfig {
    login_ttl_seconds: i64,
    reset_ttl_seconds: i64,
    send_window_seconds: i64,
    login_send_limit: i64,
    reset_send_limit: i64,
    ip_send_limit: i64,
    exchange_ttl_seconds: i64,
}

impl OtpConfig {
    /// Defaults: login codes 5 minutes / 5 sends per 15 minutes, reset codes
    /// 10 minutes / 3 sends per 15 minutes, 20 sends per IP as a looser
    /// secondary bound.
    #[must_use]
    pub fn new() -> Self {
        Self {
            login_ttl_seconds: DEFAULT_LOGIN_TTL_SECONDS,
            reset_ttl_seconds: DEFAULT_RESET_TTL_SECONDS,
            send_window_seconds: DEFAULT_SEND_WINDOW_SECONDS,
            login_send_limit: DEFAULT_LOGIN_SEND_LIMIT,
            reset_send_limit: DEFAULT_RESET_SEND_LIMIT,
            ip_send_limit: DEFAULT_IP_SEND_LIMIT,
            exchange_ttl_seconds: DEFAULT_EXCHANGE_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_login_ttl_seconds(mut self, seconds: i64) -> Self {
        self.login_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_reset_ttl_seconds(mut self, seconds: i64) -> Self {
        self.reset_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_send_window_seconds(mut self, seconds: i64) -> Self {
        self.send_window_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_login_send_limit(mut self, limit: i64) -> Self {
        self.login_send_limit = limit;
        self
    }

    #[must_use]
    pub fn with_reset_send_limit(mut self, limit: i64) -> Self {
        self.reset_send_limit = limit;
        self
    }

    const fn ttl_seconds(&self, purpose: OtpPurpose) -> i64 {
        match purpose {
            OtpPurpose::Login => self.login_ttl_seconds,
            OtpPurpose::PasswordReset => self.reset_ttl_seconds,
        }
    }

    const fn send_limit(&self, purpose: OtpPurpose) -> i64 {
        match purpose {
            OtpPurpose::Login => self.login_send_limit,
            OtpPurpose::PasswordReset => self.reset_send_limit,
        }
    }
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of a send request: whether the dispatch attempt completed, never
/// whether the identifier maps to an account.
#[derive(Clone, Copy, Debug)]
pub struct SendOutcome {
    pub delivered: bool,
}

/// Proof that an identifier just completed OTP verification for a purpose.
#[derive(Clone, Debug)]
pub struct OtpVerification {
    pub exchange_token: String,
}

#[derive(Clone)]
pub struct OtpService {
    pool: PgPool,
    sender: Arc<dyn OtpSender>,
    config: OtpConfig,
}

impl OtpService {
    #[must_use]
    pub fn new(pool: PgPool, sender: Arc<dyn OtpSender>, config: OtpConfig) -> Self {
        Self {
            pool,
            sender,
            config,
        }
    }

    /// Issue a code and hand it to the notifier.
    ///
    /// Behavior is identical whether or not the identifier belongs to an
    /// account; only the rate limit produces a distinguishable rejection.
    /// The row is committed before dispatch, so a failed or slow delivery is
    /// reported but never rolled back.
    ///
    /// # Errors
    /// `RateLimited` when the send window is exhausted; `Store` on database
    /// failure.
    pub async fn send(
        &self,
        identifier: &str,
        purpose: OtpPurpose,
        client: &ClientMeta,
    ) -> Result<SendOutcome, OtpError> {
        // Per-identifier window is the authoritative control and fails
        // closed; the per-IP window is defense-in-depth and fails open.
        let sends = repo::count_recent_sends(
            &self.pool,
            identifier,
            purpose,
            self.config.send_window_seconds,
        )
        .await
        .map_err(|err| {
            warn!("otp send-window check failed: {err}");
            OtpError::RateLimited
        })?;
        if sends >= self.config.send_limit(purpose) {
            return Err(OtpError::RateLimited);
        }

        if let Some(ip) = client.ip.as_deref() {
            match repo::count_recent_sends_from_ip(&self.pool, ip, self.config.send_window_seconds)
                .await
            {
                Ok(count) if count >= self.config.ip_send_limit => {
                    return Err(OtpError::RateLimited);
                }
                Ok(_) => {}
                Err(err) => warn!("otp ip-window check failed: {err}"),
            }
        }

        let code = generate_code()?;
        let code_hash = hash_code(&code);

        let mut tx = self
            .pool
            .begin()
            .await
            .context("begin otp send transaction")?;
        repo::supersede_outstanding(&mut tx, identifier, purpose).await?;
        repo::insert_code(
            &mut tx,
            identifier,
            purpose,
            &code_hash,
            self.config.ttl_seconds(purpose),
            client,
        )
        .await?;
        tx.commit().await.context("commit otp send transaction")?;

        let delivered = dispatch(
            self.sender.clone(),
            OtpMessage {
                destination: identifier.to_string(),
                code,
                purpose,
            },
        )
        .await;

        Ok(SendOutcome { delivered })
    }

    /// Verify a presented code against the latest outstanding issuance.
    ///
    /// # Errors
    /// `Invalid` for no/used/mismatched code, `Expired` past the ttl,
    /// `Locked` once the attempt counter is exhausted (a later correct code
    /// still fails until a new send).
    pub async fn verify(
        &self,
        identifier: &str,
        code: &str,
        purpose: OtpPurpose,
    ) -> Result<OtpVerification, OtpError> {
        let Some(record) = repo::latest_outstanding(&self.pool, identifier, purpose).await? else {
            return Err(OtpError::Invalid);
        };

        // Terminal states reject without touching the counter.
        if record.used {
            return Err(OtpError::Invalid);
        }
        if record.attempts >= MAX_VERIFY_ATTEMPTS {
            return Err(OtpError::Locked);
        }
        if record.expires_at <= Utc::now() {
            return Err(OtpError::Expired);
        }

        let presented = hash_code(code);
        let matches: bool = presented
            .as_slice()
            .ct_eq(record.code_hash.as_slice())
            .into();
        if !matches {
            let attempts = repo::register_failed_attempt(&self.pool, record.id).await?;
            if attempts >= MAX_VERIFY_ATTEMPTS {
                return Err(OtpError::Locked);
            }
            return Err(OtpError::Invalid);
        }

        // Atomic consume: a concurrent verification of the same code loses
        // here and is rejected.
        if !repo::consume(&self.pool, record.id).await? {
            return Err(OtpError::Invalid);
        }

        let exchange_token = generate_exchange_secret()?;
        repo::insert_exchange_token(
            &self.pool,
            identifier,
            purpose,
            &hash_code(&exchange_token),
            self.config.exchange_ttl_seconds,
        )
        .await?;

        Ok(OtpVerification { exchange_token })
    }

    /// Redeem an exchange token issued by a successful [`Self::verify`].
    /// Single-use; returns the identifier it proves.
    ///
    /// # Errors
    /// Returns a store error on database failure; an unknown or consumed
    /// token is `Ok(None)`.
    pub async fn redeem_exchange(
        &self,
        token: &str,
        purpose: OtpPurpose,
    ) -> Result<Option<String>> {
        repo::redeem_exchange_token(&self.pool, &hash_code(token), purpose).await
    }
}

/// Fixed-length numeric code from the OS random source.
fn generate_code() -> Result<String> {
    let max = 10u32.pow(OTP_CODE_LEN);
    let value = OsRng.gen_range(0..max);
    Ok(format!("{value:0width$}", width = OTP_CODE_LEN as usize))
}

/// Exchange tokens reuse the opaque-secret shape: 32 random bytes, base64url.
fn generate_exchange_secret() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate exchange token")?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// One-way hash applied to codes and exchange tokens before storage.
#[must_use]
pub fn hash_code(code: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    hasher.finalize().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_are_fixed_length_numeric() -> Result<()> {
        for _ in 0..32 {
            let code = generate_code()?;
            assert_eq!(code.len(), OTP_CODE_LEN as usize);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
        Ok(())
    }

    #[test]
    fn code_hash_is_stable_and_distinct() {
        assert_eq!(hash_code("123456"), hash_code("123456"));
        assert_ne!(hash_code("123456"), hash_code("654321"));
    }

    #[test]
    fn exchange_secret_has_full_entropy() -> Result<()> {
        let secret = generate_exchange_secret()?;
        let decoded = URL_SAFE_NO_PAD.decode(secret.as_bytes())?;
        assert_eq!(decoded.len(), 32);
        Ok(())
    }

    #[test]
    fn config_ttl_and_limit_follow_purpose() {
        let config = OtpConfig::new();
        assert_eq!(config.ttl_seconds(OtpPurpose::Login), 5 * 60);
        assert_eq!(config.ttl_seconds(OtpPurpose::PasswordReset), 10 * 60);
        assert_eq!(config.send_limit(OtpPurpose::Login), 5);
        assert_eq!(config.send_limit(OtpPurpose::PasswordReset), 3);
    }

    #[test]
    fn reset_window_rejects_fourth_send_within_window() {
        // The repo counts persisted rows; here we only pin the threshold
        // arithmetic the service applies to that count.
        let config = OtpConfig::new();
        let sends_so_far = 3;
        assert!(sends_so_far >= config.send_limit(OtpPurpose::PasswordReset));
        assert!(2 < config.send_limit(OtpPurpose::PasswordReset));
    }
}
