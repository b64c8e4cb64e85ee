//! Session orchestration: login, refresh, logout, and password reset.
//!
//! All authentication failures surface as `InvalidCredentials`; the response
//! never distinguishes "no such account" from "wrong password" or "wrong
//! code" (anti-enumeration).

use anyhow::Context;
use sqlx::PgPool;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use super::models::{Principal, TokenPair};
use super::repo;
use crate::otp::{ClientMeta, OtpError, OtpPurpose, OtpService};
use crate::password;
use crate::token::{TokenError, TokenIssuer, generate_refresh_secret};

const DEFAULT_REFRESH_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Rate limited")]
    RateLimited,
    #[error("One-time code expired")]
    OtpExpired,
    #[error("One-time code locked")]
    OtpLocked,
    #[error("Refresh token inactive")]
    RefreshTokenInactive,
    #[error(transparent)]
    Transient(#[from] anyhow::Error),
}

impl From<OtpError> for AuthError {
    fn from(err: OtpError) -> Self {
        match err {
            OtpError::RateLimited => Self::RateLimited,
            OtpError::Invalid => Self::InvalidCredentials,
            OtpError::Expired => Self::OtpExpired,
            OtpError::Locked => Self::OtpLocked,
            OtpError::Store(err) => Self::Transient(err),
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        Self::Transient(err.into())
    }
}

#[derive(Clone)]
pub struct SessionService {
    pool: PgPool,
    tokens: Arc<TokenIssuer>,
    otp: OtpService,
    refresh_ttl_seconds: i64,
}

impl SessionService {
    #[must_use]
    pub fn new(pool: PgPool, tokens: Arc<TokenIssuer>, otp: OtpService) -> Self {
        Self {
            pool,
            tokens,
            otp,
            refresh_ttl_seconds: DEFAULT_REFRESH_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_refresh_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn otp(&self) -> &OtpService {
        &self.otp
    }

    /// Password login path.
    ///
    /// # Errors
    /// `InvalidCredentials` for unknown, inactive, or mismatched accounts;
    /// `Transient` for store failures.
    pub async fn login_with_password(
        &self,
        email: &str,
        plaintext: &str,
        client: &ClientMeta,
    ) -> Result<TokenPair, AuthError> {
        let Some(principal) = repo::find_principal_by_email(&self.pool, email).await? else {
            return Err(AuthError::InvalidCredentials);
        };
        if !principal.active || !password::verify(plaintext, &principal.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }

        // Opportunistic upgrade: a successful legacy verification rehashes
        // with the current scheme so the legacy path retires per account.
        if password::is_legacy(&principal.password_hash) {
            self.upgrade_hash(&principal, plaintext).await?;
        }

        self.issue_pair(&principal, client).await
    }

    /// OTP login path: delegates verification to the OTP engine with
    /// purpose `Login`, then issues the same token pair.
    ///
    /// # Errors
    /// Propagates the OTP rejection class; an identifier without an account
    /// maps to the generic `InvalidCredentials`.
    pub async fn login_with_otp(
        &self,
        email: &str,
        code: &str,
        client: &ClientMeta,
    ) -> Result<TokenPair, AuthError> {
        self.otp.verify(email, code, OtpPurpose::Login).await?;

        let Some(principal) = repo::find_principal_by_email(&self.pool, email).await? else {
            return Err(AuthError::InvalidCredentials);
        };
        if !principal.active {
            return Err(AuthError::InvalidCredentials);
        }
        self.issue_pair(&principal, client).await
    }

    /// Rotate a refresh token and mint a fresh access token.
    ///
    /// The access token is built from the principal re-read from the store,
    /// not from the old token, so role changes take effect immediately.
    ///
    /// # Errors
    /// `RefreshTokenInactive` for absent, revoked, or expired tokens; a
    /// presented-but-inactive token is treated as reuse and requires full
    /// re-authentication.
    pub async fn refresh(
        &self,
        old_secret: &str,
        client: &ClientMeta,
    ) -> Result<TokenPair, AuthError> {
        let old_hash = repo::hash_refresh_secret(old_secret);
        let mut tx = self
            .pool
            .begin()
            .await
            .context("begin refresh transaction")?;

        let Some((old_id, user_id)) =
            repo::claim_for_rotation(&mut tx, &old_hash, client.ip.as_deref()).await?
        else {
            return Err(AuthError::RefreshTokenInactive);
        };

        let new_secret = generate_refresh_secret().map_err(AuthError::Transient)?;
        let new_hash = repo::hash_refresh_secret(&new_secret);
        let new_id = repo::insert_refresh_token(
            &mut *tx,
            user_id,
            &new_hash,
            self.refresh_ttl_seconds,
            client.ip.as_deref(),
        )
        .await?;
        repo::link_replacement(&mut tx, old_id, new_id).await?;
        tx.commit().await.context("commit refresh transaction")?;

        let Some(principal) = repo::find_principal_by_id(&self.pool, user_id).await? else {
            return Err(AuthError::RefreshTokenInactive);
        };
        if !principal.active {
            return Err(AuthError::RefreshTokenInactive);
        }

        let access_token =
            self.tokens
                .issue_access_token(principal.id, &principal.email, principal.role)?;
        Ok(TokenPair {
            access_token,
            refresh_token: new_secret,
            token_type: "Bearer".to_string(),
            expires_in: self.tokens.config().access_ttl_minutes() * 60,
        })
    }

    /// Revoke a refresh token. Idempotent; reports success regardless of
    /// whether the token existed.
    ///
    /// # Errors
    /// Only store failures surface; an unknown token is still success.
    pub async fn logout(&self, secret: &str, client: &ClientMeta) -> Result<(), AuthError> {
        let hash = repo::hash_refresh_secret(secret);
        repo::revoke(&self.pool, &hash, client.ip.as_deref()).await?;
        Ok(())
    }

    /// Reset a password for a known identifier (authorized path) and revoke
    /// every outstanding refresh token for the principal.
    ///
    /// # Errors
    /// `InvalidCredentials` for unknown accounts; `Transient` on store
    /// failure.
    pub async fn reset_password(
        &self,
        identifier: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let Some(principal) = repo::find_principal_by_email(&self.pool, identifier).await? else {
            return Err(AuthError::InvalidCredentials);
        };
        self.apply_password_reset(&principal, new_password).await
    }

    /// Reset a password by redeeming the exchange token minted by a
    /// successful password-reset OTP verification.
    ///
    /// # Errors
    /// `InvalidCredentials` for unknown, consumed, or expired exchange
    /// tokens.
    pub async fn reset_password_via_exchange(
        &self,
        exchange_token: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let Some(identifier) = self
            .otp
            .redeem_exchange(exchange_token, OtpPurpose::PasswordReset)
            .await?
        else {
            return Err(AuthError::InvalidCredentials);
        };
        self.reset_password(&identifier, new_password).await
    }

    async fn apply_password_reset(
        &self,
        principal: &Principal,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let new_hash = password::hash(new_password).map_err(AuthError::Transient)?;

        // Hash update and token revocation commit together: a reset implies
        // compromise remediation, so every session dies with it.
        let mut tx = self.pool.begin().await.context("begin reset transaction")?;
        repo::update_password_hash(&mut tx, principal.id, &new_hash).await?;
        let revoked = repo::revoke_all_for_user(&mut tx, principal.id).await?;
        tx.commit().await.context("commit reset transaction")?;

        info!(user_id = %principal.id, revoked, "password reset completed");
        Ok(())
    }

    async fn upgrade_hash(&self, principal: &Principal, plaintext: &str) -> Result<(), AuthError> {
        let new_hash = password::hash(plaintext).map_err(AuthError::Transient)?;
        let mut tx = self
            .pool
            .begin()
            .await
            .context("begin rehash transaction")?;
        repo::update_password_hash(&mut tx, principal.id, &new_hash).await?;
        tx.commit().await.context("commit rehash transaction")?;
        info!(user_id = %principal.id, "legacy password hash upgraded");
        Ok(())
    }

    async fn issue_pair(
        &self,
        principal: &Principal,
        client: &ClientMeta,
    ) -> Result<TokenPair, AuthError> {
        let access_token =
            self.tokens
                .issue_access_token(principal.id, &principal.email, principal.role)?;
        let refresh_secret = generate_refresh_secret().map_err(AuthError::Transient)?;
        let secret_hash = repo::hash_refresh_secret(&refresh_secret);
        repo::insert_refresh_token(
            &self.pool,
            principal.id,
            &secret_hash,
            self.refresh_ttl_seconds,
            client.ip.as_deref(),
        )
        .await?;

        Ok(TokenPair {
            access_token,
            refresh_token: refresh_secret,
            token_type: "Bearer".to_string(),
            expires_in: self.tokens.config().access_ttl_minutes() * 60,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn otp_errors_map_to_reasoned_auth_errors() {
        assert!(matches!(
            AuthError::from(OtpError::RateLimited),
            AuthError::RateLimited
        ));
        assert!(matches!(
            AuthError::from(OtpError::Invalid),
            AuthError::InvalidCredentials
        ));
        assert!(matches!(
            AuthError::from(OtpError::Expired),
            AuthError::OtpExpired
        ));
        assert!(matches!(
            AuthError::from(OtpError::Locked),
            AuthError::OtpLocked
        ));
    }
}
