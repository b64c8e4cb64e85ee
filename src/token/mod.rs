//! Access-token issuance and validation, plus opaque refresh-secret
//! generation.
//!
//! Access tokens are short-lived HS256 JWTs carrying subject id, email, and
//! role. Refresh secrets are unrelated random strings: compromising one
//! yields nothing that can forge an access token without passing through the
//! session service's rotation path.

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::{RngCore, rngs::OsRng};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::session::Role;

const DEFAULT_ACCESS_TTL_MINUTES: i64 = 15;
const REFRESH_SECRET_BYTES: usize = 32;

/// Claims carried by every access token.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    pub iss: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: Uuid,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("failed to encode token")]
    Encode(#[from] jsonwebtoken::errors::Error),
}

#[derive(Clone, Debug)]
pub struct TokenConfig {
    issuer: String,
    access_ttl_minutes: i64,
    leeway_seconds: u64,
}

impl TokenConfig {
    #[must_use]
    pub fn new(issuer: String) -> Self {
        Self {
            issuer,
            access_ttl_minutes: DEFAULT_ACCESS_TTL_MINUTES,
            leeway_seconds: 0,
        }
    }

    #[must_use]
    pub fn with_access_ttl_minutes(mut self, minutes: i64) -> Self {
        self.access_ttl_minutes = minutes;
        self
    }

    /// Clock-skew tolerance for `exp`. Zero unless explicitly configured.
    #[must_use]
    pub fn with_leeway_seconds(mut self, seconds: u64) -> Self {
        self.leeway_seconds = seconds;
        self
    }

    #[must_use]
    pub fn access_ttl_minutes(&self) -> i64 {
        self.access_ttl_minutes
    }
}

/// Mints and validates access tokens with a shared signing secret.
pub struct TokenIssuer {
    config: TokenConfig,
    secret: SecretString,
}

impl TokenIssuer {
    #[must_use]
    pub fn new(config: TokenConfig, secret: SecretString) -> Self {
        Self { config, secret }
    }

    #[must_use]
    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    /// Issue a signed access token for the given principal identity.
    ///
    /// # Errors
    /// Returns an error only when encoding fails, which indicates a
    /// misconfigured secret rather than bad caller input.
    pub fn issue_access_token(&self, sub: Uuid, email: &str, role: Role) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = AccessClaims {
            sub,
            email: email.to_string(),
            role,
            iss: self.config.issuer.clone(),
            exp: (now + Duration::minutes(self.config.access_ttl_minutes)).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.expose_secret().as_bytes()),
        )?;
        Ok(token)
    }

    /// Full validation: signature, issuer, expiry. Malformed or expired
    /// tokens yield `None`; nothing crosses this boundary as an error.
    #[must_use]
    pub fn decode(&self, token: &str) -> Option<AccessClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = self.config.leeway_seconds;
        validation.set_issuer(&[self.config.issuer.as_str()]);
        decode::<AccessClaims>(
            token,
            &DecodingKey::from_secret(self.secret.expose_secret().as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .ok()
    }

    /// Whether the token would be admitted by [`Self::decode`].
    #[must_use]
    pub fn validate(&self, token: &str) -> bool {
        self.decode(token).is_some()
    }

    /// Pull the subject id out of a token without checking signature or
    /// expiry. Logging and telemetry only; protected-resource authorization
    /// must go through [`Self::decode`].
    #[must_use]
    pub fn extract_subject(token: &str) -> Option<Uuid> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        decode::<AccessClaims>(token, &DecodingKey::from_secret(&[]), &validation)
            .map(|data| data.claims.sub)
            .ok()
    }
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("config", &self.config)
            .field("secret", &"***")
            .finish()
    }
}

/// Generate an opaque refresh secret: 32 random bytes, base64url encoded.
/// The raw value goes to the client; the store only ever sees its hash.
///
/// # Errors
/// Returns an error if the OS random source fails.
pub fn generate_refresh_secret() -> Result<String> {
    let mut bytes = [0u8; REFRESH_SECRET_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate refresh secret")?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}
