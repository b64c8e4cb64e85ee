//! Auth configuration and shared handler state.

use std::sync::Arc;

use crate::otp::OtpConfig;
use crate::session::SessionService;
use crate::token::TokenIssuer;

const DEFAULT_ACCESS_TTL_MINUTES: i64 = 15;
const DEFAULT_REFRESH_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_base_url: String,
    issuer: String,
    access_ttl_minutes: i64,
    refresh_ttl_seconds: i64,
    leeway_seconds: u64,
    otp: OtpConfig,
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String, issuer: String) -> Self {
        Self {
            frontend_base_url,
            issuer,
            access_ttl_minutes: DEFAULT_ACCESS_TTL_MINUTES,
            refresh_ttl_seconds: DEFAULT_REFRESH_TTL_SECONDS,
            leeway_seconds: 0,
            otp: OtpConfig::new(),
        }
    }

    #[must_use]
    pub fn with_access_ttl_minutes(mut self, minutes: i64) -> Self {
        self.access_ttl_minutes = minutes;
        self
    }

    #[must_use]
    pub fn with_refresh_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_leeway_seconds(mut self, seconds: u64) -> Self {
        self.leeway_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_otp(mut self, otp: OtpConfig) -> Self {
        self.otp = otp;
        self
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    #[must_use]
    pub fn access_ttl_minutes(&self) -> i64 {
        self.access_ttl_minutes
    }

    #[must_use]
    pub fn refresh_ttl_seconds(&self) -> i64 {
        self.refresh_ttl_seconds
    }

    #[must_use]
    pub fn leeway_seconds(&self) -> u64 {
        self.leeway_seconds
    }

    #[must_use]
    pub fn otp(&self) -> OtpConfig {
        self.otp
    }
}

/// Shared state for the auth handlers: configuration plus the session
/// service (which owns the OTP engine and token issuer wiring).
pub struct AuthState {
    config: AuthConfig,
    sessions: SessionService,
    tokens: Arc<TokenIssuer>,
}

impl AuthState {
    #[must_use]
    pub fn new(config: AuthConfig, sessions: SessionService, tokens: Arc<TokenIssuer>) -> Self {
        Self {
            config,
            sessions,
            tokens,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionService {
        &self.sessions
    }

    #[must_use]
    pub fn tokens(&self) -> &Arc<TokenIssuer> {
        &self.tokens
    }
}
