//! # Dealerdesk (Auth, Session & Verification)
//!
//! `dealerdesk` is the authentication authority for a multi-role commerce
//! back office. It verifies credentials, issues and rotates session tokens,
//! manages one-time passcodes for step-up flows, and gates dealer-facing
//! routes on compliance (KYC) approval.
//!
//! ## Roles
//!
//! Principals carry one of four roles: `admin`, `dealer`, `customer`, or
//! `user`. Admins bypass the compliance gate; dealers must hold an approved
//! KYC record before protected business routes open up.
//!
//! ## Credentials
//!
//! Passwords are hashed with Argon2id. Accounts migrated from the previous
//! system carry a salted SHA-256 hash which still verifies; a successful
//! login transparently rehashes with the current scheme, so the legacy
//! format retires one account at a time.
//!
//! ## Sessions
//!
//! Access tokens are short-lived signed JWTs. Refresh tokens are opaque
//! 256-bit secrets, stored hashed, rotated on every use; presenting a
//! revoked or already-rotated token invalidates nothing silently: it
//! forces a full re-authentication.
//!
//! ## One-Time Passcodes
//!
//! OTPs are purpose-scoped (`login` vs `password_reset`), single-use, and
//! rate-limited per identifier and per source IP. Each new send supersedes
//! the previous outstanding code.

pub mod api;
pub mod cli;
pub mod kyc;
pub mod notify;
pub mod otp;
pub mod password;
pub mod session;
pub mod token;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        // Should be a hex string (full SHA-1 is 40 chars, but could be short)
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
