//! Password hashing and dual-scheme verification.
//!
//! New hashes are Argon2id in PHC string format. Verification also accepts
//! the legacy `sha256$<salt>$<digest>` format still present on accounts that
//! predate the migration, so no forced mass reset is needed. Callers never
//! branch on the scheme; `verify` dispatches on the stored representation.

use anyhow::{Context, Result};
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

const LEGACY_PREFIX: &str = "sha256$";
const LEGACY_SALT_LEN: usize = 16;

/// Hash a plaintext password with the current scheme (Argon2id, PHC format).
///
/// # Errors
/// Returns an error if the underlying hasher fails; never exposes the input.
pub fn hash(plaintext: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plaintext.as_bytes(), &salt)
        .map_err(|err| anyhow::anyhow!("failed to hash password: {err}"))?;
    Ok(hash.to_string())
}

/// Verify a plaintext password against a stored hash of either scheme.
///
/// Malformed stored values verify as `false`; this function never panics on
/// attacker-controlled input.
#[must_use]
pub fn verify(plaintext: &str, stored: &str) -> bool {
    if is_legacy(stored) {
        verify_legacy(plaintext, stored)
    } else {
        verify_argon2(plaintext, stored)
    }
}

/// Whether the stored hash uses the legacy fast-hash scheme.
///
/// Used by the login path to opportunistically rehash with the current
/// scheme after a successful verification.
#[must_use]
pub fn is_legacy(stored: &str) -> bool {
    stored.starts_with(LEGACY_PREFIX)
}

/// Produce a legacy-format hash. Only exists so tests and fixtures can build
/// pre-migration records; new hashes always go through [`hash`].
///
/// # Errors
/// Returns an error if random salt generation fails.
pub fn hash_legacy(plaintext: &str) -> Result<String> {
    let mut salt = [0u8; LEGACY_SALT_LEN];
    OsRng
        .try_fill_bytes(&mut salt)
        .context("failed to generate legacy salt")?;
    let digest = legacy_digest(&salt, plaintext);
    Ok(format!(
        "{LEGACY_PREFIX}{}${}",
        STANDARD_NO_PAD.encode(salt),
        STANDARD_NO_PAD.encode(digest)
    ))
}

fn verify_argon2(plaintext: &str, stored: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    Argon2::default()
        .verify_password(plaintext.as_bytes(), &parsed)
        .is_ok()
}

fn verify_legacy(plaintext: &str, stored: &str) -> bool {
    let mut parts = stored.splitn(3, '$');
    let (Some(_scheme), Some(salt_b64), Some(digest_b64)) =
        (parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    let Ok(salt) = STANDARD_NO_PAD.decode(salt_b64) else {
        return false;
    };
    let Ok(expected) = STANDARD_NO_PAD.decode(digest_b64) else {
        return false;
    };
    let digest = legacy_digest(&salt, plaintext);
    digest.ct_eq(expected.as_slice()).into()
}

fn legacy_digest(salt: &[u8], plaintext: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(plaintext.as_bytes());
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_scheme_round_trips() -> Result<()> {
        let stored = hash("hunter2")?;
        assert!(stored.starts_with("$argon2"));
        assert!(verify("hunter2", &stored));
        assert!(!verify("wrong", &stored));
        Ok(())
    }

    #[test]
    fn legacy_scheme_round_trips() -> Result<()> {
        let stored = hash_legacy("hunter2")?;
        assert!(is_legacy(&stored));
        assert!(verify("hunter2", &stored));
        assert!(!verify("wrong", &stored));
        Ok(())
    }

    #[test]
    fn current_scheme_is_not_flagged_legacy() -> Result<()> {
        let stored = hash("hunter2")?;
        assert!(!is_legacy(&stored));
        Ok(())
    }

    #[test]
    fn malformed_stored_values_never_verify() {
        assert!(!verify("pw", ""));
        assert!(!verify("pw", "not-a-hash"));
        assert!(!verify("pw", "sha256$short"));
        assert!(!verify("pw", "sha256$!!!$!!!"));
        assert!(!verify("pw", "$argon2id$broken"));
    }

    #[test]
    fn salts_differ_between_hashes() -> Result<()> {
        let first = hash("same-password")?;
        let second = hash("same-password")?;
        assert_ne!(first, second);
        Ok(())
    }
}
