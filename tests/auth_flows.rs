//! End-to-end authentication flows against a containerized Postgres.
//!
//! These cover the behaviors that only exist at the SQL layer: rotation
//! races, attempt lockout, supersede-on-send, send windows, and reset
//! remediation.

mod support;

use anyhow::{Context, Result};
use dealerdesk::notify::{OtpMessage, OtpSender};
use dealerdesk::otp::{ClientMeta, MAX_VERIFY_ATTEMPTS, OtpConfig, OtpError, OtpPurpose, OtpService};
use dealerdesk::password;
use dealerdesk::session::{AuthError, Role, SessionService};
use dealerdesk::token::{TokenConfig, TokenIssuer};
use secrecy::SecretString;
use sqlx::{PgPool, Row, postgres::PgPoolOptions};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use support::PostgresContainer;

const SCHEMA_SQL: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/migrations/0001_init.sql"
));

/// Sender that records every dispatched code so tests can present it back.
#[derive(Clone, Default)]
struct CapturingSender {
    codes: Arc<Mutex<Vec<String>>>,
}

impl CapturingSender {
    fn last_code(&self) -> Option<String> {
        self.codes
            .lock()
            .ok()
            .and_then(|codes| codes.last().cloned())
    }
}

impl OtpSender for CapturingSender {
    fn send(&self, message: &OtpMessage) -> Result<()> {
        if let Ok(mut codes) = self.codes.lock() {
            codes.push(message.code.clone());
        }
        Ok(())
    }
}

struct Harness {
    pool: PgPool,
    sessions: SessionService,
    otp: OtpService,
    sender: CapturingSender,
    _postgres: PostgresContainer,
}

async fn start_harness() -> Result<Harness> {
    let postgres = PostgresContainer::start().await?;
    postgres.wait_until_ready().await?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&postgres.dsn())
        .await?;
    sqlx::Executor::execute(&pool, SCHEMA_SQL)
        .await
        .context("failed to execute schema SQL")?;

    let tokens = Arc::new(TokenIssuer::new(
        TokenConfig::new("https://api.dealerdesk.dev".to_string()),
        SecretString::from("container-test-secret"),
    ));
    let sender = CapturingSender::default();
    let otp = OtpService::new(pool.clone(), Arc::new(sender.clone()), OtpConfig::new());
    let sessions = SessionService::new(pool.clone(), tokens, otp.clone());

    Ok(Harness {
        pool,
        sessions,
        otp,
        sender,
        _postgres: postgres,
    })
}

async fn insert_user(pool: &PgPool, email: &str, plaintext: &str, role: Role) -> Result<()> {
    let hash = password::hash(plaintext)?;
    sqlx::query("INSERT INTO users (email, password_hash, role) VALUES ($1, $2, $3)")
        .bind(email)
        .bind(hash)
        .bind(role.as_str())
        .execute(pool)
        .await
        .context("failed to insert user")?;
    Ok(())
}

fn client() -> ClientMeta {
    ClientMeta {
        ip: Some("203.0.113.10".to_string()),
        user_agent: Some("dealerdesk-tests".to_string()),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_refresh_has_exactly_one_winner() -> Result<()> {
    if let Err(err) = support::ensure_container_runtime() {
        eprintln!("Skipping integration test: {err}");
        return Ok(());
    }

    let harness = start_harness().await?;
    insert_user(
        &harness.pool,
        "dealer@example.com",
        "original password",
        Role::Dealer,
    )
    .await?;
    let pair = harness
        .sessions
        .login_with_password("dealer@example.com", "original password", &client())
        .await?;

    let left_sessions = harness.sessions.clone();
    let right_sessions = harness.sessions.clone();
    let left_token = pair.refresh_token.clone();
    let right_token = pair.refresh_token.clone();
    let (left, right) = tokio::join!(
        tokio::spawn(async move { left_sessions.refresh(&left_token, &client()).await }),
        tokio::spawn(async move { right_sessions.refresh(&right_token, &client()).await }),
    );

    let outcomes = [left?, right?];
    let winners = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
    assert_eq!(winners, 1);
    assert!(
        outcomes
            .iter()
            .any(|outcome| matches!(outcome, Err(AuthError::RefreshTokenInactive)))
    );

    // The loser's token stays dead for sequential retries too.
    let replay = harness.sessions.refresh(&pair.refresh_token, &client()).await;
    assert!(matches!(replay, Err(AuthError::RefreshTokenInactive)));
    Ok(())
}

#[tokio::test]
async fn lockout_rejects_a_later_correct_code() -> Result<()> {
    if let Err(err) = support::ensure_container_runtime() {
        eprintln!("Skipping integration test: {err}");
        return Ok(());
    }

    let harness = start_harness().await?;
    harness
        .otp
        .send("locked@example.com", OtpPurpose::Login, &client())
        .await?;
    let code = harness.sender.last_code().context("captured code")?;
    let wrong = if code == "000000" { "111111" } else { "000000" };

    for _ in 1..MAX_VERIFY_ATTEMPTS {
        let outcome = harness
            .otp
            .verify("locked@example.com", wrong, OtpPurpose::Login)
            .await;
        assert!(matches!(outcome, Err(OtpError::Invalid)));
    }

    // The final failed attempt crosses the threshold.
    let outcome = harness
        .otp
        .verify("locked@example.com", wrong, OtpPurpose::Login)
        .await;
    assert!(matches!(outcome, Err(OtpError::Locked)));

    // Knowing the genuine code no longer helps until a fresh send.
    let outcome = harness
        .otp
        .verify("locked@example.com", &code, OtpPurpose::Login)
        .await;
    assert!(matches!(outcome, Err(OtpError::Locked)));
    Ok(())
}

#[tokio::test]
async fn resend_supersedes_the_outstanding_code() -> Result<()> {
    if let Err(err) = support::ensure_container_runtime() {
        eprintln!("Skipping integration test: {err}");
        return Ok(());
    }

    let harness = start_harness().await?;
    harness
        .otp
        .send("resend@example.com", OtpPurpose::Login, &client())
        .await?;
    let first_code = harness.sender.last_code().context("first code")?;
    harness
        .otp
        .send("resend@example.com", OtpPurpose::Login, &client())
        .await?;
    let second_code = harness.sender.last_code().context("second code")?;

    let superseded: bool = sqlx::query(
        "SELECT superseded FROM otp_codes WHERE identifier = $1 ORDER BY created_at ASC LIMIT 1",
    )
    .bind("resend@example.com")
    .fetch_one(&harness.pool)
    .await?
    .get("superseded");
    assert!(superseded);

    if first_code != second_code {
        let outcome = harness
            .otp
            .verify("resend@example.com", &first_code, OtpPurpose::Login)
            .await;
        assert!(matches!(outcome, Err(OtpError::Invalid)));
    }

    let verification = harness
        .otp
        .verify("resend@example.com", &second_code, OtpPurpose::Login)
        .await?;
    assert!(!verification.exchange_token.is_empty());
    Ok(())
}

#[tokio::test]
async fn fourth_reset_send_in_window_is_rate_limited() -> Result<()> {
    if let Err(err) = support::ensure_container_runtime() {
        eprintln!("Skipping integration test: {err}");
        return Ok(());
    }

    let harness = start_harness().await?;
    for _ in 0..3 {
        harness
            .otp
            .send("reset@example.com", OtpPurpose::PasswordReset, &client())
            .await?;
    }

    let outcome = harness
        .otp
        .send("reset@example.com", OtpPurpose::PasswordReset, &client())
        .await;
    assert!(matches!(outcome, Err(OtpError::RateLimited)));

    // Windows are purpose-scoped: the login window is untouched.
    harness
        .otp
        .send("reset@example.com", OtpPurpose::Login, &client())
        .await?;
    Ok(())
}

#[tokio::test]
async fn password_reset_revokes_every_refresh_token() -> Result<()> {
    if let Err(err) = support::ensure_container_runtime() {
        eprintln!("Skipping integration test: {err}");
        return Ok(());
    }

    let harness = start_harness().await?;
    insert_user(
        &harness.pool,
        "customer@example.com",
        "original password",
        Role::Customer,
    )
    .await?;
    let first_session = harness
        .sessions
        .login_with_password("customer@example.com", "original password", &client())
        .await?;
    let second_session = harness
        .sessions
        .login_with_password("customer@example.com", "original password", &client())
        .await?;

    harness
        .otp
        .send("customer@example.com", OtpPurpose::PasswordReset, &client())
        .await?;
    let code = harness.sender.last_code().context("reset code")?;
    let verification = harness
        .otp
        .verify("customer@example.com", &code, OtpPurpose::PasswordReset)
        .await?;
    harness
        .sessions
        .reset_password_via_exchange(&verification.exchange_token, "replacement password")
        .await?;

    // Every outstanding session dies with the reset.
    for session in [&first_session, &second_session] {
        let outcome = harness
            .sessions
            .refresh(&session.refresh_token, &client())
            .await;
        assert!(matches!(outcome, Err(AuthError::RefreshTokenInactive)));
    }

    // The old password is gone, the new one works.
    let outcome = harness
        .sessions
        .login_with_password("customer@example.com", "original password", &client())
        .await;
    assert!(matches!(outcome, Err(AuthError::InvalidCredentials)));
    harness
        .sessions
        .login_with_password("customer@example.com", "replacement password", &client())
        .await?;

    // Exchange tokens are single use.
    let outcome = harness
        .sessions
        .reset_password_via_exchange(&verification.exchange_token, "another password")
        .await;
    assert!(matches!(outcome, Err(AuthError::InvalidCredentials)));
    Ok(())
}
