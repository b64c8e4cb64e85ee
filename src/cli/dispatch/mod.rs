use crate::api::AuthConfig;
use crate::cli::actions::{Action, server::Args};
use crate::otp::OtpConfig;
use anyhow::{Context, Result};
use secrecy::SecretString;

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;
    let token_secret = matches
        .get_one::<String>("token-secret")
        .cloned()
        .context("missing required argument: --token-secret")?;

    let otp = OtpConfig::new()
        .with_login_ttl_seconds(arg_i64(matches, "otp-login-ttl-seconds", 300))
        .with_reset_ttl_seconds(arg_i64(matches, "otp-reset-ttl-seconds", 600))
        .with_send_window_seconds(arg_i64(matches, "otp-send-window-seconds", 900))
        .with_login_send_limit(arg_i64(matches, "otp-login-send-limit", 5))
        .with_reset_send_limit(arg_i64(matches, "otp-reset-send-limit", 3));

    let auth = AuthConfig::new(
        matches
            .get_one::<String>("frontend-base-url")
            .cloned()
            .context("missing required argument: --frontend-base-url")?,
        matches
            .get_one::<String>("issuer")
            .cloned()
            .context("missing required argument: --issuer")?,
    )
    .with_access_ttl_minutes(arg_i64(matches, "access-ttl-minutes", 15))
    .with_refresh_ttl_seconds(arg_i64(matches, "refresh-ttl-seconds", 604_800))
    .with_leeway_seconds(matches.get_one::<u64>("leeway-seconds").copied().unwrap_or(0))
    .with_otp(otp);

    Ok(Action::Server(Args {
        port,
        dsn,
        token_secret: SecretString::from(token_secret),
        auth,
    }))
}

fn arg_i64(matches: &clap::ArgMatches, name: &str, default: i64) -> i64 {
    matches.get_one::<i64>(name).copied().unwrap_or(default)
}
