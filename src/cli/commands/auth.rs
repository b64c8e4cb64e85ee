use clap::{Arg, Command};

pub fn with_args(command: Command) -> Command {
    let command = with_token_args(command);
    with_otp_args(command)
}

fn with_token_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("token-secret")
                .long("token-secret")
                .help("HMAC secret used to sign access tokens")
                .env("DEALERDESK_TOKEN_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new("issuer")
                .long("issuer")
                .help("Issuer claim stamped into access tokens")
                .env("DEALERDESK_ISSUER")
                .default_value("https://api.dealerdesk.dev"),
        )
        .arg(
            Arg::new("frontend-base-url")
                .long("frontend-base-url")
                .help("Back-office frontend base URL, used as the CORS origin")
                .env("DEALERDESK_FRONTEND_BASE_URL")
                .default_value("https://backoffice.dealerdesk.dev"),
        )
        .arg(
            Arg::new("access-ttl-minutes")
                .long("access-ttl-minutes")
                .help("Access token lifetime in minutes")
                .env("DEALERDESK_ACCESS_TTL_MINUTES")
                .default_value("15")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("refresh-ttl-seconds")
                .long("refresh-ttl-seconds")
                .help("Refresh token lifetime in seconds")
                .env("DEALERDESK_REFRESH_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("leeway-seconds")
                .long("leeway-seconds")
                .help("Clock-skew leeway applied when validating token expiry")
                .env("DEALERDESK_LEEWAY_SECONDS")
                .default_value("0")
                .value_parser(clap::value_parser!(u64)),
        )
}

fn with_otp_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("otp-login-ttl-seconds")
                .long("otp-login-ttl-seconds")
                .help("Login OTP lifetime in seconds")
                .env("DEALERDESK_OTP_LOGIN_TTL_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("otp-reset-ttl-seconds")
                .long("otp-reset-ttl-seconds")
                .help("Password-reset OTP lifetime in seconds")
                .env("DEALERDESK_OTP_RESET_TTL_SECONDS")
                .default_value("600")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("otp-send-window-seconds")
                .long("otp-send-window-seconds")
                .help("Sliding window used for OTP send rate limits")
                .env("DEALERDESK_OTP_SEND_WINDOW_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("otp-login-send-limit")
                .long("otp-login-send-limit")
                .help("Login OTP sends allowed per identifier per window")
                .env("DEALERDESK_OTP_LOGIN_SEND_LIMIT")
                .default_value("5")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("otp-reset-send-limit")
                .long("otp-reset-send-limit")
                .help("Password-reset OTP sends allowed per identifier per window")
                .env("DEALERDESK_OTP_RESET_SEND_LIMIT")
                .default_value("3")
                .value_parser(clap::value_parser!(i64)),
        )
}
