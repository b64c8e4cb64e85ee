//! OTP records and purpose scoping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// What an outstanding code authorizes once verified. Codes for one purpose
/// never satisfy the other.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OtpPurpose {
    Login,
    PasswordReset,
}

impl OtpPurpose {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::PasswordReset => "password_reset",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "login" => Some(Self::Login),
            "password_reset" => Some(Self::PasswordReset),
            _ => None,
        }
    }
}

/// Request-origin metadata recorded for audit on OTP and refresh-token rows.
#[derive(Clone, Debug, Default)]
pub struct ClientMeta {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

/// An OTP row as read back for verification. Only the hash of the code is
/// ever stored.
#[derive(Clone, Debug)]
pub struct OtpRecord {
    pub id: Uuid,
    pub code_hash: Vec<u8>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub attempts: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purpose_round_trips_through_str() {
        for purpose in [OtpPurpose::Login, OtpPurpose::PasswordReset] {
            assert_eq!(OtpPurpose::parse(purpose.as_str()), Some(purpose));
        }
        assert_eq!(OtpPurpose::parse("mfa"), None);
    }

    #[test]
    fn purpose_serializes_snake_case() {
        let json = serde_json::to_string(&OtpPurpose::PasswordReset).expect("serialize");
        assert_eq!(json, "\"password_reset\"");
    }
}
