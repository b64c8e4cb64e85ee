//! Principal and role records.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Fixed role enumeration for every principal in the back office.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Dealer,
    Customer,
    User,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Dealer => "dealer",
            Self::Customer => "customer",
            Self::User => "user",
        }
    }

    /// Parse the database representation; unknown values map to `None` so a
    /// bad row never panics the request path.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(Self::Admin),
            "dealer" => Some(Self::Dealer),
            "customer" => Some(Self::Customer),
            "user" => Some(Self::User),
            _ => None,
        }
    }
}

/// An account as read from the `users` table.
#[derive(Clone, Debug)]
pub struct Principal {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub active: bool,
}

/// Access + refresh credential pair returned to the client after login or
/// rotation.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}
