//! Dealer compliance (KYC) gate.
//!
//! The gate reads a dealer's latest compliance record and blocks protected
//! business routes until it is `Approved`. The decision itself is a pure
//! function over claims and status so it stays framework-free and testable;
//! the axum middleware in [`gate`] is only the wrapper.

pub mod gate;
mod repo;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::session::Role;
use crate::token::AccessClaims;

pub use repo::latest_status;

/// Compliance status attached to a dealer profile. Consumed, never mutated,
/// by this service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum KycStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
}

impl KycStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }
}

/// Outcome of the gate decision for one request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    /// Rejected for a dealer without an approved record; carries the status
    /// found (if any) so the client can route to the right remediation flow.
    Reject { status: Option<KycStatus> },
}

/// Pure gate decision.
///
/// Unauthenticated requests pass through (downstream authorization rejects
/// them); admins pass; dealers need an `Approved` record; every other role
/// passes. The gate is dealer-specific, not a general authorization layer.
#[must_use]
pub fn decide(claims: Option<&AccessClaims>, kyc: Option<KycStatus>) -> GateDecision {
    let Some(claims) = claims else {
        return GateDecision::Allow;
    };
    match claims.role {
        Role::Dealer => match kyc {
            Some(KycStatus::Approved) => GateDecision::Allow,
            status => GateDecision::Reject { status },
        },
        Role::Admin | Role::Customer | Role::User => GateDecision::Allow,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn claims(role: Role) -> AccessClaims {
        AccessClaims {
            sub: Uuid::new_v4(),
            email: "someone@example.com".to_string(),
            role,
            iss: "https://api.dealerdesk.dev".to_string(),
            exp: Utc::now().timestamp() + 900,
            iat: Utc::now().timestamp(),
            jti: Uuid::new_v4(),
        }
    }

    #[test]
    fn unauthenticated_requests_pass_through() {
        assert_eq!(decide(None, None), GateDecision::Allow);
    }

    #[test]
    fn admin_always_passes() {
        assert_eq!(decide(Some(&claims(Role::Admin)), None), GateDecision::Allow);
    }

    #[test]
    fn dealer_without_approval_is_rejected_with_status() {
        for status in [KycStatus::Pending, KycStatus::Rejected, KycStatus::Expired] {
            assert_eq!(
                decide(Some(&claims(Role::Dealer)), Some(status)),
                GateDecision::Reject {
                    status: Some(status)
                }
            );
        }
        assert_eq!(
            decide(Some(&claims(Role::Dealer)), None),
            GateDecision::Reject { status: None }
        );
    }

    #[test]
    fn approved_dealer_passes_the_identical_decision() {
        let dealer = claims(Role::Dealer);
        assert_eq!(
            decide(Some(&dealer), Some(KycStatus::Pending)),
            GateDecision::Reject {
                status: Some(KycStatus::Pending)
            }
        );
        // Same principal after the compliance transition.
        assert_eq!(
            decide(Some(&dealer), Some(KycStatus::Approved)),
            GateDecision::Allow
        );
    }

    #[test]
    fn other_roles_are_not_gated() {
        assert_eq!(
            decide(Some(&claims(Role::Customer)), None),
            GateDecision::Allow
        );
        assert_eq!(decide(Some(&claims(Role::User)), None), GateDecision::Allow);
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            KycStatus::Pending,
            KycStatus::Approved,
            KycStatus::Rejected,
            KycStatus::Expired,
        ] {
            assert_eq!(KycStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(KycStatus::parse("unknown"), None);
    }
}
