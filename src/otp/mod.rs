//! One-time passcode engine: issuance, verification, and rate limiting,
//! scoped by (identifier, purpose).

mod models;
mod repo;
mod service;

pub use models::{ClientMeta, OtpPurpose, OtpRecord};
pub use service::{
    MAX_VERIFY_ATTEMPTS, OTP_CODE_LEN, OtpConfig, OtpError, OtpService, OtpVerification,
    SendOutcome, hash_code,
};
