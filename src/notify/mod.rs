//! Outbound passcode delivery abstraction.
//!
//! The OTP engine persists the code first and only then hands the plaintext
//! to a sender. Delivery is best-effort behind a bounded timeout: a failed
//! or slow dispatch never rolls back the already-committed OTP row, it only
//! shows up in the reported dispatch outcome.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::otp::OtpPurpose;

pub const DISPATCH_TIMEOUT: Duration = Duration::from_secs(3);

/// A passcode ready for delivery. The plaintext code lives only here and in
/// transit; it is never persisted.
#[derive(Clone, Debug)]
pub struct OtpMessage {
    pub destination: String,
    pub code: String,
    pub purpose: OtpPurpose,
}

/// Delivery abstraction: email, SMS, or a broker behind the same contract.
pub trait OtpSender: Send + Sync {
    /// Deliver a message or return an error to mark the dispatch as failed.
    ///
    /// # Errors
    /// Implementations surface provider failures here.
    fn send(&self, message: &OtpMessage) -> Result<()>;
}

/// Local dev sender that logs instead of delivering.
#[derive(Clone, Debug)]
pub struct LogOtpSender;

impl OtpSender for LogOtpSender {
    fn send(&self, message: &OtpMessage) -> Result<()> {
        info!(
            destination = %message.destination,
            purpose = %message.purpose.as_str(),
            "otp dispatch stub"
        );
        Ok(())
    }
}

/// Run the sender off the request path with a bounded timeout.
///
/// Returns whether the dispatch attempt completed successfully.
pub async fn dispatch(sender: Arc<dyn OtpSender>, message: OtpMessage) -> bool {
    let destination = message.destination.clone();
    let attempt = tokio::task::spawn_blocking(move || sender.send(&message));
    match tokio::time::timeout(DISPATCH_TIMEOUT, attempt).await {
        Ok(Ok(Ok(()))) => true,
        Ok(Ok(Err(err))) => {
            warn!(%destination, "otp dispatch failed: {err}");
            false
        }
        Ok(Err(err)) => {
            warn!(%destination, "otp dispatch task panicked: {err}");
            false
        }
        Err(_) => {
            warn!(%destination, "otp dispatch timed out");
            false
        }
    }
}
