use super::error::ApiError;
use super::models::User;
use std::sync::Arc;

/// Pluggable selfie verification capability.
///
/// The core calls through this interface and never performs biometric
/// matching itself; a deployment wires in a real liveness/match backend.
/// `Ok(false)` means the capture did not verify; `Err` means the check
/// could not run at all.
#[async_trait::async_trait]
pub trait SelfieVerifier: Send + Sync {
    // ---
    async fn verify(&self, user: &User, selfie_ref: &str) -> Result<bool, ApiError>;
}

/// Type alias for any backend that implements SelfieVerifier.
pub type SelfieVerifierPtr = Arc<dyn SelfieVerifier>;
