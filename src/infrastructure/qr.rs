//! Signed QR session tokens.
//!
//! A token is `base64url(claims-json) + "." + hex(sha256(secret.payload))`.
//! The signature makes the claims tamper-evident, so validation needs no
//! token store and works identically across service instances sharing
//! the secret. Expiry is hard: a token is valid while
//! `issued_at + ttl >= now` and rejected after, with no grace period.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::{ApiError, IssuedQrToken, QrClaims, QrTokenIssuer, QrTokenIssuerPtr};

pub struct SignedQrIssuer {
    // ---
    secret: String,
    ttl: Duration,
}

impl SignedQrIssuer {
    // ---
    pub fn new(secret: String, ttl: Duration) -> Self {
        // ---
        Self { secret, ttl }
    }

    fn sign(&self, payload: &str) -> String {
        // ---
        let mut hasher: Sha256 = Digest::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(b".");
        hasher.update(payload.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl QrTokenIssuer for SignedQrIssuer {
    // ---
    fn issue(
        &self,
        class_name: &str,
        issued_by: Uuid,
        now: DateTime<Utc>,
    ) -> Result<IssuedQrToken, ApiError> {
        // ---
        let claims = QrClaims {
            class_name: class_name.to_owned(),
            issued_by,
            issued_at: now,
            ttl_secs: self.ttl.as_secs(),
        };

        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);
        let signature = self.sign(&payload);

        Ok(IssuedQrToken {
            token: format!("{payload}.{signature}"),
            expires_at: claims.expires_at(),
        })
    }

    fn decode(&self, token: &str, now: DateTime<Utc>) -> Result<QrClaims, ApiError> {
        // ---
        let (payload, signature) = token
            .rsplit_once('.')
            .ok_or(ApiError::InvalidOrExpiredToken)?;

        if self.sign(payload) != signature {
            return Err(ApiError::InvalidOrExpiredToken);
        }

        let claims_bytes = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| ApiError::InvalidOrExpiredToken)?;
        let claims: QrClaims = serde_json::from_slice(&claims_bytes)
            .map_err(|_| ApiError::InvalidOrExpiredToken)?;

        if now > claims.expires_at() {
            return Err(ApiError::InvalidOrExpiredToken);
        }

        Ok(claims)
    }
}

/// Creates a signed QR token issuer with the given secret and TTL.
pub fn create_qr_token_issuer(secret: &str, ttl: Duration) -> QrTokenIssuerPtr {
    // ---
    Arc::new(SignedQrIssuer::new(secret.to_owned(), ttl))
}
