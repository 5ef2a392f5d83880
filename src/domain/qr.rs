use super::error::ApiError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Claims carried by a QR session token. Immutable once issued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QrClaims {
    // ---
    /// Class the session belongs to.
    pub class_name: String,
    /// Teacher (or admin) who issued the token.
    pub issued_by: Uuid,
    pub issued_at: DateTime<Utc>,
    pub ttl_secs: u64,
}

impl QrClaims {
    // ---
    pub fn expires_at(&self) -> DateTime<Utc> {
        // ---
        self.issued_at + Duration::seconds(self.ttl_secs as i64)
    }
}

/// A freshly issued token together with its expiry, for the client.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedQrToken {
    // ---
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues and validates class-session tokens.
///
/// Tokens are self-describing and tamper-evident, so validation needs no
/// token store. `decode` rejects a token whose expiry has passed — there
/// is no grace period.
pub trait QrTokenIssuer: Send + Sync {
    // ---
    fn issue(
        &self,
        class_name: &str,
        issued_by: Uuid,
        now: DateTime<Utc>,
    ) -> Result<IssuedQrToken, ApiError>;

    fn decode(&self, token: &str, now: DateTime<Utc>) -> Result<QrClaims, ApiError>;
}

/// Type alias for any backend that implements QrTokenIssuer.
pub type QrTokenIssuerPtr = Arc<dyn QrTokenIssuer>;
