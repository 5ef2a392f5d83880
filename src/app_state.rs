//! Application state management.
//!
//! This module defines the shared state structure that gets passed to all
//! Axum handlers via the `State` extractor. The `AppState` contains the
//! store abstractions, the QR token issuer, the verification service,
//! metrics, and the Redis client backing sessions.
//!
//! The state is designed to be cheaply cloneable (using `Arc` internally
//! where needed) so it can be passed efficiently to each request handler
//! without expensive copying of resources.

use crate::domain::{
    ApiError, AttendanceLedgerPtr, DeviceRegistryPtr, IdentityStorePtr, MetricsPtr,
    QrTokenIssuerPtr,
};
use crate::verification::VerificationService;
use redis::Client;
use std::sync::Arc;
use std::time::Duration;

/// Shared application state passed to all Axum handlers.
///
/// This struct serves as the Dependency Injection container for the
/// application. Handlers depend on the store abstractions
/// (`IdentityStore`, `DeviceRegistry`, `AttendanceLedger`), never on the
/// Postgres implementations behind them. State is built once at startup,
/// never mutated afterwards, and cloned cheaply per request by Axum.
#[derive(Clone)]
pub(crate) struct AppState {
    /// Redis client for creating multiplexed async connections on demand.
    ///
    /// Used for ephemeral session state; handlers call `get_conn()` to
    /// obtain a connection for each request.
    redis_client: Client,

    /// Metrics implementation for recording application events.
    ///
    /// Either Prometheus-backed (production) or no-op (testing/development).
    metrics: MetricsPtr,

    /// User account store, backed by PostgreSQL.
    identity: IdentityStorePtr,

    /// Device binding registry, backed by PostgreSQL.
    devices: DeviceRegistryPtr,

    /// Attendance record ledger, backed by PostgreSQL. Owns the
    /// one-record-per-(user, class, day) invariant.
    ledger: AttendanceLedgerPtr,

    /// QR session token issuer, shared by the issue endpoint and the
    /// verification service.
    qr: QrTokenIssuerPtr,

    /// The mark-attendance orchestrator.
    verification: Arc<VerificationService>,

    /// Lifetime of issued bearer session tokens.
    session_ttl: Duration,
}

impl AppState {
    // ---

    #[allow(clippy::too_many_arguments)]
    pub fn new(
        redis_client: Client,
        metrics: MetricsPtr,
        identity: IdentityStorePtr,
        devices: DeviceRegistryPtr,
        ledger: AttendanceLedgerPtr,
        qr: QrTokenIssuerPtr,
        verification: Arc<VerificationService>,
        session_ttl: Duration,
    ) -> Self {
        // ---
        AppState {
            redis_client,
            metrics,
            identity,
            devices,
            ledger,
            qr,
            verification,
            session_ttl,
        }
    }

    /// Creates a new multiplexed Redis connection.
    ///
    /// A failure here is a transient infrastructure fault and surfaces as
    /// `StorageUnavailable` (503).
    pub(crate) async fn get_conn(
        &self,
    ) -> Result<redis::aio::MultiplexedConnection, ApiError> {
        // ---
        self.redis_client
            .get_multiplexed_async_connection()
            .await
            .map_err(|err| {
                tracing::error!("Failed to connect to Redis: {:?}", err);
                ApiError::StorageUnavailable(err.into())
            })
    }

    /// Get a reference to the metrics implementation.
    pub(crate) fn metrics(&self) -> &MetricsPtr {
        // ---
        &self.metrics
    }

    /// Get a reference to the identity store.
    pub(crate) fn identity(&self) -> &IdentityStorePtr {
        // ---
        &self.identity
    }

    /// Get a reference to the device registry.
    pub(crate) fn devices(&self) -> &DeviceRegistryPtr {
        // ---
        &self.devices
    }

    /// Get a reference to the attendance ledger.
    pub(crate) fn ledger(&self) -> &AttendanceLedgerPtr {
        // ---
        &self.ledger
    }

    /// Get a reference to the QR token issuer.
    pub(crate) fn qr(&self) -> &QrTokenIssuerPtr {
        // ---
        &self.qr
    }

    /// Get a reference to the verification service.
    pub(crate) fn verification(&self) -> &VerificationService {
        // ---
        &self.verification
    }

    /// Get the session token TTL.
    pub(crate) fn session_ttl(&self) -> Duration {
        // ---
        self.session_ttl
    }
}
