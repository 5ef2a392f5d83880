use super::error::ApiError;
use super::models::{
    AttendanceFilter, AttendancePatch, AttendanceRecord, DeviceBinding, NewAttendanceRecord,
    NewDeviceBinding, NewUser, User, UserPatch,
};
use std::sync::Arc;
use uuid::Uuid;

/// Abstraction over user account persistence.
#[async_trait::async_trait]
pub trait IdentityStore: Send + Sync {
    // ---
    /// Create a new user. Fails with `ValidationError` when the email or
    /// roll number is already registered.
    async fn create_user(&self, user: NewUser) -> Result<User, ApiError>;

    /// Get user by ID.
    async fn get_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, ApiError>;

    /// Get user by email.
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, ApiError>;

    /// List all users.
    async fn list_users(&self) -> Result<Vec<User>, ApiError>;

    /// Apply a partial update. Fails with `NotFound` when the user is absent.
    async fn update_user(&self, user_id: Uuid, patch: UserPatch) -> Result<User, ApiError>;

    /// Soft-deactivate a user. The account stops resolving for login and
    /// attendance marking but its records remain.
    async fn deactivate_user(&self, user_id: Uuid) -> Result<(), ApiError>;
}

/// Abstraction over device bindings. A device identifier is globally
/// unique; the registry enforces that one device never belongs to two
/// users at once.
#[async_trait::async_trait]
pub trait DeviceRegistry: Send + Sync {
    // ---
    /// Look up a binding by device identifier.
    async fn get_binding(&self, device_id: &str) -> Result<Option<DeviceBinding>, ApiError>;

    /// Bind a device to a user. Re-registering the owner's own device
    /// refreshes it; a device bound to another user is rejected with
    /// `ValidationError`.
    async fn register_device(&self, reg: NewDeviceBinding) -> Result<DeviceBinding, ApiError>;

    /// Refresh the last-seen timestamp. Best-effort telemetry; carries no
    /// correctness obligation.
    async fn touch_device(&self, device_id: &str) -> Result<(), ApiError>;
}

/// Abstraction over the attendance ledger.
///
/// The one-record-per-(user, class, day) invariant is enforced here, at
/// the storage boundary, because check-then-insert at the application
/// layer is racy when several service instances run concurrently.
#[async_trait::async_trait]
pub trait AttendanceLedger: Send + Sync {
    // ---
    /// Append a record. The uniqueness check and the insert are a single
    /// atomic operation; a concurrent duplicate loses with
    /// `DuplicateAttendance`, never a silent overwrite.
    async fn append(&self, record: NewAttendanceRecord) -> Result<AttendanceRecord, ApiError>;

    /// Query records, ordered by date descending.
    async fn find(&self, filter: &AttendanceFilter) -> Result<Vec<AttendanceRecord>, ApiError>;

    /// Fetch one record by ID.
    async fn get(&self, id: Uuid) -> Result<Option<AttendanceRecord>, ApiError>;

    /// Apply a partial update. `user_id` and `qr_code_used` are immutable
    /// and not part of the patch type. Fails with `NotFound` when absent.
    async fn update(&self, id: Uuid, patch: &AttendancePatch) -> Result<AttendanceRecord, ApiError>;

    /// Remove a record. Fails with `NotFound` when absent. Authorization
    /// is the caller's concern, not the ledger's.
    async fn delete(&self, id: Uuid) -> Result<(), ApiError>;
}

/// Type aliases for any backend that implements the store traits.
pub type IdentityStorePtr = Arc<dyn IdentityStore>;
pub type DeviceRegistryPtr = Arc<dyn DeviceRegistry>;
pub type AttendanceLedgerPtr = Arc<dyn AttendanceLedger>;
