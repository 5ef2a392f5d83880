mod error;
mod metrics;
mod models;
mod qr;
mod repository;
mod selfie;

// Publicly expose the error taxonomy
pub use error::{ApiError, ErrorBody};

// Publicly expose the Metrics abstraction
pub use metrics::{Metrics, MetricsPtr};

// Publicly expose the store abstractions
pub use repository::{
    AttendanceLedger, AttendanceLedgerPtr, DeviceRegistry, DeviceRegistryPtr, IdentityStore,
    IdentityStorePtr,
};

// Publicly expose the QR and selfie capabilities
pub use qr::{IssuedQrToken, QrClaims, QrTokenIssuer, QrTokenIssuerPtr};
pub use selfie::{SelfieVerifier, SelfieVerifierPtr};

// Publicly expose the value types
pub use models::{
    AttendanceFilter, AttendancePatch, AttendanceRecord, AttendanceStatus, DeviceBinding,
    NewAttendanceRecord, NewDeviceBinding, NewUser, Role, User, UserPatch, UserView,
};
