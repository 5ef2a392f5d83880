// Gateway module - controls public API for handlers
// Modules are private, only exported symbols are public

mod attendance;
mod auth;
mod devices;
mod health;
mod metrics;
mod root;
mod shared_types;
mod users;

// Core handlers
pub use health::health_check;
pub use metrics::{metrics_handler, track_http_metrics};
pub use root::root_handler;

// Auth handlers
pub use auth::{login, profile, register};

// Attendance handlers
pub use attendance::{
    delete_attendance, get_attendance, issue_qr_token, list_attendance, mark_attendance,
    today_attendance, update_attendance, user_attendance_history,
};

// User management handlers
pub use users::{delete_user, get_user, list_users, update_user};

// Device binding handlers
pub use devices::register_device;
