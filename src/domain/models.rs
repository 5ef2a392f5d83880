use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role assigned to a user account.
///
/// Students mark attendance; teachers and admins additionally manage
/// records, users, and QR session tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
    Admin,
}

impl Role {
    // ---
    pub fn as_str(&self) -> &'static str {
        // ---
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        // ---
        match s {
            "student" => Some(Role::Student),
            "teacher" => Some(Role::Teacher),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    /// Teachers and admins may view and manage other users' records.
    pub fn is_staff(&self) -> bool {
        // ---
        matches!(self, Role::Teacher | Role::Admin)
    }
}

/// Status recorded for a single attendance entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
}

impl AttendanceStatus {
    // ---
    pub fn as_str(&self) -> &'static str {
        // ---
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Late => "late",
        }
    }

    pub fn parse(s: &str) -> Option<AttendanceStatus> {
        // ---
        match s {
            "present" => Some(AttendanceStatus::Present),
            "absent" => Some(AttendanceStatus::Absent),
            "late" => Some(AttendanceStatus::Late),
            _ => None,
        }
    }
}

/// A user account. Never physically removed; deactivation clears the
/// active flag and the account stops resolving for attendance marking.
/// Deliberately not serializable: clients only ever see [`UserView`],
/// which cannot carry the password hash.
#[derive(Debug, Clone)]
pub struct User {
    // ---
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub roll_number: String,
    pub class_name: Option<String>,
    /// Reference to the stored enrollment selfie, if one was captured.
    pub selfie_ref: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    // ---
    pub fn new(reg: NewUser) -> Self {
        // ---
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: reg.name,
            email: reg.email,
            password_hash: reg.password_hash,
            role: reg.role,
            roll_number: reg.roll_number,
            class_name: reg.class_name,
            selfie_ref: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Input for creating a user. The password arrives already hashed;
/// plaintext never crosses the storage boundary.
#[derive(Debug, Clone)]
pub struct NewUser {
    // ---
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub roll_number: String,
    pub class_name: Option<String>,
}

/// Partial update for a user. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    // ---
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub class_name: Option<String>,
    pub password_hash: Option<String>,
}

/// User shape returned to clients. Deliberately omits the password hash.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    // ---
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub roll_number: String,
    pub class_name: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        // ---
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            roll_number: user.roll_number,
            class_name: user.class_name,
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}

/// Binding of a physical device to a user. A device identifier is unique
/// across the whole system; a binding is deactivated, never reused.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceBinding {
    // ---
    pub device_id: String,
    pub user_id: Uuid,
    pub device_name: String,
    pub ip_address: Option<String>,
    pub last_used: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for registering (or refreshing) a device binding.
#[derive(Debug, Clone)]
pub struct NewDeviceBinding {
    // ---
    pub device_id: String,
    pub user_id: Uuid,
    pub device_name: String,
    pub ip_address: Option<String>,
}

/// A single attendance entry. At most one exists per
/// (user, class, calendar day); the ledger enforces this at the storage
/// layer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    // ---
    pub id: Uuid,
    pub user_id: Uuid,
    pub class_name: String,
    pub date: DateTime<Utc>,
    pub status: AttendanceStatus,
    pub qr_code_used: String,
    pub selfie_ref: Option<String>,
    pub device_id: String,
    pub verified: bool,
    pub remarks: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for appending a record to the ledger.
#[derive(Debug, Clone)]
pub struct NewAttendanceRecord {
    // ---
    pub user_id: Uuid,
    pub class_name: String,
    pub date: DateTime<Utc>,
    pub status: AttendanceStatus,
    pub qr_code_used: String,
    pub selfie_ref: Option<String>,
    pub device_id: String,
    pub verified: bool,
    pub remarks: String,
}

impl NewAttendanceRecord {
    /// Calendar day the uniqueness invariant keys on.
    pub fn day(&self) -> NaiveDate {
        // ---
        self.date.date_naive()
    }
}

/// Ledger query filter. All fields are optional and combine with AND;
/// results are always ordered by date descending.
#[derive(Debug, Clone, Default)]
pub struct AttendanceFilter {
    // ---
    pub user_id: Option<Uuid>,
    pub class_name: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl AttendanceFilter {
    // ---
    pub fn for_user(user_id: Uuid) -> Self {
        // ---
        Self {
            user_id: Some(user_id),
            ..Default::default()
        }
    }
}

/// Partial update for an attendance record. `user_id` and `qr_code_used`
/// are immutable after creation and deliberately absent here.
#[derive(Debug, Clone, Default)]
pub struct AttendancePatch {
    // ---
    pub status: Option<AttendanceStatus>,
    pub remarks: Option<String>,
    pub verified: Option<bool>,
    pub selfie_ref: Option<String>,
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn role_round_trips_through_text() {
        // ---
        for role in [Role::Student, Role::Teacher, Role::Admin] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("principal"), None);
    }

    #[test]
    fn staff_check_excludes_students() {
        // ---
        assert!(!Role::Student.is_staff());
        assert!(Role::Teacher.is_staff());
        assert!(Role::Admin.is_staff());
    }

    #[test]
    fn status_round_trips_through_text() {
        // ---
        for status in [
            AttendanceStatus::Present,
            AttendanceStatus::Absent,
            AttendanceStatus::Late,
        ] {
            assert_eq!(AttendanceStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(AttendanceStatus::parse("excused"), None);
    }

    #[test]
    fn user_view_omits_password_hash() {
        // ---
        let user = User::new(NewUser {
            name: "Asha Rao".to_string(),
            email: "asha@example.com".to_string(),
            password_hash: "$pbkdf2-sha256$secret".to_string(),
            role: Role::Student,
            roll_number: "10A-17".to_string(),
            class_name: Some("10A".to_string()),
        });

        let view = UserView::from(user);
        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["rollNumber"], "10A-17");
    }

    #[test]
    fn new_record_day_is_calendar_day_of_date() {
        // ---
        use chrono::TimeZone;

        let date = Utc.with_ymd_and_hms(2025, 9, 8, 23, 59, 59).unwrap();
        let record = NewAttendanceRecord {
            user_id: Uuid::new_v4(),
            class_name: "10A".to_string(),
            date,
            status: AttendanceStatus::Present,
            qr_code_used: "tok".to_string(),
            selfie_ref: None,
            device_id: "dev-1".to_string(),
            verified: true,
            remarks: String::new(),
        };
        assert_eq!(record.day(), date.date_naive());
    }
}
