use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, QueryBuilder};
use uuid::Uuid;

use crate::domain::{
    ApiError, AttendanceFilter, AttendanceLedger, AttendancePatch, AttendanceRecord,
    AttendanceStatus, DeviceBinding, DeviceRegistry, IdentityStore, NewAttendanceRecord,
    NewDeviceBinding, NewUser, Role, User, UserPatch,
};

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    password_hash: String,
    role: String,
    roll_number: String,
    class_name: Option<String>,
    selfie_ref: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> Result<User, ApiError> {
        // ---
        let role = Role::parse(&self.role)
            .ok_or_else(|| ApiError::Internal(format!("unknown role: {}", self.role).into()))?;
        Ok(User {
            id: self.id,
            name: self.name,
            email: self.email,
            password_hash: self.password_hash,
            role,
            roll_number: self.roll_number,
            class_name: self.class_name,
            selfie_ref: self.selfie_ref,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct DeviceRow {
    device_id: String,
    user_id: Uuid,
    device_name: String,
    ip_address: Option<String>,
    last_used: DateTime<Utc>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<DeviceRow> for DeviceBinding {
    fn from(r: DeviceRow) -> Self {
        // ---
        DeviceBinding {
            device_id: r.device_id,
            user_id: r.user_id,
            device_name: r.device_name,
            ip_address: r.ip_address,
            last_used: r.last_used,
            is_active: r.is_active,
            created_at: r.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AttendanceRow {
    id: Uuid,
    user_id: Uuid,
    class_name: String,
    date: DateTime<Utc>,
    status: String,
    qr_code_used: String,
    selfie_ref: Option<String>,
    device_id: String,
    verified: bool,
    remarks: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AttendanceRow {
    fn into_record(self) -> Result<AttendanceRecord, ApiError> {
        // ---
        let status = AttendanceStatus::parse(&self.status).ok_or_else(|| {
            ApiError::Internal(format!("unknown status: {}", self.status).into())
        })?;
        Ok(AttendanceRecord {
            id: self.id,
            user_id: self.user_id,
            class_name: self.class_name,
            date: self.date,
            status,
            qr_code_used: self.qr_code_used,
            selfie_ref: self.selfie_ref,
            device_id: self.device_id,
            verified: self.verified,
            remarks: self.remarks,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const ATTENDANCE_COLUMNS: &str = "id, user_id, class_name, date, status, qr_code_used, \
     selfie_ref, device_id, verified, remarks, created_at, updated_at";

/// Postgres-backed implementation of the identity store, device
/// registry, and attendance ledger over one shared pool.
pub struct PostgresStore {
    // ---
    pool: PgPool,
}

impl PostgresStore {
    // ---
    pub fn new(pool: PgPool) -> Self {
        // ---
        Self { pool }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    // ---
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait::async_trait]
impl IdentityStore for PostgresStore {
    // ---
    async fn create_user(&self, reg: NewUser) -> Result<User, ApiError> {
        // ---
        let user = User::new(reg);

        let result = sqlx::query(
            "INSERT INTO users (id, name, email, password_hash, role, roll_number, class_name, \
             selfie_ref, is_active, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(&user.roll_number)
        .bind(&user.class_name)
        .bind(&user.selfie_ref)
        .bind(user.is_active)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(user),
            Err(err) if is_unique_violation(&err) => Err(ApiError::Validation(
                "email or roll number already registered".to_string(),
            )),
            Err(err) => Err(err.into()),
        }
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, ApiError> {
        // ---
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(UserRow::into_user).transpose()
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        // ---
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        row.map(UserRow::into_user).transpose()
    }

    async fn list_users(&self) -> Result<Vec<User>, ApiError> {
        // ---
        let rows = sqlx::query_as::<_, UserRow>("SELECT * FROM users ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(UserRow::into_user).collect()
    }

    async fn update_user(&self, user_id: Uuid, patch: UserPatch) -> Result<User, ApiError> {
        // ---
        let result = sqlx::query_as::<_, UserRow>(
            "UPDATE users SET \
                 name = COALESCE($2, name), \
                 email = COALESCE($3, email), \
                 role = COALESCE($4, role), \
                 class_name = COALESCE($5, class_name), \
                 password_hash = COALESCE($6, password_hash), \
                 updated_at = $7 \
             WHERE id = $1 \
             RETURNING *",
        )
        .bind(user_id)
        .bind(&patch.name)
        .bind(&patch.email)
        .bind(patch.role.map(|r| r.as_str()))
        .bind(&patch.class_name)
        .bind(&patch.password_hash)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await;

        match result {
            Ok(Some(row)) => row.into_user(),
            Ok(None) => Err(ApiError::NotFound("user")),
            Err(err) if is_unique_violation(&err) => Err(ApiError::Validation(
                "email already registered".to_string(),
            )),
            Err(err) => Err(err.into()),
        }
    }

    async fn deactivate_user(&self, user_id: Uuid) -> Result<(), ApiError> {
        // ---
        let result = sqlx::query("UPDATE users SET is_active = FALSE, updated_at = $2 WHERE id = $1")
            .bind(user_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("user"));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl DeviceRegistry for PostgresStore {
    // ---
    async fn get_binding(&self, device_id: &str) -> Result<Option<DeviceBinding>, ApiError> {
        // ---
        let row = sqlx::query_as::<_, DeviceRow>("SELECT * FROM devices WHERE device_id = $1")
            .bind(device_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(DeviceBinding::from))
    }

    async fn register_device(&self, reg: NewDeviceBinding) -> Result<DeviceBinding, ApiError> {
        // ---
        let mut tx = self.pool.begin().await?;

        let existing =
            sqlx::query_as::<_, DeviceRow>("SELECT * FROM devices WHERE device_id = $1 FOR UPDATE")
                .bind(&reg.device_id)
                .fetch_optional(&mut *tx)
                .await?;

        if let Some(existing) = &existing {
            if existing.user_id != reg.user_id {
                return Err(ApiError::Validation(
                    "device already registered to another user".to_string(),
                ));
            }
        }

        // One active binding per user: retire the previous device first.
        sqlx::query(
            "UPDATE devices SET is_active = FALSE WHERE user_id = $1 AND device_id <> $2",
        )
        .bind(reg.user_id)
        .bind(&reg.device_id)
        .execute(&mut *tx)
        .await?;

        let now = Utc::now();
        let result = sqlx::query_as::<_, DeviceRow>(
            "INSERT INTO devices (device_id, user_id, device_name, ip_address, last_used, \
             is_active, created_at) \
             VALUES ($1, $2, $3, $4, $5, TRUE, $5) \
             ON CONFLICT (device_id) DO UPDATE SET \
                 device_name = EXCLUDED.device_name, \
                 ip_address = EXCLUDED.ip_address, \
                 last_used = EXCLUDED.last_used, \
                 is_active = TRUE \
             RETURNING *",
        )
        .bind(&reg.device_id)
        .bind(reg.user_id)
        .bind(&reg.device_name)
        .bind(&reg.ip_address)
        .bind(now)
        .fetch_one(&mut *tx)
        .await;

        match result {
            Ok(row) => {
                tx.commit().await?;
                Ok(DeviceBinding::from(row))
            }
            // Lost a race against another user claiming the same device.
            Err(err) if is_unique_violation(&err) => Err(ApiError::Validation(
                "device already registered to another user".to_string(),
            )),
            Err(err) => Err(err.into()),
        }
    }

    async fn touch_device(&self, device_id: &str) -> Result<(), ApiError> {
        // ---
        sqlx::query("UPDATE devices SET last_used = $2 WHERE device_id = $1")
            .bind(device_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl AttendanceLedger for PostgresStore {
    // ---
    async fn append(&self, record: NewAttendanceRecord) -> Result<AttendanceRecord, ApiError> {
        // ---
        let day: NaiveDate = record.day();
        let now = Utc::now();

        // The composite unique constraint makes check-and-insert one
        // atomic statement; a concurrent duplicate inserts nothing and
        // returns no row.
        let row = sqlx::query_as::<_, AttendanceRow>(
            "INSERT INTO attendance (id, user_id, class_name, date, day, status, qr_code_used, \
             selfie_ref, device_id, verified, remarks, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $12) \
             ON CONFLICT ON CONSTRAINT attendance_user_class_day_key DO NOTHING \
             RETURNING id, user_id, class_name, date, status, qr_code_used, selfie_ref, \
                       device_id, verified, remarks, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(record.user_id)
        .bind(&record.class_name)
        .bind(record.date)
        .bind(day)
        .bind(record.status.as_str())
        .bind(&record.qr_code_used)
        .bind(&record.selfie_ref)
        .bind(&record.device_id)
        .bind(record.verified)
        .bind(&record.remarks)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row.into_record(),
            None => Err(ApiError::DuplicateAttendance),
        }
    }

    async fn find(&self, filter: &AttendanceFilter) -> Result<Vec<AttendanceRecord>, ApiError> {
        // ---
        let mut qb = QueryBuilder::new(format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE TRUE"
        ));

        if let Some(user_id) = filter.user_id {
            qb.push(" AND user_id = ").push_bind(user_id);
        }
        if let Some(class_name) = &filter.class_name {
            qb.push(" AND class_name = ").push_bind(class_name);
        }
        if let Some(from) = filter.from {
            qb.push(" AND date >= ").push_bind(from);
        }
        if let Some(to) = filter.to {
            qb.push(" AND date <= ").push_bind(to);
        }
        qb.push(" ORDER BY date DESC");

        let rows = qb
            .build_query_as::<AttendanceRow>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(AttendanceRow::into_record).collect()
    }

    async fn get(&self, id: Uuid) -> Result<Option<AttendanceRecord>, ApiError> {
        // ---
        let row = sqlx::query_as::<_, AttendanceRow>(&format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(AttendanceRow::into_record).transpose()
    }

    async fn update(
        &self,
        id: Uuid,
        patch: &AttendancePatch,
    ) -> Result<AttendanceRecord, ApiError> {
        // ---
        let row = sqlx::query_as::<_, AttendanceRow>(&format!(
            "UPDATE attendance SET \
                 status = COALESCE($2, status), \
                 remarks = COALESCE($3, remarks), \
                 verified = COALESCE($4, verified), \
                 selfie_ref = COALESCE($5, selfie_ref), \
                 updated_at = $6 \
             WHERE id = $1 \
             RETURNING {ATTENDANCE_COLUMNS}"
        ))
        .bind(id)
        .bind(patch.status.map(|s| s.as_str()))
        .bind(&patch.remarks)
        .bind(patch.verified)
        .bind(&patch.selfie_ref)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row.into_record(),
            None => Err(ApiError::NotFound("attendance record")),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<(), ApiError> {
        // ---
        let result = sqlx::query("DELETE FROM attendance WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("attendance record"));
        }
        Ok(())
    }
}
