//! Attendance verification service.
//!
//! Validates a mark-attendance request end-to-end and produces exactly
//! one attendance record, or fails without side effects. Checks run in a
//! fixed order for error reporting: device binding, QR token, selfie,
//! then the atomic uniqueness-check-and-append against the ledger. The
//! device and token checks have no data dependency on each other and run
//! concurrently; their outcomes are still reported in step order.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::domain::{
    ApiError, AttendanceLedger, AttendanceLedgerPtr, AttendanceRecord, AttendanceStatus,
    DeviceBinding, DeviceRegistry, DeviceRegistryPtr, IdentityStore, IdentityStorePtr,
    NewAttendanceRecord, QrClaims, QrTokenIssuer, QrTokenIssuerPtr, SelfieVerifier,
    SelfieVerifierPtr, User,
};

/// Marking policy derived from configuration at startup.
#[derive(Debug, Clone)]
pub struct AttendancePolicy {
    /// Whether a selfie capture must accompany the request.
    pub selfie_required: bool,
    /// How long after session start a mark still counts as `present`.
    pub grace: Duration,
}

/// A validated mark-attendance request. The user id comes from the
/// caller's session, never from the request body.
#[derive(Debug, Clone)]
pub struct MarkAttendanceRequest {
    // ---
    pub user_id: Uuid,
    pub qr_token: String,
    pub device_id: String,
    pub selfie_ref: Option<String>,
    pub class_hint: Option<String>,
}

/// Orchestrates validation of mark-attendance requests against the
/// identity store, device registry, QR issuer, selfie verifier, and the
/// ledger.
pub struct VerificationService {
    // ---
    identity: IdentityStorePtr,
    devices: DeviceRegistryPtr,
    ledger: AttendanceLedgerPtr,
    qr: QrTokenIssuerPtr,
    selfie: SelfieVerifierPtr,
    policy: AttendancePolicy,
}

impl VerificationService {
    // ---
    pub fn new(
        identity: IdentityStorePtr,
        devices: DeviceRegistryPtr,
        ledger: AttendanceLedgerPtr,
        qr: QrTokenIssuerPtr,
        selfie: SelfieVerifierPtr,
        policy: AttendancePolicy,
    ) -> Self {
        // ---
        Self {
            identity,
            devices,
            ledger,
            qr,
            selfie,
            policy,
        }
    }

    /// Validate a request and append exactly one record.
    ///
    /// On success the created record is returned as a read-only snapshot.
    /// On failure the first failing check's error is surfaced and nothing
    /// has been written.
    pub async fn mark_attendance(
        &self,
        req: MarkAttendanceRequest,
    ) -> Result<AttendanceRecord, ApiError> {
        // ---
        self.mark_attendance_at(req, Utc::now()).await
    }

    /// As [`Self::mark_attendance`], with an explicit clock for tests.
    pub async fn mark_attendance_at(
        &self,
        req: MarkAttendanceRequest,
        now: DateTime<Utc>,
    ) -> Result<AttendanceRecord, ApiError> {
        // ---
        if req.qr_token.is_empty() {
            return Err(ApiError::Validation("qrToken must not be empty".to_string()));
        }
        if req.device_id.is_empty() {
            return Err(ApiError::Validation(
                "deviceId must not be empty".to_string(),
            ));
        }

        let user = self
            .identity
            .get_user_by_id(req.user_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or(ApiError::Unauthorized("account is not active"))?;

        // Device and token checks are independent; run them together but
        // report the device failure first, matching the check order.
        let (device_res, token_res) = futures::join!(
            self.check_device(&user, &req.device_id),
            async { self.check_token(&user, &req.qr_token, req.class_hint.as_deref(), now) },
        );
        let _binding = device_res?;
        let claims = token_res?;

        if self.policy.selfie_required {
            let selfie_ref = req
                .selfie_ref
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .ok_or(ApiError::SelfieVerificationFailed)?;
            if !self.selfie.verify(&user, selfie_ref).await? {
                return Err(ApiError::SelfieVerificationFailed);
            }
        }

        let status = if now - claims.issued_at > self.policy.grace {
            AttendanceStatus::Late
        } else {
            AttendanceStatus::Present
        };

        let record = self
            .ledger
            .append(NewAttendanceRecord {
                user_id: user.id,
                class_name: claims.class_name,
                date: now,
                status,
                qr_code_used: req.qr_token,
                selfie_ref: req.selfie_ref,
                device_id: req.device_id.clone(),
                verified: true,
                remarks: String::new(),
            })
            .await?;

        // Last-seen is telemetry; the record is already durable, so a
        // failure here must not fail the request.
        if let Err(err) = self.devices.touch_device(&req.device_id).await {
            tracing::warn!("failed to update device last-seen: {err}");
        }

        Ok(record)
    }

    async fn check_device(
        &self,
        user: &User,
        device_id: &str,
    ) -> Result<DeviceBinding, ApiError> {
        // ---
        match self.devices.get_binding(device_id).await? {
            Some(binding) if binding.is_active && binding.user_id == user.id => Ok(binding),
            _ => Err(ApiError::DeviceNotRegistered),
        }
    }

    fn check_token(
        &self,
        user: &User,
        token: &str,
        class_hint: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<QrClaims, ApiError> {
        // ---
        let claims = self.qr.decode(token, now)?;

        let class_name = user.class_name.as_deref().ok_or_else(|| {
            ApiError::Validation("user has no assigned class".to_string())
        })?;
        if claims.class_name != class_name {
            return Err(ApiError::InvalidOrExpiredToken);
        }
        if let Some(hint) = class_hint {
            if hint != claims.class_name {
                return Err(ApiError::InvalidOrExpiredToken);
            }
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::domain::{
        AttendanceFilter, AttendancePatch, NewDeviceBinding, NewUser, Role, UserPatch,
    };
    use crate::infrastructure::create_qr_token_issuer;
    use chrono::NaiveDate;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    // ------------------------------------------------------------------
    // In-memory stores
    // ------------------------------------------------------------------

    struct MemIdentity {
        users: Mutex<HashMap<Uuid, User>>,
    }

    #[async_trait::async_trait]
    impl IdentityStore for MemIdentity {
        // ---
        async fn create_user(&self, reg: NewUser) -> Result<User, ApiError> {
            let user = User::new(reg);
            self.users.lock().unwrap().insert(user.id, user.clone());
            Ok(user)
        }
        async fn get_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, ApiError> {
            Ok(self.users.lock().unwrap().get(&user_id).cloned())
        }
        async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .values()
                .find(|u| u.email == email)
                .cloned())
        }
        async fn list_users(&self) -> Result<Vec<User>, ApiError> {
            Ok(self.users.lock().unwrap().values().cloned().collect())
        }
        async fn update_user(&self, user_id: Uuid, patch: UserPatch) -> Result<User, ApiError> {
            let mut users = self.users.lock().unwrap();
            let user = users.get_mut(&user_id).ok_or(ApiError::NotFound("user"))?;
            if let Some(name) = patch.name {
                user.name = name;
            }
            if let Some(class_name) = patch.class_name {
                user.class_name = Some(class_name);
            }
            Ok(user.clone())
        }
        async fn deactivate_user(&self, user_id: Uuid) -> Result<(), ApiError> {
            let mut users = self.users.lock().unwrap();
            let user = users.get_mut(&user_id).ok_or(ApiError::NotFound("user"))?;
            user.is_active = false;
            Ok(())
        }
    }

    struct MemDevices {
        bindings: Mutex<HashMap<String, DeviceBinding>>,
        touches: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl DeviceRegistry for MemDevices {
        // ---
        async fn get_binding(&self, device_id: &str) -> Result<Option<DeviceBinding>, ApiError> {
            Ok(self.bindings.lock().unwrap().get(device_id).cloned())
        }
        async fn register_device(
            &self,
            reg: NewDeviceBinding,
        ) -> Result<DeviceBinding, ApiError> {
            let binding = DeviceBinding {
                device_id: reg.device_id.clone(),
                user_id: reg.user_id,
                device_name: reg.device_name,
                ip_address: reg.ip_address,
                last_used: Utc::now(),
                is_active: true,
                created_at: Utc::now(),
            };
            self.bindings
                .lock()
                .unwrap()
                .insert(reg.device_id, binding.clone());
            Ok(binding)
        }
        async fn touch_device(&self, device_id: &str) -> Result<(), ApiError> {
            self.touches.lock().unwrap().push(device_id.to_owned());
            Ok(())
        }
    }

    /// The duplicate check and the insert happen under one lock, which is
    /// the in-memory analog of the storage uniqueness constraint.
    struct MemLedger {
        records: Mutex<Vec<AttendanceRecord>>,
    }

    impl MemLedger {
        fn key(user_id: Uuid, class_name: &str, day: NaiveDate) -> (Uuid, String, NaiveDate) {
            (user_id, class_name.to_owned(), day)
        }
    }

    #[async_trait::async_trait]
    impl AttendanceLedger for MemLedger {
        // ---
        async fn append(&self, record: NewAttendanceRecord) -> Result<AttendanceRecord, ApiError> {
            let mut records = self.records.lock().unwrap();
            let key = Self::key(record.user_id, &record.class_name, record.day());
            let occupied = records.iter().any(|r| {
                Self::key(r.user_id, &r.class_name, r.date.date_naive()) == key
            });
            if occupied {
                return Err(ApiError::DuplicateAttendance);
            }
            let now = Utc::now();
            let stored = AttendanceRecord {
                id: Uuid::new_v4(),
                user_id: record.user_id,
                class_name: record.class_name,
                date: record.date,
                status: record.status,
                qr_code_used: record.qr_code_used,
                selfie_ref: record.selfie_ref,
                device_id: record.device_id,
                verified: record.verified,
                remarks: record.remarks,
                created_at: now,
                updated_at: now,
            };
            records.push(stored.clone());
            Ok(stored)
        }
        async fn find(
            &self,
            filter: &AttendanceFilter,
        ) -> Result<Vec<AttendanceRecord>, ApiError> {
            let mut out: Vec<_> = self
                .records
                .lock()
                .unwrap()
                .iter()
                .filter(|r| filter.user_id.map_or(true, |u| r.user_id == u))
                .filter(|r| filter.class_name.as_ref().map_or(true, |c| &r.class_name == c))
                .cloned()
                .collect();
            out.sort_by(|a, b| b.date.cmp(&a.date));
            Ok(out)
        }
        async fn get(&self, id: Uuid) -> Result<Option<AttendanceRecord>, ApiError> {
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .find(|r| r.id == id)
                .cloned())
        }
        async fn update(
            &self,
            id: Uuid,
            patch: &AttendancePatch,
        ) -> Result<AttendanceRecord, ApiError> {
            let mut records = self.records.lock().unwrap();
            let record = records
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or(ApiError::NotFound("attendance record"))?;
            if let Some(status) = patch.status {
                record.status = status;
            }
            if let Some(remarks) = &patch.remarks {
                record.remarks = remarks.clone();
            }
            if let Some(verified) = patch.verified {
                record.verified = verified;
            }
            record.updated_at = Utc::now();
            Ok(record.clone())
        }
        async fn delete(&self, id: Uuid) -> Result<(), ApiError> {
            let mut records = self.records.lock().unwrap();
            let before = records.len();
            records.retain(|r| r.id != id);
            if records.len() == before {
                return Err(ApiError::NotFound("attendance record"));
            }
            Ok(())
        }
    }

    struct AcceptingSelfie;

    #[async_trait::async_trait]
    impl SelfieVerifier for AcceptingSelfie {
        async fn verify(&self, _user: &User, _selfie_ref: &str) -> Result<bool, ApiError> {
            Ok(true)
        }
    }

    struct RejectingSelfie;

    #[async_trait::async_trait]
    impl SelfieVerifier for RejectingSelfie {
        async fn verify(&self, _user: &User, _selfie_ref: &str) -> Result<bool, ApiError> {
            Ok(false)
        }
    }

    // ------------------------------------------------------------------
    // Fixtures
    // ------------------------------------------------------------------

    struct Fixture {
        service: Arc<VerificationService>,
        identity: Arc<MemIdentity>,
        devices: Arc<MemDevices>,
        ledger: Arc<MemLedger>,
        qr: QrTokenIssuerPtr,
    }

    async fn fixture_with(
        policy: AttendancePolicy,
        selfie: SelfieVerifierPtr,
        qr_ttl_secs: u64,
    ) -> Fixture {
        // ---
        let identity = Arc::new(MemIdentity {
            users: Mutex::new(HashMap::new()),
        });
        let devices = Arc::new(MemDevices {
            bindings: Mutex::new(HashMap::new()),
            touches: Mutex::new(Vec::new()),
        });
        let ledger = Arc::new(MemLedger {
            records: Mutex::new(Vec::new()),
        });
        let qr = create_qr_token_issuer("unit-test-secret", std::time::Duration::from_secs(qr_ttl_secs));

        let service = Arc::new(VerificationService::new(
            identity.clone(),
            devices.clone(),
            ledger.clone(),
            qr.clone(),
            selfie,
            policy,
        ));

        Fixture {
            service,
            identity,
            devices,
            ledger,
            qr,
        }
    }

    async fn fixture() -> Fixture {
        // ---
        fixture_with(
            AttendancePolicy {
                selfie_required: false,
                grace: Duration::minutes(15),
            },
            Arc::new(AcceptingSelfie),
            3600,
        )
        .await
    }

    async fn enrolled_student(fx: &Fixture, class: &str, device: &str) -> User {
        // ---
        let user = fx
            .identity
            .create_user(NewUser {
                name: "Asha Rao".to_string(),
                email: format!("{}@example.com", Uuid::new_v4()),
                password_hash: "hash".to_string(),
                role: Role::Student,
                roll_number: Uuid::new_v4().to_string(),
                class_name: Some(class.to_string()),
            })
            .await
            .unwrap();
        fx.devices
            .register_device(NewDeviceBinding {
                device_id: device.to_string(),
                user_id: user.id,
                device_name: "phone".to_string(),
                ip_address: None,
            })
            .await
            .unwrap();
        user
    }

    fn mark_req(user: &User, token: &str, device: &str) -> MarkAttendanceRequest {
        // ---
        MarkAttendanceRequest {
            user_id: user.id,
            qr_token: token.to_string(),
            device_id: device.to_string(),
            selfie_ref: None,
            class_hint: None,
        }
    }

    // ------------------------------------------------------------------
    // Tests
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn valid_mark_creates_present_record() {
        // ---
        let fx = fixture().await;
        let user = enrolled_student(&fx, "10A", "dev-1").await;

        let now = Utc::now();
        let token = fx.qr.issue("10A", Uuid::new_v4(), now).unwrap();

        let record = fx
            .service
            .mark_attendance_at(mark_req(&user, &token.token, "dev-1"), now + Duration::seconds(60))
            .await
            .unwrap();

        assert_eq!(record.user_id, user.id);
        assert_eq!(record.class_name, "10A");
        assert_eq!(record.status, AttendanceStatus::Present);
        assert!(record.verified);
        assert_eq!(record.qr_code_used, token.token);

        // Exactly one side effect of each kind.
        assert_eq!(fx.ledger.records.lock().unwrap().len(), 1);
        assert_eq!(fx.devices.touches.lock().unwrap().as_slice(), ["dev-1"]);
    }

    #[tokio::test]
    async fn second_mark_same_day_is_duplicate() {
        // ---
        let fx = fixture().await;
        let user = enrolled_student(&fx, "10A", "dev-1").await;

        let now = Utc::now();
        let token = fx.qr.issue("10A", Uuid::new_v4(), now).unwrap();

        fx.service
            .mark_attendance_at(mark_req(&user, &token.token, "dev-1"), now)
            .await
            .unwrap();

        // Same token a minute later: the same-day key is occupied,
        // independent of token reuse.
        let err = fx
            .service
            .mark_attendance_at(mark_req(&user, &token.token, "dev-1"), now + Duration::seconds(60))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::DuplicateAttendance));
        assert_eq!(fx.ledger.records.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_duplicates_have_exactly_one_winner() {
        // ---
        let fx = fixture().await;
        let user = enrolled_student(&fx, "10A", "dev-1").await;

        let now = Utc::now();
        let token = fx.qr.issue("10A", Uuid::new_v4(), now).unwrap();

        let attempts = (0..8).map(|_| {
            let service = fx.service.clone();
            let req = mark_req(&user, &token.token, "dev-1");
            tokio::spawn(async move { service.mark_attendance_at(req, now).await })
        });
        let outcomes = futures::future::join_all(attempts).await;

        let mut wins = 0;
        for outcome in outcomes {
            match outcome.unwrap() {
                Ok(_) => wins += 1,
                Err(err) => assert!(matches!(err, ApiError::DuplicateAttendance)),
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(fx.ledger.records.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn device_bound_to_other_user_is_rejected() {
        // ---
        let fx = fixture().await;
        let _owner = enrolled_student(&fx, "10A", "dev-1").await;
        let intruder = enrolled_student(&fx, "10A", "dev-2").await;

        let now = Utc::now();
        let token = fx.qr.issue("10A", Uuid::new_v4(), now).unwrap();

        // Valid token, but dev-1 belongs to someone else.
        let err = fx
            .service
            .mark_attendance_at(mark_req(&intruder, &token.token, "dev-1"), now)
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::DeviceNotRegistered));
        assert!(fx.ledger.records.lock().unwrap().is_empty());
        assert!(fx.devices.touches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_device_is_rejected() {
        // ---
        let fx = fixture().await;
        let user = enrolled_student(&fx, "10A", "dev-1").await;

        let now = Utc::now();
        let token = fx.qr.issue("10A", Uuid::new_v4(), now).unwrap();

        let err = fx
            .service
            .mark_attendance_at(mark_req(&user, &token.token, "dev-9"), now)
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::DeviceNotRegistered));
    }

    #[tokio::test]
    async fn expired_token_is_rejected_regardless_of_device() {
        // ---
        let fx = fixture_with(
            AttendancePolicy {
                selfie_required: false,
                grace: Duration::minutes(15),
            },
            Arc::new(AcceptingSelfie),
            60,
        )
        .await;
        let user = enrolled_student(&fx, "10A", "dev-1").await;

        let issued = Utc::now();
        let token = fx.qr.issue("10A", Uuid::new_v4(), issued).unwrap();

        // ttl 60s, submitted 120s later.
        let err = fx
            .service
            .mark_attendance_at(
                mark_req(&user, &token.token, "dev-1"),
                issued + Duration::seconds(120),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::InvalidOrExpiredToken));
        assert!(fx.ledger.records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn token_for_other_class_is_rejected() {
        // ---
        let fx = fixture().await;
        let user = enrolled_student(&fx, "10A", "dev-1").await;

        let now = Utc::now();
        let token = fx.qr.issue("11B", Uuid::new_v4(), now).unwrap();

        let err = fx
            .service
            .mark_attendance_at(mark_req(&user, &token.token, "dev-1"), now)
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::InvalidOrExpiredToken));
    }

    #[tokio::test]
    async fn class_hint_mismatch_is_rejected() {
        // ---
        let fx = fixture().await;
        let user = enrolled_student(&fx, "10A", "dev-1").await;

        let now = Utc::now();
        let token = fx.qr.issue("10A", Uuid::new_v4(), now).unwrap();

        let mut req = mark_req(&user, &token.token, "dev-1");
        req.class_hint = Some("11B".to_string());

        let err = fx.service.mark_attendance_at(req, now).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidOrExpiredToken));
    }

    #[tokio::test]
    async fn mark_after_grace_period_is_late() {
        // ---
        let fx = fixture().await;
        let user = enrolled_student(&fx, "10A", "dev-1").await;

        let issued = Utc::now();
        let token = fx.qr.issue("10A", Uuid::new_v4(), issued).unwrap();

        let record = fx
            .service
            .mark_attendance_at(
                mark_req(&user, &token.token, "dev-1"),
                issued + Duration::minutes(20),
            )
            .await
            .unwrap();

        assert_eq!(record.status, AttendanceStatus::Late);
    }

    #[tokio::test]
    async fn selfie_required_but_missing_fails() {
        // ---
        let fx = fixture_with(
            AttendancePolicy {
                selfie_required: true,
                grace: Duration::minutes(15),
            },
            Arc::new(AcceptingSelfie),
            3600,
        )
        .await;
        let user = enrolled_student(&fx, "10A", "dev-1").await;

        let now = Utc::now();
        let token = fx.qr.issue("10A", Uuid::new_v4(), now).unwrap();

        let err = fx
            .service
            .mark_attendance_at(mark_req(&user, &token.token, "dev-1"), now)
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::SelfieVerificationFailed));
        assert!(fx.ledger.records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn selfie_verifier_rejection_fails_the_mark() {
        // ---
        let fx = fixture_with(
            AttendancePolicy {
                selfie_required: true,
                grace: Duration::minutes(15),
            },
            Arc::new(RejectingSelfie),
            3600,
        )
        .await;
        let user = enrolled_student(&fx, "10A", "dev-1").await;

        let now = Utc::now();
        let token = fx.qr.issue("10A", Uuid::new_v4(), now).unwrap();

        let mut req = mark_req(&user, &token.token, "dev-1");
        req.selfie_ref = Some("captures/abc.jpg".to_string());

        let err = fx.service.mark_attendance_at(req, now).await.unwrap_err();
        assert!(matches!(err, ApiError::SelfieVerificationFailed));
    }

    #[tokio::test]
    async fn inactive_user_cannot_mark() {
        // ---
        let fx = fixture().await;
        let user = enrolled_student(&fx, "10A", "dev-1").await;
        fx.identity.deactivate_user(user.id).await.unwrap();

        let now = Utc::now();
        let token = fx.qr.issue("10A", Uuid::new_v4(), now).unwrap();

        let err = fx
            .service
            .mark_attendance_at(mark_req(&user, &token.token, "dev-1"), now)
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn empty_inputs_are_validation_errors() {
        // ---
        let fx = fixture().await;
        let user = enrolled_student(&fx, "10A", "dev-1").await;
        let now = Utc::now();

        let err = fx
            .service
            .mark_attendance_at(mark_req(&user, "", "dev-1"), now)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        let err = fx
            .service
            .mark_attendance_at(mark_req(&user, "some-token", ""), now)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn same_user_different_class_days_do_not_collide() {
        // ---
        let fx = fixture().await;
        let user = enrolled_student(&fx, "10A", "dev-1").await;

        let now = Utc::now();
        let token = fx.qr.issue("10A", Uuid::new_v4(), now).unwrap();
        fx.service
            .mark_attendance_at(mark_req(&user, &token.token, "dev-1"), now)
            .await
            .unwrap();

        // Next calendar day: key is free again.
        let tomorrow = now + Duration::days(1);
        let token2 = fx.qr.issue("10A", Uuid::new_v4(), tomorrow).unwrap();
        fx.service
            .mark_attendance_at(mark_req(&user, &token2.token, "dev-1"), tomorrow)
            .await
            .unwrap();

        assert_eq!(fx.ledger.records.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn ledger_update_never_touches_user_or_token() {
        // ---
        let fx = fixture().await;
        let user = enrolled_student(&fx, "10A", "dev-1").await;

        let now = Utc::now();
        let token = fx.qr.issue("10A", Uuid::new_v4(), now).unwrap();
        let record = fx
            .service
            .mark_attendance_at(mark_req(&user, &token.token, "dev-1"), now)
            .await
            .unwrap();

        let updated = fx
            .ledger
            .update(
                record.id,
                &AttendancePatch {
                    status: Some(AttendanceStatus::Absent),
                    remarks: Some("manual correction".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.status, AttendanceStatus::Absent);
        assert_eq!(updated.user_id, record.user_id);
        assert_eq!(updated.qr_code_used, record.qr_code_used);
    }

    #[tokio::test]
    async fn ledger_update_missing_record_is_not_found() {
        // ---
        let fx = fixture().await;
        let err = fx
            .ledger
            .update(Uuid::new_v4(), &AttendancePatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn fetching_same_record_twice_is_idempotent() {
        // ---
        let fx = fixture().await;
        let user = enrolled_student(&fx, "10A", "dev-1").await;

        let now = Utc::now();
        let token = fx.qr.issue("10A", Uuid::new_v4(), now).unwrap();
        let record = fx
            .service
            .mark_attendance_at(mark_req(&user, &token.token, "dev-1"), now)
            .await
            .unwrap();

        let first = fx.ledger.get(record.id).await.unwrap().unwrap();
        let second = fx.ledger.get(record.id).await.unwrap().unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.status, second.status);
        assert_eq!(first.updated_at, second.updated_at);
    }
}
