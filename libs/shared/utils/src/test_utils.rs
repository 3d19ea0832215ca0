use std::sync::Arc;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use base64::{Engine as _, engine::general_purpose};
use serde_json::json;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{Role, User};

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            supabase_service_role_key: "test-service-role-key".to_string(),
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_service_role_key: self.supabase_service_role_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            clinic_utc_offset_minutes: 0,
            notification_webhook_url: None,
            port: 0,
        }
    }

    pub fn with_supabase_url(mut self, url: &str) -> Self {
        self.supabase_url = url.to_string();
        self
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: Role,
}

impl Default for TestUser {
    fn default() -> Self {
        Self::new("test@example.com", Role::Patient)
    }
}

impl TestUser {
    pub fn new(email: &str, role: Role) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role,
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, Role::Doctor)
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, Role::Patient)
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, Role::Admin)
    }

    pub fn uuid(&self) -> Uuid {
        Uuid::parse_str(&self.id).expect("test users carry UUID ids")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: self.role,
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

/// Mints HS256 tokens shaped like the ones Supabase Auth issues.
pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let issued = Utc::now();
        let expires = issued + Duration::hours(exp_hours.unwrap_or(24));

        let claims = json!({
            "sub": user.id,
            "email": user.email,
            "role": "authenticated",
            "app_metadata": { "role": user.role.to_string() },
            "iat": issued.timestamp(),
            "exp": expires.timestamp()
        });

        Self::sign(&claims, secret)
    }

    fn sign(claims: &serde_json::Value, secret: &str) -> String {
        let encode = |value: String| general_purpose::URL_SAFE_NO_PAD.encode(value);
        let unsigned = format!(
            "{}.{}",
            encode(json!({ "alg": "HS256", "typ": "JWT" }).to_string()),
            encode(claims.to_string())
        );

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(unsigned.as_bytes());

        format!("{}.{}", unsigned, general_purpose::URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "not-the-signing-secret", None)
    }

    pub fn create_malformed_token() -> String {
        "not-a.jwt".to_string()
    }
}

/// PostgREST row shapes used by the wiremock-backed store tests.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn appointment_row(
        id: Uuid,
        patient_id: Uuid,
        doctor_id: Uuid,
        date: &str,
        start_time: &str,
        end_time: &str,
        status: &str,
    ) -> serde_json::Value {
        json!({
            "id": id,
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "appointment_date": date,
            "start_time": start_time,
            "end_time": end_time,
            "session_type": "Morning Consultations",
            "status": status,
            "symptoms": null,
            "notes": null,
            "is_emergency": false,
            "booking_date": "2026-01-01T08:00:00Z",
            "reschedule_reason": null,
            "rescheduled_at": null,
            "updated_at": "2026-01-01T08:00:00Z"
        })
    }

    pub fn weekly_schedule_row(
        id: Uuid,
        doctor_id: Uuid,
        week_start: &str,
        week_end: &str,
        monday_slots: serde_json::Value,
        created_at: &str,
    ) -> serde_json::Value {
        json!({
            "id": id,
            "doctor_id": doctor_id,
            "week_start_date": week_start,
            "week_end_date": week_end,
            "days": [monday_slots, [], [], [], [], [], []],
            "total_hours": 0.0,
            "status": "active",
            "created_at": created_at,
            "updated_at": created_at
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "message": message,
            "code": code,
            "details": null,
            "hint": null
        })
    }
}
