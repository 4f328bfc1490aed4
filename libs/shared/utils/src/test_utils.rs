use std::sync::Arc;
use base64::{Engine as _, engine::general_purpose};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
        }
    }
}

impl TestConfig {
    /// Points the Supabase adapters at a wiremock server.
    pub fn with_supabase_url(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig::new(&self.supabase_url, &self.supabase_anon_key, &self.jwt_secret)
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
    pub tenant_id: String,
}

impl TestUser {
    pub fn new(email: &str, role: &str, tenant_id: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
            tenant_id: tenant_id.to_string(),
        }
    }

    pub fn doctor(email: &str, tenant_id: &str) -> Self {
        Self::new(email, "doctor", tenant_id)
    }

    pub fn receptionist(email: &str, tenant_id: &str) -> Self {
        Self::new(email, "receptionist", tenant_id)
    }

    pub fn admin(email: &str, tenant_id: &str) -> Self {
        Self::new(email, "admin", tenant_id)
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            tenant_id: Some(self.tenant_id.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "app_metadata": { "tenant_id": user.tenant_id },
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Canned PostgREST rows shaped like the `appointments`, `payments` and `doctors` tables.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn doctor_response(doctor_id: &str, first_name: &str, last_name: &str) -> Value {
        json!({
            "id": doctor_id,
            "first_name": first_name,
            "last_name": last_name
        })
    }

    pub fn template_response(template_id: &str, tenant_id: &str, doctor_id: &str, appointment_date: &str) -> Value {
        json!({
            "id": template_id,
            "tenant_id": tenant_id,
            "doctor_id": doctor_id,
            "day_index": 1,
            "time_index": 0,
            "end_time_index": null,
            "slot_count": null,
            "participants": [{ "name": "Dana Levi" }],
            "phones": ["0521234567"],
            "description": "Weekly physiotherapy",
            "booking_id": "booking-1",
            "appointment_date": appointment_date,
            "appointment_type": null,
            "is_recurring": true,
            "end_date": null,
            "recurring_parent_id": null,
            "recurring_exceptions": [],
            "reminder_sent": false,
            "confirmation_sent": false,
            "status": "open",
            "awaiting_payment": true,
            "payment_completed": false
        })
    }

    pub fn payment_response(payment_id: &str, tenant_id: &str, appointment_id: &str, amount: f64) -> Value {
        json!({
            "id": payment_id,
            "tenant_id": tenant_id,
            "doctor_id": Uuid::new_v4(),
            "service_ids": [],
            "appointment_id": appointment_id,
            "amount": amount,
            "payment_status": "completed",
            "payment_period": "monthly",
            "payment_date": "2025-01-10T10:00:00",
            "period_end_date": "2025-02-14T23:59:59.999",
            "service_fee": 300.0,
            "is_deleted": false
        })
    }

    pub fn error_response(message: &str, code: &str) -> Value {
        json!({
            "message": message,
            "code": code
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = TestConfig::default();
        let app_config = config.to_app_config();

        assert_eq!(app_config.supabase_url, "http://localhost:54321");
        assert_eq!(app_config.supabase_anon_key, "test-anon-key");
        assert!(!app_config.supabase_jwt_secret.is_empty());
    }

    #[test]
    fn test_user_creation() {
        let user = TestUser::doctor("doc@example.com", "clinic-a");
        assert_eq!(user.role, "doctor");

        let user_model = user.to_user();
        assert_eq!(user_model.email, Some(user.email.clone()));
        assert_eq!(user_model.tenant_id.as_deref(), Some("clinic-a"));
        assert_eq!(user_model.id, user.id);
    }

    #[test]
    fn test_jwt_token_creation() {
        let user = TestUser::admin("admin@example.com", "clinic-a");
        let token = JwtTestUtils::create_test_token(&user, "test-secret", Some(1));

        assert_eq!(token.split('.').count(), 3);
    }
}
