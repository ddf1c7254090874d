use std::sync::Arc;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use base64::{Engine as _, engine::general_purpose};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub payment_merchant_id: String,
    pub payment_auth_key: String,
    pub payment_action_url: String,
    pub payment_return_url: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            payment_merchant_id: "TESTCPID".to_string(),
            payment_auth_key: "test-payment-auth-key".to_string(),
            payment_action_url: "https://pay.example.com/card/pay".to_string(),
            payment_return_url: shared_config::DEFAULT_PAYMENT_RETURN_URL.to_string(),
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            payment_merchant_id: self.payment_merchant_id.clone(),
            payment_auth_key: self.payment_auth_key.clone(),
            payment_action_url: self.payment_action_url.clone(),
            payment_signer_url: String::new(),
            payment_return_url: self.payment_return_url.clone(),
            server_port: shared_config::DEFAULT_SERVER_PORT,
        }
    }

    /// Config whose database calls go to a mock server.
    pub fn with_supabase_url(url: &str) -> AppConfig {
        let mut config = Self::default().to_app_config();
        config.supabase_url = url.to_string();
        config
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            name: None,
            role: "patient".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            name: None,
            role: role.to_string(),
        }
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn uuid(&self) -> Uuid {
        Uuid::parse_str(&self.id).expect("test user ids are uuids")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            name: self.name.clone(),
            role: Some(self.role.clone()),
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
            "user_metadata": { "full_name": user.name },
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

pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn doctor_response(doctor_id: &str, name: &str, specialty: &str) -> Value {
        json!({
            "id": doctor_id,
            "name": name,
            "specialty": specialty,
            "hospital": "Seoul Telehealth Clinic",
            "bio": "Board certified physician",
            "gender": "female",
            "rating": 4.8,
            "patients": 1200,
            "experience_years": 12,
            "is_available": true,
            "image_url": null
        })
    }

    /// Appointment row with the doctor and patient embedded the way the
    /// appointment queries select them.
    pub fn appointment_response(
        appointment_id: &str,
        user_id: &str,
        doctor_id: &str,
        status: &str,
        price: Option<i64>,
    ) -> Value {
        json!({
            "id": appointment_id,
            "user_id": user_id,
            "doctor_id": doctor_id,
            "date": "2030-05-01T10:00:00Z",
            "status": status,
            "price": price,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-02T00:00:00Z",
            "doctor": {
                "id": doctor_id,
                "name": "Dr. Lee",
                "specialty": "Family Medicine"
            },
            "user": {
                "id": user_id,
                "name": "Test Patient",
                "email": "patient@example.com"
            }
        })
    }

    pub fn profile_response(user_id: &str) -> Value {
        json!({
            "id": user_id,
            "name": "Test Patient",
            "email": "patient@example.com",
            "age": 25,
            "gender": "female",
            "phone_number": "010-1234-5678",
            "resident_number": "990101-2345678"
        })
    }

    pub fn family_member_response(member_id: &str, user_id: &str) -> Value {
        json!({
            "id": member_id,
            "user_id": user_id,
            "name": "Kim Jiho",
            "relation": "child",
            "age": 6,
            "gender": "male",
            "resident_number": "180304-3123456",
            "phone_number": null
        })
    }

    pub fn error_response(message: &str, code: &str) -> Value {
        json!({
            "message": message,
            "code": code
        })
    }
}
