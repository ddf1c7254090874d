use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{Insurance, InsuranceRequest, ProfileError};
use crate::services::profile::database_error;

/// One insurance record per user, keyed by `user_id`.
pub struct InsuranceService {
    supabase: SupabaseClient,
}

impl InsuranceService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn get_insurance(&self, user_id: Uuid, auth_token: &str) -> Result<Option<Insurance>, ProfileError> {
        let path = format!("/rest/v1/insurances?user_id=eq.{}", user_id);
        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(database_error)?;

        rows.into_iter().next().map(parse_insurance).transpose()
    }

    pub async fn upsert_insurance(
        &self,
        user_id: Uuid,
        request: InsuranceRequest,
        auth_token: &str,
    ) -> Result<Insurance, ProfileError> {
        let provider = request.provider.trim();
        let policy_number = request.policy_number.trim();
        if provider.is_empty() || policy_number.is_empty() {
            return Err(ProfileError::ValidationError(
                "Provider and policy number are required".to_string(),
            ));
        }

        let insurance_data = json!({
            "user_id": user_id,
            "provider": provider,
            "policy_number": policy_number,
            "updated_at": Utc::now().to_rfc3339()
        });

        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("resolution=merge-duplicates,return=representation"));

        let rows: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/insurances?on_conflict=user_id",
            Some(auth_token),
            Some(insurance_data),
            Some(headers),
        ).await.map_err(database_error)?;

        let row = rows.into_iter().next().ok_or_else(|| {
            ProfileError::DatabaseError("Failed to save insurance".to_string())
        })?;

        info!("Insurance saved for user {}", user_id);
        parse_insurance(row)
    }

    /// Succeeds whether or not a record existed.
    pub async fn delete_insurance(&self, user_id: Uuid, auth_token: &str) -> Result<(), ProfileError> {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=minimal"));

        let path = format!("/rest/v1/insurances?user_id=eq.{}", user_id);
        let _: () = self.supabase.request_with_headers(
            Method::DELETE,
            &path,
            Some(auth_token),
            None,
            Some(headers),
        ).await.map_err(database_error)?;

        debug!("Insurance removed for user {}", user_id);
        Ok(())
    }
}

fn parse_insurance(row: Value) -> Result<Insurance, ProfileError> {
    serde_json::from_value(row).map_err(|e| {
        ProfileError::DatabaseError(format!("Failed to parse insurance: {}", e))
    })
}
