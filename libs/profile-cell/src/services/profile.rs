use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, error, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{Profile, ProfileError, UpdateProfileRequest};
use crate::services::resident::{derive_now, normalize, Derivation};

pub struct ProfileService {
    supabase: SupabaseClient,
}

impl ProfileService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn get_profile(&self, user_id: Uuid, auth_token: &str) -> Result<Profile, ProfileError> {
        debug!("Fetching profile for user: {}", user_id);

        let path = format!("/rest/v1/profiles?id=eq.{}", user_id);
        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(database_error)?;

        let row = rows.into_iter().next().ok_or(ProfileError::NotFound)?;
        parse_profile(row)
    }

    /// Age and gender follow the resident number whenever it can be read.
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        request: UpdateProfileRequest,
        auth_token: &str,
    ) -> Result<Profile, ProfileError> {
        let update_data = build_profile_update(request, derive_now)?;
        if update_data.is_empty() {
            return Err(ProfileError::ValidationError("No fields to update".to_string()));
        }

        let profile = self.patch_profile(user_id, update_data, auth_token).await?;
        info!("Profile updated for user {}", user_id);
        Ok(profile)
    }

    pub async fn update_name(&self, user_id: Uuid, name: &str, auth_token: &str) -> Result<Profile, ProfileError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ProfileError::ValidationError("Name cannot be empty".to_string()));
        }

        let mut update_data = Map::new();
        update_data.insert("name".to_string(), json!(name));

        self.patch_profile(user_id, update_data, auth_token).await
    }

    async fn patch_profile(
        &self,
        user_id: Uuid,
        mut update_data: Map<String, Value>,
        auth_token: &str,
    ) -> Result<Profile, ProfileError> {
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/profiles?id=eq.{}", user_id);
        let rows: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(Value::Object(update_data)),
            Some(SupabaseClient::return_representation()),
        ).await.map_err(database_error)?;

        let row = rows.into_iter().next().ok_or(ProfileError::NotFound)?;
        parse_profile(row)
    }
}

/// Columns to write for a profile update. `derive` is injected so the
/// derivation can be pinned to a year in tests.
pub fn build_profile_update(
    request: UpdateProfileRequest,
    derive: impl Fn(&str) -> Derivation,
) -> Result<Map<String, Value>, ProfileError> {
    // Outer None leaves the column alone, Some(None) clears it.
    let mut age = request.age.map(Some);
    let mut gender = request.gender.map(Some);
    let mut update_data = Map::new();

    if let Some(raw) = request.resident_number {
        let resident_number = normalize(&raw);

        match derive(&resident_number) {
            Derivation::Derived { age: derived_age, gender: derived_gender, .. } => {
                age = Some(Some(derived_age));
                gender = Some(Some(derived_gender));
            }
            Derivation::Cleared => {
                age = Some(None);
                gender = Some(None);
            }
            Derivation::Undetermined => {}
        }

        let value = if resident_number.is_empty() { Value::Null } else { json!(resident_number) };
        update_data.insert("resident_number".to_string(), value);
    }

    if let Some(age) = age {
        if matches!(age, Some(years) if years < 0) {
            return Err(ProfileError::ValidationError("Age cannot be negative".to_string()));
        }
        update_data.insert("age".to_string(), json!(age));
    }
    if let Some(gender) = gender {
        update_data.insert("gender".to_string(), json!(gender));
    }
    if let Some(phone_number) = request.phone_number {
        let phone_number = phone_number.trim();
        let value = if phone_number.is_empty() { Value::Null } else { json!(phone_number) };
        update_data.insert("phone_number".to_string(), value);
    }

    Ok(update_data)
}

fn parse_profile(row: Value) -> Result<Profile, ProfileError> {
    serde_json::from_value(row).map_err(|e| {
        ProfileError::DatabaseError(format!("Failed to parse profile: {}", e))
    })
}

pub(crate) fn database_error(e: anyhow::Error) -> ProfileError {
    error!("Profile query failed: {}", e);
    ProfileError::DatabaseError(e.to_string())
}
