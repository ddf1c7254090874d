use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{AddFamilyMemberRequest, FamilyMember, Gender, ProfileError};
use crate::services::profile::database_error;
use crate::services::resident::{derive_now, normalize, Derivation};

pub struct FamilyService {
    supabase: SupabaseClient,
}

impl FamilyService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn list_family_members(
        &self,
        user_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<FamilyMember>, ProfileError> {
        let path = format!("/rest/v1/family_members?user_id=eq.{}&order=created_at.asc", user_id);
        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(database_error)?;

        rows.into_iter().map(parse_member).collect()
    }

    pub async fn add_family_member(
        &self,
        user_id: Uuid,
        request: AddFamilyMemberRequest,
        auth_token: &str,
    ) -> Result<FamilyMember, ProfileError> {
        let member_data = build_member_row(user_id, request, derive_now)?;

        let rows: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/family_members",
            Some(auth_token),
            Some(member_data),
            Some(SupabaseClient::return_representation()),
        ).await.map_err(database_error)?;

        let row = rows.into_iter().next().ok_or_else(|| {
            ProfileError::DatabaseError("Failed to add family member".to_string())
        })?;
        let member = parse_member(row)?;

        info!("Family member {} added for user {}", member.id, user_id);
        Ok(member)
    }

    /// Deletes the member only when it belongs to `user_id`. Returns whether
    /// anything was removed; a foreign or missing id is not an error.
    pub async fn remove_family_member(
        &self,
        user_id: Uuid,
        member_id: Uuid,
        auth_token: &str,
    ) -> Result<bool, ProfileError> {
        let path = format!("/rest/v1/family_members?id=eq.{}", member_id);
        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(database_error)?;

        let owned = match rows.into_iter().next().map(parse_member).transpose()? {
            Some(member) => member.user_id == user_id,
            None => false,
        };

        if !owned {
            warn!("User {} tried to remove family member {} they do not own", user_id, member_id);
            return Ok(false);
        }

        let delete_path = format!("/rest/v1/family_members?id=eq.{}&user_id=eq.{}", member_id, user_id);
        let _: () = self.supabase.request(
            Method::DELETE,
            &delete_path,
            Some(auth_token),
            None,
        ).await.map_err(database_error)?;

        debug!("Family member {} removed", member_id);
        Ok(true)
    }
}

/// Insert payload. A readable resident number overrides age and gender;
/// one too short to read resets them.
pub fn build_member_row(
    user_id: Uuid,
    request: AddFamilyMemberRequest,
    derive: impl Fn(&str) -> Derivation,
) -> Result<Value, ProfileError> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(ProfileError::ValidationError("Name is required".to_string()));
    }

    let mut age = request.age;
    let mut gender = request.gender;
    let mut resident_number = None;

    if let Some(raw) = request.resident_number {
        let formatted = normalize(&raw);

        match derive(&formatted) {
            Derivation::Derived { age: derived_age, gender: derived_gender, .. } => {
                age = Some(derived_age);
                gender = derived_gender;
            }
            Derivation::Cleared => {
                age = None;
                gender = Gender::Male;
            }
            Derivation::Undetermined => {}
        }

        resident_number = Some(formatted).filter(|number| !number.is_empty());
    }

    Ok(json!({
        "user_id": user_id,
        "name": name,
        "relation": request.relation,
        "age": age,
        "gender": gender,
        "resident_number": resident_number,
        "phone_number": request.phone_number.filter(|phone| !phone.trim().is_empty()),
        "created_at": Utc::now().to_rfc3339()
    }))
}

fn parse_member(row: Value) -> Result<FamilyMember, ProfileError> {
    serde_json::from_value(row).map_err(|e| {
        ProfileError::DatabaseError(format!("Failed to parse family member: {}", e))
    })
}
