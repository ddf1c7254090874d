// libs/profile-cell/src/models.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

use crate::services::resident::{self, Derivation};

// ==============================================================================
// CORE PROFILE MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    #[default]
    Male,
    Female,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
    pub age: Option<i32>,
    pub gender: Option<Gender>,
    pub phone_number: Option<String>,
    pub resident_number: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FamilyMember {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub relation: String,
    pub age: Option<i32>,
    pub gender: Gender,
    pub resident_number: Option<String>,
    pub phone_number: Option<String>,
}

impl FamilyMember {
    pub fn masked_resident_number(&self) -> Option<String> {
        self.resident_number.as_deref()
            .filter(|number| !number.is_empty())
            .map(resident::mask)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Insurance {
    pub user_id: Uuid,
    pub provider: String,
    pub policy_number: String,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    pub age: Option<i32>,
    pub gender: Option<Gender>,
    pub phone_number: Option<String>,
    pub resident_number: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateNameRequest {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResidentNumberRequest {
    pub resident_number: String,
}

/// What the profile forms show while a resident number is being typed.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResidentNumberPreview {
    pub resident_number: String,
    pub masked: String,
    pub derivation: Derivation,
}

impl ResidentNumberPreview {
    pub fn from_input(input: &str) -> Self {
        let resident_number = resident::normalize(input);
        Self {
            masked: resident::mask(&resident_number),
            derivation: resident::derive_now(&resident_number),
            resident_number,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddFamilyMemberRequest {
    pub name: String,
    #[serde(default = "default_relation")]
    pub relation: String,
    pub age: Option<i32>,
    #[serde(default)]
    pub gender: Gender,
    pub resident_number: Option<String>,
    pub phone_number: Option<String>,
}

fn default_relation() -> String {
    "child".to_string()
}

/// Family member as listed to the owner; the full resident number is
/// never sent back.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FamilyMemberView {
    pub id: Uuid,
    pub name: String,
    pub relation: String,
    pub age: Option<i32>,
    pub gender: Gender,
    pub resident_number: Option<String>,
    pub phone_number: Option<String>,
}

impl From<FamilyMember> for FamilyMemberView {
    fn from(member: FamilyMember) -> Self {
        Self {
            resident_number: member.masked_resident_number(),
            id: member.id,
            name: member.name,
            relation: member.relation,
            age: member.age,
            gender: member.gender,
            phone_number: member.phone_number,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsuranceRequest {
    pub provider: String,
    pub policy_number: String,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("Profile not found")]
    NotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
