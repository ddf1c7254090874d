// libs/profile-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, State, Extension},
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    AddFamilyMemberRequest, FamilyMemberView, InsuranceRequest, ProfileError,
    ResidentNumberPreview, ResidentNumberRequest, UpdateNameRequest, UpdateProfileRequest,
};
use crate::services::{FamilyService, InsuranceService, ProfileService};

impl From<ProfileError> for AppError {
    fn from(e: ProfileError) -> Self {
        match e {
            ProfileError::NotFound => AppError::NotFound("Profile not found".to_string()),
            ProfileError::ValidationError(msg) => AppError::ValidationError(msg),
            ProfileError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

fn session_user_id(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id)
        .map_err(|_| AppError::Auth("Session user id is not a valid UUID".to_string()))
}

// ==============================================================================
// PROFILE
// ==============================================================================

#[axum::debug_handler]
pub async fn get_profile(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let user_id = session_user_id(&user)?;
    let service = ProfileService::new(&state);

    let profile = service.get_profile(user_id, auth.token()).await?;

    Ok(Json(json!(profile)))
}

#[axum::debug_handler]
pub async fn update_profile(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<Value>, AppError> {
    let user_id = session_user_id(&user)?;
    let service = ProfileService::new(&state);

    let profile = service.update_profile(user_id, request, auth.token()).await?;

    Ok(Json(json!({
        "success": true,
        "profile": profile
    })))
}

#[axum::debug_handler]
pub async fn update_name(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateNameRequest>,
) -> Result<Json<Value>, AppError> {
    let user_id = session_user_id(&user)?;
    let service = ProfileService::new(&state);

    let profile = service.update_name(user_id, &request.name, auth.token()).await?;

    Ok(Json(json!({
        "success": true,
        "profile": profile
    })))
}

/// Normalised form, mask and derived age/gender for a number being typed.
#[axum::debug_handler]
pub async fn preview_resident_number(
    Json(request): Json<ResidentNumberRequest>,
) -> Json<ResidentNumberPreview> {
    Json(ResidentNumberPreview::from_input(&request.resident_number))
}

// ==============================================================================
// FAMILY MEMBERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_family_members(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let user_id = session_user_id(&user)?;
    let service = FamilyService::new(&state);

    let members: Vec<FamilyMemberView> = service.list_family_members(user_id, auth.token()).await?
        .into_iter()
        .map(FamilyMemberView::from)
        .collect();

    Ok(Json(json!({
        "family_members": members,
        "total": members.len()
    })))
}

#[axum::debug_handler]
pub async fn add_family_member(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<AddFamilyMemberRequest>,
) -> Result<Json<Value>, AppError> {
    let user_id = session_user_id(&user)?;
    let service = FamilyService::new(&state);

    let member = service.add_family_member(user_id, request, auth.token()).await?;

    Ok(Json(json!({
        "success": true,
        "family_member": FamilyMemberView::from(member)
    })))
}

#[axum::debug_handler]
pub async fn remove_family_member(
    State(state): State<Arc<AppConfig>>,
    Path(member_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let user_id = session_user_id(&user)?;
    let service = FamilyService::new(&state);

    let removed = service.remove_family_member(user_id, member_id, auth.token()).await?;

    Ok(Json(json!({
        "success": true,
        "removed": removed
    })))
}

// ==============================================================================
// INSURANCE
// ==============================================================================

#[axum::debug_handler]
pub async fn get_insurance(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let user_id = session_user_id(&user)?;
    let service = InsuranceService::new(&state);

    let insurance = service.get_insurance(user_id, auth.token()).await?;

    Ok(Json(json!({ "insurance": insurance })))
}

#[axum::debug_handler]
pub async fn upsert_insurance(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<InsuranceRequest>,
) -> Result<Json<Value>, AppError> {
    let user_id = session_user_id(&user)?;
    let service = InsuranceService::new(&state);

    let insurance = service.upsert_insurance(user_id, request, auth.token()).await?;

    Ok(Json(json!({
        "success": true,
        "insurance": insurance
    })))
}

#[axum::debug_handler]
pub async fn delete_insurance(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let user_id = session_user_id(&user)?;
    let service = InsuranceService::new(&state);

    service.delete_insurance(user_id, auth.token()).await?;

    Ok(Json(json!({ "success": true })))
}
