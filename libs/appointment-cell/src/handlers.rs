// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State, Extension},
    Json,
};
use axum_extra::TypedHeader;
use chrono::Utc;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::require_admin;

use crate::models::{
    AppointmentError, AppointmentGroups, AppointmentSearchQuery, BookAppointmentRequest,
    ConfirmationCheckRequest, CreateAppointmentRequest, UpdateAppointmentRequest,
};
use crate::services::{AppointmentService, ConfirmationService};

impl From<AppointmentError> for AppError {
    fn from(e: AppointmentError) -> Self {
        match e {
            AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
            AppointmentError::DoctorNotFound => AppError::NotFound("Doctor not found".to_string()),
            AppointmentError::Unauthorized => {
                AppError::Forbidden("Not authorized to access this appointment".to_string())
            }
            AppointmentError::InvalidTime(msg) => AppError::BadRequest(msg),
            AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
            AppointmentError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

fn session_user_id(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id)
        .map_err(|_| AppError::Auth("Session user id is not a valid UUID".to_string()))
}

// ==============================================================================
// PATIENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let user_id = session_user_id(&user)?;
    let service = AppointmentService::new(&state);

    let appointment = service.book_appointment(user_id, request, auth.token()).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment requested successfully"
    })))
}

/// The patient's appointments, grouped for the dashboard, plus the ids
/// already awaiting payment, which seed the confirmation poller.
#[axum::debug_handler]
pub async fn get_my_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let user_id = session_user_id(&user)?;
    let service = AppointmentService::new(&state);

    let appointments = service.list_user_appointments(user_id, auth.token()).await?;
    let awaiting_payment_ids: Vec<Uuid> = appointments.iter()
        .filter(|appointment| appointment.is_payment_pending())
        .map(|appointment| appointment.id)
        .collect();

    let groups = AppointmentGroups::split(&appointments, Utc::now());

    Ok(Json(json!({
        "appointments": appointments,
        "groups": groups,
        "awaiting_payment_ids": awaiting_payment_ids,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentService::new(&state);

    let appointment = service.get_appointment(appointment_id, auth.token()).await?;

    if appointment.user_id.to_string() != user.id && !user.is_admin() {
        return Err(AppointmentError::Unauthorized.into());
    }

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn check_confirmations(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<ConfirmationCheckRequest>,
) -> Result<Json<Value>, AppError> {
    let user_id = session_user_id(&user)?;
    let service = ConfirmationService::new(&state);

    let appointments = service
        .check_new_confirmations(user_id, &request.known_ids, auth.token())
        .await?;

    Ok(Json(json!({
        "appointments": appointments
    })))
}

// ==============================================================================
// ADMIN HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<AppointmentSearchQuery>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;
    let service = AppointmentService::new(&state);

    let appointments = service.list_appointments(&query, auth.token()).await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn list_appointment_options(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;
    let service = AppointmentService::new(&state);

    let options = service.list_appointment_options(auth.token()).await?;

    Ok(Json(json!(options)))
}

#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;
    let service = AppointmentService::new(&state);

    let appointment = service.create_appointment(request, auth.token()).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;
    let service = AppointmentService::new(&state);

    let appointment = service.update_appointment(appointment_id, request, auth.token()).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn delete_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;
    let service = AppointmentService::new(&state);

    service.delete_appointment(appointment_id, auth.token()).await?;

    Ok(Json(json!({ "success": true })))
}
