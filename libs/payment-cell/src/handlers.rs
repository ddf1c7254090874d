// libs/payment-cell/src/handlers.rs
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

use crate::models::{PaymentCallbackRequest, PaymentError};
use crate::services::{PaymentCallbackService, PaymentLinkService};

impl From<PaymentError> for AppError {
    fn from(e: PaymentError) -> Self {
        match e {
            PaymentError::Unauthorized => AppError::Auth("Unauthorized".to_string()),
            PaymentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
            PaymentError::InvalidState(msg) => AppError::Conflict(msg),
            PaymentError::SignatureError(msg) => AppError::ExternalService(msg),
            PaymentError::NotConfigured(msg) => AppError::Internal(msg),
            PaymentError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

#[axum::debug_handler]
pub async fn create_payment_link(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    user: Option<Extension<User>>,
) -> Result<Json<Value>, AppError> {
    let service = PaymentLinkService::new(&state);
    let session = user.as_ref().map(|Extension(user)| user);

    let link = service.build_payment_link(session, appointment_id, auth.token()).await?;

    Ok(Json(json!({
        "url": link.url,
        "order_no": link.order_no
    })))
}

/// Public: the gateway posts here without a user session.
#[axum::debug_handler]
pub async fn payment_callback(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<PaymentCallbackRequest>,
) -> Result<Json<Value>, AppError> {
    let service = PaymentCallbackService::new(&state);

    let outcome = service.handle_callback(&request, &state.supabase_anon_key).await?;

    Ok(Json(json!({
        "success": outcome.confirmed,
        "appointment_id": outcome.appointment_id,
        "status": outcome.status
    })))
}
