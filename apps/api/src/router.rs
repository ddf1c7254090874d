use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::appointment_routes;
use doctor_cell::doctor_routes;
use payment_cell::payment_routes;
use profile_cell::profile_routes;
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Telecare API is running!" }))
        .nest("/doctors", doctor_routes(state.clone()))
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/api/payment", payment_routes(state.clone()))
        .nest("/profile", profile_routes(state))
}
