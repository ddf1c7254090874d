use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use shared_config::AppConfig;

use crate::handlers;

pub fn doctor_routes(state: Arc<AppConfig>) -> Router {
    // Browsing doctors does not require a session
    Router::new()
        .route("/search", get(handlers::search_doctors))
        .route("/{doctor_id}", get(handlers::get_doctor))
        .with_state(state)
}
