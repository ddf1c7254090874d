// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn appointment_routes(state: Arc<AppConfig>) -> Router {
    // All appointment operations require authentication
    let protected_routes = Router::new()
        // Patient endpoints
        .route("/book", post(handlers::book_appointment))
        .route("/mine", get(handlers::get_my_appointments))
        .route("/confirmations/check", post(handlers::check_confirmations))

        // Admin management (role checked in handlers)
        .route("/", get(handlers::list_appointments).post(handlers::create_appointment))
        .route("/options", get(handlers::list_appointment_options))
        .route(
            "/{appointment_id}",
            get(handlers::get_appointment)
                .put(handlers::update_appointment)
                .delete(handlers::delete_appointment),
        )

        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
