// libs/payment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::post,
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn payment_routes(state: Arc<AppConfig>) -> Router {
    let public_routes = Router::new()
        .route("/callback", post(handlers::payment_callback));

    let protected_routes = Router::new()
        .route("/link/{appointment_id}", post(handlers::create_payment_link))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
