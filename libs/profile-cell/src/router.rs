// libs/profile-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put, delete},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn profile_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        .route("/", get(handlers::get_profile).put(handlers::update_profile))
        .route("/name", put(handlers::update_name))
        .route("/resident-number", post(handlers::preview_resident_number))
        .route("/family", get(handlers::list_family_members).post(handlers::add_family_member))
        .route("/family/{member_id}", delete(handlers::remove_family_member))
        .route(
            "/insurance",
            get(handlers::get_insurance)
                .put(handlers::upsert_insurance)
                .delete(handlers::delete_insurance),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
