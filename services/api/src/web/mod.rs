pub mod middleware;
pub mod rest;
pub mod session;
pub mod state;
pub mod wizard;

pub use middleware::require_client_id;

use axum::{
    middleware as axum_middleware,
    routing::{get, patch, post, put},
    Router,
};
use std::sync::Arc;

use state::AppState;

/// Builds the `/api` router. CORS and docs are layered on by the binary.
pub fn api_router(app_state: Arc<AppState>) -> Router {
    // Role resolution reads and writes per-browser storage.
    let session_routes = Router::new()
        .route("/api/session/resolve", post(session::resolve_handler))
        .route("/api/session/navigate", post(session::navigate_handler))
        .route(
            "/api/session/role",
            put(session::select_role_handler).delete(session::clear_role_handler),
        )
        .layer(axum_middleware::from_fn(require_client_id));

    let wizard_routes = Router::new()
        .route("/api/wizards", post(wizard::create_wizard_handler))
        .route("/api/wizards/{id}", get(wizard::get_wizard_handler))
        .route("/api/wizards/{id}/fields", patch(wizard::update_fields_handler))
        .route("/api/wizards/{id}/advance", post(wizard::advance_handler))
        .route("/api/wizards/{id}/retreat", post(wizard::retreat_handler))
        .route("/api/wizards/{id}/submit", post(wizard::submit_handler));

    let content_routes = Router::new()
        .route(
            "/api/students/{id}",
            put(rest::put_student_handler).get(rest::get_student_handler),
        )
        .route(
            "/api/campaigns",
            get(rest::list_campaigns_handler).post(rest::create_campaign_handler),
        )
        .route(
            "/api/campaigns/{id}/status",
            put(rest::update_campaign_status_handler),
        )
        .route(
            "/api/challenges",
            get(rest::list_challenges_handler).post(rest::create_challenge_handler),
        );

    Router::new()
        .merge(session_routes)
        .merge(wizard_routes)
        .merge(content_routes)
        .with_state(app_state)
}
