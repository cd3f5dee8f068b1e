//! services/api/src/web/session.rs
//!
//! Role resolution endpoints: which role a visitor acts as, where a path takes
//! them, and the pre-login role picker.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use eco_portal_core::domain::{Identity, IdentityMetadata, Role};
use eco_portal_core::routes::RouteDecision;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

use crate::web::middleware::ClientId;
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema, Default)]
pub struct IdentityMetadataPayload {
    pub role: Option<String>,
}

/// The user record from the auth provider. Accepts both snake and camel case.
#[derive(Deserialize, ToSchema, Default)]
pub struct IdentityPayload {
    pub id: String,
    pub email: Option<String>,
    #[serde(alias = "userName")]
    pub user_name: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<IdentityMetadataPayload>,
    #[serde(alias = "userType")]
    pub user_type: Option<String>,
}

impl From<IdentityPayload> for Identity {
    fn from(p: IdentityPayload) -> Self {
        Identity {
            id: p.id,
            email: p.email,
            user_name: p.user_name,
            role: p.role,
            metadata: p.metadata.map(|m| IdentityMetadata { role: m.role }),
            user_type: p.user_type,
        }
    }
}

#[derive(Deserialize, ToSchema, Default)]
pub struct ResolveRequest {
    /// Absent for visitors who have not signed in.
    pub identity: Option<IdentityPayload>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ResolveResponse {
    pub role: Option<String>,
    pub landing: String,
    pub routes: Vec<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct NavigateRequest {
    pub identity: Option<IdentityPayload>,
    pub path: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct NavigateResponse {
    /// Either `render` or `redirect`.
    pub decision: String,
    pub path: String,
}

#[derive(Deserialize, ToSchema)]
pub struct SelectRoleRequest {
    pub role: String,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /api/session/resolve - Resolve the acting role and its route set
#[utoipa::path(
    post,
    path = "/api/session/resolve",
    request_body = ResolveRequest,
    responses(
        (status = 200, description = "Role resolved", body = ResolveResponse)
    ),
    params(
        ("x-client-id" = String, Header, description = "Opaque id of the calling browser.")
    )
)]
pub async fn resolve_handler(
    State(state): State<Arc<AppState>>,
    Extension(ClientId(client_id)): Extension<ClientId>,
    Json(req): Json<ResolveRequest>,
) -> impl IntoResponse {
    let identity = req.identity.map(Identity::from);
    let resolution = state
        .role_session(&client_id)
        .resolve(identity.as_ref())
        .await;

    Json(ResolveResponse {
        role: resolution.role.map(|r| r.to_string()),
        landing: resolution.routes.landing().path().to_string(),
        routes: resolution
            .routes
            .routes()
            .iter()
            .map(|r| r.path().to_string())
            .collect(),
    })
}

/// POST /api/session/navigate - Decide whether a path renders or redirects
#[utoipa::path(
    post,
    path = "/api/session/navigate",
    request_body = NavigateRequest,
    responses(
        (status = 200, description = "Routing decision", body = NavigateResponse)
    ),
    params(
        ("x-client-id" = String, Header, description = "Opaque id of the calling browser.")
    )
)]
pub async fn navigate_handler(
    State(state): State<Arc<AppState>>,
    Extension(ClientId(client_id)): Extension<ClientId>,
    Json(req): Json<NavigateRequest>,
) -> impl IntoResponse {
    let identity = req.identity.map(Identity::from);
    let resolution = state
        .role_session(&client_id)
        .resolve(identity.as_ref())
        .await;

    let response = match resolution.routes.decide(&req.path) {
        RouteDecision::Render(route) => NavigateResponse {
            decision: "render".to_string(),
            path: route.path().to_string(),
        },
        RouteDecision::Redirect(target) => NavigateResponse {
            decision: "redirect".to_string(),
            path: target.to_string(),
        },
    };
    Json(response)
}

/// PUT /api/session/role - Remember the role picked before login
#[utoipa::path(
    put,
    path = "/api/session/role",
    request_body = SelectRoleRequest,
    responses(
        (status = 204, description = "Role override stored"),
        (status = 400, description = "Unknown role"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("x-client-id" = String, Header, description = "Opaque id of the calling browser.")
    )
)]
pub async fn select_role_handler(
    State(state): State<Arc<AppState>>,
    Extension(ClientId(client_id)): Extension<ClientId>,
    Json(req): Json<SelectRoleRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let role = req
        .role
        .parse::<Role>()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    state
        .role_session(&client_id)
        .select_role(role)
        .await
        .map_err(|e| {
            error!("Failed to store role override: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to store role".to_string(),
            )
        })?;

    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/session/role - Forget the role picked before login
#[utoipa::path(
    delete,
    path = "/api/session/role",
    responses(
        (status = 204, description = "Role override cleared"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("x-client-id" = String, Header, description = "Opaque id of the calling browser.")
    )
)]
pub async fn clear_role_handler(
    State(state): State<Arc<AppState>>,
    Extension(ClientId(client_id)): Extension<ClientId>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .role_session(&client_id)
        .clear_override()
        .await
        .map_err(|e| {
            error!("Failed to clear role override: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to clear role".to_string(),
            )
        })?;

    Ok(StatusCode::NO_CONTENT)
}
