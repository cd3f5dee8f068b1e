//! services/api/src/web/middleware.rs
//!
//! Client identification middleware for the `/api` routes.

use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use tracing::warn;

pub const CLIENT_ID_HEADER: &str = "x-client-id";
const MAX_CLIENT_ID_LEN: usize = 128;

/// The opaque id of the browser making the request. Scopes its durable storage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientId(pub String);

/// Middleware that reads the `x-client-id` header.
///
/// If valid, inserts a `ClientId` into request extensions for handlers to use.
/// If missing or malformed, returns 400 Bad Request.
pub async fn require_client_id(mut req: Request, next: Next) -> Result<Response, StatusCode> {
    // 1. Extract the header
    let client_id = req
        .headers()
        .get(CLIENT_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty() && id.len() <= MAX_CLIENT_ID_LEN)
        .map(str::to_string)
        .ok_or_else(|| {
            warn!("Rejected request without a usable {} header", CLIENT_ID_HEADER);
            StatusCode::BAD_REQUEST
        })?;

    // 2. Insert it into request extensions
    req.extensions_mut().insert(ClientId(client_id));

    // 3. Continue to the handler
    Ok(next.run(req).await)
}
