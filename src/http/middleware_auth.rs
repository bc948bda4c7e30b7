//! Bearer-token extractor for authenticated routes.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use uuid::Uuid;

use super::AppState;

/// Axum extractor that requires a valid bearer token and yields the
/// authenticated user id. Returns 401 if the header is missing or the
/// token does not verify.
pub struct RequireUser(pub Uuid);

impl FromRequestParts<Arc<AppState>> for RequireUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(serde_json::json!({"error": "Authorization header is required"})),
                )
                    .into_response()
            })?;

        let token = header.strip_prefix("Bearer ").unwrap_or(header);
        let user_id = state.jwt.parse(token).map_err(|_| {
            (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({"error": "Invalid token"})),
            )
                .into_response()
        })?;

        Ok(RequireUser(user_id))
    }
}
