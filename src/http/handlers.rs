//! JSON handlers for the public API.
//!
//! Each handler maps service errors onto HTTP statuses explicitly; unknown
//! kinds become a logged 500 so nothing crosses the transport boundary
//! unclassified.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::error;
use uuid::Uuid;

use super::middleware_auth::RequireUser;
use super::AppState;
use crate::service::ServiceError;

#[derive(Deserialize)]
pub(super) struct CredentialsPayload {
    #[serde(default)]
    login: String,
    #[serde(default)]
    password: String,
}

#[derive(Deserialize)]
pub(super) struct CalculatePayload {
    #[serde(default)]
    expression: String,
}

fn error_body(message: impl Into<String>) -> Json<serde_json::Value> {
    Json(json!({ "error": message.into() }))
}

fn service_unavailable() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        error_body("service temporarily unavailable"),
    )
}

fn internal(err: ServiceError) -> (StatusCode, Json<serde_json::Value>) {
    error!(error = %err, "unhandled service error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        error_body("internal server error"),
    )
}

/// POST /api/v1/register — create an account, returning a bearer token.
pub(super) async fn handler_register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CredentialsPayload>,
) -> impl IntoResponse {
    if payload.login.is_empty() || payload.password.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            error_body("login and password should not be empty"),
        );
    }

    match state
        .accounts
        .register(&payload.login, &payload.password)
        .await
    {
        Ok(token) => (StatusCode::OK, Json(json!({ "token": token }))),
        Err(
            e @ (ServiceError::UserAlreadyExists
            | ServiceError::InvalidLogin
            | ServiceError::WeakPassword),
        ) => (StatusCode::UNPROCESSABLE_ENTITY, error_body(e.to_string())),
        Err(ServiceError::Unavailable) => service_unavailable(),
        Err(e) => internal(e),
    }
}

/// POST /api/v1/login — exchange credentials for a bearer token.
pub(super) async fn handler_login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CredentialsPayload>,
) -> impl IntoResponse {
    if payload.login.is_empty() || payload.password.is_empty() {
        return (StatusCode::BAD_REQUEST, error_body("invalid request payload"));
    }

    match state
        .accounts
        .authenticate(&payload.login, &payload.password)
        .await
    {
        Ok(token) => (StatusCode::OK, Json(json!({ "token": token }))),
        Err(
            e @ (ServiceError::UserNotFound
            | ServiceError::InvalidPassword
            | ServiceError::InvalidLogin),
        ) => (StatusCode::UNAUTHORIZED, error_body(e.to_string())),
        Err(ServiceError::Unavailable) => service_unavailable(),
        Err(e) => internal(e),
    }
}

/// POST /api/v1/calculate — plan an expression and enqueue its tasks.
/// Acknowledges synchronously with the expression id to poll.
pub(super) async fn handler_calculate(
    State(state): State<Arc<AppState>>,
    RequireUser(user_id): RequireUser,
    Json(payload): Json<CalculatePayload>,
) -> impl IntoResponse {
    if payload.expression.is_empty() {
        return (StatusCode::BAD_REQUEST, error_body("invalid request payload"));
    }

    match state
        .scheduler
        .create_expression_task(user_id, &payload.expression)
        .await
    {
        Ok(id) => (StatusCode::CREATED, Json(json!({ "id": id }))),
        Err(e @ ServiceError::Expression(_)) => {
            (StatusCode::UNPROCESSABLE_ENTITY, error_body(e.to_string()))
        }
        Err(e @ ServiceError::UnknownUser) => (StatusCode::NOT_FOUND, error_body(e.to_string())),
        Err(ServiceError::Unavailable) => service_unavailable(),
        Err(e) => internal(e),
    }
}

/// GET /api/v1/expressions — all expressions owned by the caller.
pub(super) async fn handler_expressions(
    State(state): State<Arc<AppState>>,
    RequireUser(user_id): RequireUser,
) -> impl IntoResponse {
    match state.scheduler.get_all_expressions(user_id).await {
        Ok(expressions) => (StatusCode::OK, Json(json!({ "expressions": expressions }))),
        Err(e @ ServiceError::UnknownUser) => (StatusCode::NOT_FOUND, error_body(e.to_string())),
        Err(ServiceError::Unavailable) => service_unavailable(),
        Err(e) => internal(e),
    }
}

/// GET /api/v1/expressions/{id} — one expression, owner-only.
pub(super) async fn handler_expression_by_id(
    State(state): State<Arc<AppState>>,
    RequireUser(user_id): RequireUser,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let Ok(id) = Uuid::parse_str(&id) else {
        return (StatusCode::BAD_REQUEST, error_body("invalid request payload"));
    };
    if id.is_nil() {
        return (StatusCode::BAD_REQUEST, error_body("invalid request payload"));
    }

    match state.scheduler.get_expression_by_id(user_id, id).await {
        Ok(expression) => (StatusCode::OK, Json(json!({ "expression": expression }))),
        Err(e @ ServiceError::UnknownExpression) => {
            (StatusCode::NOT_FOUND, error_body(e.to_string()))
        }
        Err(ServiceError::Forbidden) => (
            StatusCode::FORBIDDEN,
            error_body("you are not allowed to access this expression"),
        ),
        Err(ServiceError::Unavailable) => service_unavailable(),
        Err(e) => internal(e),
    }
}

/// GET /api/v1/ping — liveness probe.
pub(super) async fn handler_ping() -> impl IntoResponse {
    (StatusCode::OK, "pong")
}
