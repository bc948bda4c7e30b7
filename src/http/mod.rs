//! Orchestrator HTTP API.
//!
//! Serves the user-facing JSON endpoints: registration, login, expression
//! submission, and polling. The router carries a permissive CORS layer, a
//! request-body limit, and a logging middleware that emits one structured
//! line per request (uri, status, duration).

mod handlers;
pub(crate) mod middleware_auth;

use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, Instrument};

use crate::auth::JwtManager;
use crate::service::{Accounts, Scheduler};

pub struct AppState {
    pub accounts: Accounts,
    pub scheduler: Arc<Scheduler>,
    pub jwt: JwtManager,
}

impl AppState {
    pub fn new(accounts: Accounts, scheduler: Arc<Scheduler>, jwt: JwtManager) -> Arc<Self> {
        Arc::new(AppState {
            accounts,
            scheduler,
            jwt,
        })
    }
}

/// One structured log line per request, with the handler running inside a
/// request span so downstream logs carry the method and uri.
async fn log_requests(req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let uri = req.uri().path().to_string();
    let start = Instant::now();

    let span = tracing::info_span!("request", method = %method, uri = %uri);
    let response = next.run(req).instrument(span).await;

    let status = response.status().as_u16();
    let duration_ms = start.elapsed().as_millis() as u64;
    if response.status().is_server_error() {
        error!(%method, %uri, status, duration_ms, "request failed");
    } else {
        info!(%method, %uri, status, duration_ms, "request completed");
    }
    response
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/register", post(handlers::handler_register))
        .route("/api/v1/login", post(handlers::handler_login))
        .route("/api/v1/calculate", post(handlers::handler_calculate))
        .route("/api/v1/expressions", get(handlers::handler_expressions))
        .route(
            "/api/v1/expressions/{id}",
            get(handlers::handler_expression_by_id),
        )
        .route("/api/v1/ping", get(handlers::handler_ping))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(axum::middleware::from_fn(log_requests))
        .layer(RequestBodyLimitLayer::new(64 * 1024))
        .with_state(state)
}

/// Bind and serve the HTTP API until the process shuts down.
pub async fn run(state: Arc<AppState>, host: &str, port: u16) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(format!("{host}:{port}")).await?;
    info!(addr = %listener.local_addr()?, "http server listening");
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}
