//! Router assembly and the shared handler plumbing: status-code mapping,
//! token checks, and the paused-service gate.

use crate::error::TestbedError;
use crate::options::TestbedOptions;
use crate::state::DeploymentState;
use crate::{control, image_api, object_api};
use axum::Router;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use imgcheck::api::{AUTH_TOKEN_HEADER, ErrorResponse};
use log::info;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

pub type AppState = Arc<DeploymentState>;

/// Error shape every handler returns on the failure path.
pub(crate) type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn error_to_status_code(error_code: &str) -> StatusCode {
    match error_code {
        "invalid_parameter" | "validation_error" => StatusCode::BAD_REQUEST,
        "unauthorized" => StatusCode::UNAUTHORIZED,
        "not_found" => StatusCode::NOT_FOUND,
        "conflict" => StatusCode::CONFLICT,
        "service_unavailable" => StatusCode::SERVICE_UNAVAILABLE,
        "internal_error" => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn reject(code: &str, message: impl Into<String>) -> ApiError {
    (
        error_to_status_code(code),
        Json(ErrorResponse::new(code, message)),
    )
}

pub(crate) fn domain_error(error: TestbedError) -> ApiError {
    let response = ErrorResponse::from(error);
    (error_to_status_code(&response.error), Json(response))
}

/// Every authenticated endpoint checks the session token header first.
pub(crate) fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let token = headers
        .get(AUTH_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok());
    match token {
        Some(token) if state.token_valid(token) => Ok(()),
        _ => Err(reject("unauthorized", "Missing or invalid auth token")),
    }
}

/// Paused services refuse API traffic until resumed.
pub(crate) fn require_running(state: &AppState, service: &str) -> Result<(), ApiError> {
    if state.service_running(service) {
        Ok(())
    } else {
        Err(reject(
            "service_unavailable",
            format!("Service '{service}' is not running"),
        ))
    }
}

pub fn create_state(options: &TestbedOptions) -> Result<AppState, TestbedError> {
    Ok(Arc::new(DeploymentState::new(options)?))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(control::router())
        .merge(image_api::router())
        .merge(object_api::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the assembled routers on an already-bound listener. The validation
/// suite uses this with an ephemeral port.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    axum::serve(listener, build_router(state)).await
}

pub async fn start_server(
    port: u16,
    options: &TestbedOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let state = create_state(options)?;
    let bind_address = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&bind_address)
        .await
        .map_err(|e| format!("Failed to bind to address {bind_address}: {e}"))?;
    info!(
        "imgcheck testbed ({}) starting on http://{bind_address}",
        options.release
    );
    serve(listener, state)
        .await
        .map_err(|e| format!("Testbed failed to start: {e}"))?;
    Ok(())
}
