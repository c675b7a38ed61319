//! Control-plane routes: token issue, service supervision, configuration,
//! deployment status, and the reference image fixture.

use crate::server::{ApiError, AppState, authorize, domain_error, reject};
use crate::state::DeploymentState;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::Json;
use axum::routing::{get, post};
use imgcheck::api::{
    ApplyConfigRequest, ConfigOptionsResponse, DeploymentStatusResponse, RenderedFileQuery,
    RenderedFileResponse, ServiceCatalog, ServiceStatus, ServicesResponse, TokenRequest,
    TokenResponse,
};
use log::{error, info, trace};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/tokens", post(issue_token))
        .route("/services", get(list_services))
        .route("/services/{name}", get(service_status))
        .route("/services/{name}/pause", post(pause_service))
        .route("/services/{name}/resume", post(resume_service))
        .route("/config/options", get(config_options).post(apply_config))
        .route("/config/files", get(rendered_file))
        .route("/status", get(deployment_status))
        .route("/fixtures/disk.img", get(reference_image))
}

fn catalog_for(host: &str, account: &str) -> ServiceCatalog {
    let base = format!("http://{host}");
    ServiceCatalog {
        image: base.clone(),
        object_store: format!("{base}/v1"),
        account: account.to_string(),
        control: base.clone(),
        reference_image: format!("{base}/fixtures/disk.img"),
    }
}

#[tracing::instrument(level = "debug", skip(state, request), fields(name = %request.name))]
async fn issue_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<TokenRequest>,
) -> Result<(StatusCode, Json<TokenResponse>), ApiError> {
    let Some(token) = state.issue_token(&request.name, &request.secret) else {
        error!("POST /auth/tokens rejected credentials for '{}'", request.name);
        return Err(reject("unauthorized", "Invalid credentials"));
    };
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("127.0.0.1");
    info!("issued token for '{}' via {host}", request.name);
    Ok((
        StatusCode::CREATED,
        Json(TokenResponse {
            token,
            catalog: catalog_for(host, state.account()),
        }),
    ))
}

async fn list_services(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ServicesResponse>, ApiError> {
    authorize(&state, &headers)?;
    Ok(Json(ServicesResponse {
        services: state.service_statuses(),
    }))
}

async fn service_status(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ServiceStatus>, ApiError> {
    authorize(&state, &headers)?;
    state
        .service_status(&name)
        .map(Json)
        .ok_or_else(|| reject("not_found", format!("Service '{name}' not found")))
}

#[tracing::instrument(level = "debug", skip(state, headers), fields(service = %name))]
async fn pause_service(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<ServiceStatus>), ApiError> {
    authorize(&state, &headers)?;
    let status = state.pause_service(&name).map_err(domain_error)?;
    info!("paused service '{name}'");
    Ok((StatusCode::ACCEPTED, Json(status)))
}

#[tracing::instrument(level = "debug", skip(state, headers), fields(service = %name))]
async fn resume_service(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<ServiceStatus>), ApiError> {
    authorize(&state, &headers)?;
    let status = state.resume_service(&name).map_err(domain_error)?;
    info!("resumed service '{name}'");
    Ok((StatusCode::ACCEPTED, Json(status)))
}

async fn config_options(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ConfigOptionsResponse>, ApiError> {
    authorize(&state, &headers)?;
    Ok(Json(ConfigOptionsResponse {
        options: state.config_options(),
    }))
}

#[tracing::instrument(level = "debug", skip(state, headers, request))]
async fn apply_config(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ApplyConfigRequest>,
) -> Result<Json<ConfigOptionsResponse>, ApiError> {
    authorize(&state, &headers)?;
    if request.options.is_empty() {
        return Err(reject("validation_error", "Empty config delta"));
    }
    state.apply_config(&request.options).map_err(|error| {
        error!("POST /config/options failed: {error}");
        domain_error(error)
    })?;
    trace!("applied config delta of {} option(s)", request.options.len());
    Ok(Json(ConfigOptionsResponse {
        options: state.config_options(),
    }))
}

async fn rendered_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<RenderedFileQuery>,
) -> Result<Json<RenderedFileResponse>, ApiError> {
    authorize(&state, &headers)?;
    state
        .rendered_file(&query.path)
        .map(|content| {
            Json(RenderedFileResponse {
                path: query.path.clone(),
                content,
            })
        })
        .ok_or_else(|| {
            reject(
                "not_found",
                format!("No rendered config file at '{}'", query.path),
            )
        })
}

async fn deployment_status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<DeploymentStatusResponse>, ApiError> {
    authorize(&state, &headers)?;
    Ok(Json(DeploymentStatusResponse {
        release: state.release(),
    }))
}

/// The reference image source is served unauthenticated, like any public
/// image mirror would be.
async fn reference_image() -> ([(header::HeaderName, &'static str); 1], Vec<u8>) {
    (
        [(header::CONTENT_TYPE, "application/octet-stream")],
        DeploymentState::reference_image(),
    )
}
