//! Object-store gateway routes, shaped like the Swift API the storage
//! gateway is compatible with: `/v1/{account}/{container}/{object}`.

use crate::server::{ApiError, AppState, authorize, domain_error, reject};
use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use axum::routing::{get, put};
use imgcheck::{ContainerSummary, StoredObject};
use log::trace;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/{account}", get(get_account))
        .route(
            "/v1/{account}/{container}",
            get(get_container).put(put_container).delete(delete_container),
        )
        .route(
            "/v1/{account}/{container}/{object}",
            put(put_object).delete(delete_object),
        )
}

fn check_account(state: &AppState, account: &str) -> Result<(), ApiError> {
    if account == state.account() {
        Ok(())
    } else {
        Err(reject("not_found", format!("Account '{account}' not found")))
    }
}

async fn get_account(
    State(state): State<AppState>,
    Path(account): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Vec<ContainerSummary>>, ApiError> {
    authorize(&state, &headers)?;
    check_account(&state, &account)?;
    Ok(Json(state.container_summaries()))
}

async fn get_container(
    State(state): State<AppState>,
    Path((account, container)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<Vec<StoredObject>>, ApiError> {
    authorize(&state, &headers)?;
    check_account(&state, &account)?;
    state
        .container_objects(&container)
        .map(Json)
        .ok_or_else(|| reject("not_found", format!("Container '{container}' not found")))
}

async fn put_container(
    State(state): State<AppState>,
    Path((account, container)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    authorize(&state, &headers)?;
    check_account(&state, &account)?;
    if state.create_container(&container) {
        trace!("PUT /v1/{account}/{container} - created");
        Ok(StatusCode::CREATED)
    } else {
        Ok(StatusCode::ACCEPTED)
    }
}

async fn delete_container(
    State(state): State<AppState>,
    Path((account, container)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    authorize(&state, &headers)?;
    check_account(&state, &account)?;
    state.delete_container(&container).map_err(domain_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn put_object(
    State(state): State<AppState>,
    Path((account, container, object)): Path<(String, String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    authorize(&state, &headers)?;
    check_account(&state, &account)?;
    state
        .put_object(&container, &object, body.to_vec())
        .map_err(domain_error)?;
    trace!("PUT /v1/{account}/{container}/{object} - {} bytes", body.len());
    Ok(StatusCode::CREATED)
}

async fn delete_object(
    State(state): State<AppState>,
    Path((account, container, object)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    authorize(&state, &headers)?;
    check_account(&state, &account)?;
    state
        .delete_object(&container, &object)
        .map_err(domain_error)?;
    Ok(StatusCode::NO_CONTENT)
}
