//! Image-service v2 routes. Every endpoint requires a session token and is
//! gated on the image-api service being up; disk formats are validated
//! against the service's effective configuration.

use crate::server::{ApiError, AppState, authorize, domain_error, reject, require_running};
use crate::state::IMAGE_API_SERVICE;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use axum::routing::{get, post, put};
use imgcheck::Image;
use imgcheck::api::{CreateImageRequest, ImagesResponse};
use log::{error, trace};
use serde::Deserialize;
use uuid::Uuid;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v2/images", post(create_image).get(list_images))
        .route("/v2/images/{id}", get(show_image).delete(delete_image))
        .route("/v2/images/{id}/file", put(upload_image_file))
}

#[derive(Deserialize)]
struct ImageListQuery {
    name: Option<String>,
}

#[tracing::instrument(level = "debug", skip(state, headers, request), fields(name = %request.name))]
async fn create_image(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateImageRequest>,
) -> Result<(StatusCode, Json<Image>), ApiError> {
    authorize(&state, &headers)?;
    require_running(&state, IMAGE_API_SERVICE)?;
    if request.name.trim().is_empty() {
        return Err(reject("validation_error", "Image name must not be empty"));
    }
    let image = state.register_image(&request).map_err(|error| {
        error!("POST /v2/images failed: {error}");
        domain_error(error)
    })?;
    trace!("POST /v2/images - registered image {}", image.id);
    Ok((StatusCode::CREATED, Json(image)))
}

#[tracing::instrument(level = "debug", skip(state, headers, body), fields(image = %id, bytes = body.len()))]
async fn upload_image_file(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    authorize(&state, &headers)?;
    require_running(&state, IMAGE_API_SERVICE)?;
    let image = state
        .upload_image_data(id, body.to_vec())
        .map_err(|error| {
            error!("PUT /v2/images/{id}/file failed: {error}");
            domain_error(error)
        })?;
    trace!(
        "PUT /v2/images/{id}/file - image active, size {}",
        image.size.unwrap_or(0)
    );
    Ok(StatusCode::NO_CONTENT)
}

async fn list_images(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ImageListQuery>,
) -> Result<Json<ImagesResponse>, ApiError> {
    authorize(&state, &headers)?;
    require_running(&state, IMAGE_API_SERVICE)?;
    Ok(Json(ImagesResponse {
        images: state.images_by_name(query.name.as_deref()),
    }))
}

async fn show_image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Image>, ApiError> {
    authorize(&state, &headers)?;
    require_running(&state, IMAGE_API_SERVICE)?;
    state
        .image(id)
        .map(Json)
        .ok_or_else(|| reject("not_found", format!("Image '{id}' not found")))
}

#[tracing::instrument(level = "debug", skip(state, headers), fields(image = %id))]
async fn delete_image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    authorize(&state, &headers)?;
    require_running(&state, IMAGE_API_SERVICE)?;
    state.remove_image(id).map_err(|error| {
        error!("DELETE /v2/images/{id} failed: {error}");
        domain_error(error)
    })?;
    trace!("DELETE /v2/images/{id} - removed");
    Ok(StatusCode::NO_CONTENT)
}
