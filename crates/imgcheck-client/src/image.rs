use crate::error::{ClientError, status_error};
use crate::session::{AUTH_TOKEN_HEADER, Session};
use imgcheck::api::{CreateImageRequest, ImagesResponse};
use imgcheck::{DiskFormat, Image, StoreBackend};
use log::{debug, info};
use reqwest::StatusCode;
use uuid::Uuid;

/// Client for the image service's v2 API.
#[derive(Debug, Clone)]
pub struct ImageClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl ImageClient {
    pub fn new(session: &Session) -> Self {
        Self {
            http: session.http().clone(),
            base_url: session.catalog().image.clone(),
            token: session.token().to_string(),
        }
    }

    pub async fn create(&self, request: &CreateImageRequest) -> Result<Image, ClientError> {
        let response = self
            .http
            .post(format!("{}/v2/images", self.base_url))
            .header(AUTH_TOKEN_HEADER, &self.token)
            .json(request)
            .send()
            .await
            .map_err(|e| ClientError::transport("create image", e))?;
        if response.status() != StatusCode::CREATED {
            return Err(status_error("create image", response).await);
        }
        response
            .json()
            .await
            .map_err(|e| ClientError::decode("create image", e))
    }

    pub async fn upload(&self, id: Uuid, data: Vec<u8>) -> Result<(), ClientError> {
        let response = self
            .http
            .put(format!("{}/v2/images/{id}/file", self.base_url))
            .header(AUTH_TOKEN_HEADER, &self.token)
            .header("content-type", "application/octet-stream")
            .body(data)
            .send()
            .await
            .map_err(|e| ClientError::transport("upload image data", e))?;
        if response.status() != StatusCode::NO_CONTENT {
            return Err(status_error("upload image data", response).await);
        }
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<Image, ClientError> {
        let response = self
            .http
            .get(format!("{}/v2/images/{id}", self.base_url))
            .header(AUTH_TOKEN_HEADER, &self.token)
            .send()
            .await
            .map_err(|e| ClientError::transport("get image", e))?;
        if response.status() != StatusCode::OK {
            return Err(status_error("get image", response).await);
        }
        response
            .json()
            .await
            .map_err(|e| ClientError::decode("get image", e))
    }

    pub async fn list_by_name(&self, name: &str) -> Result<Vec<Image>, ClientError> {
        let response = self
            .http
            .get(format!("{}/v2/images", self.base_url))
            .header(AUTH_TOKEN_HEADER, &self.token)
            .query(&[("name", name)])
            .send()
            .await
            .map_err(|e| ClientError::transport("list images", e))?;
        if response.status() != StatusCode::OK {
            return Err(status_error("list images", response).await);
        }
        let listing: ImagesResponse = response
            .json()
            .await
            .map_err(|e| ClientError::decode("list images", e))?;
        Ok(listing.images)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ClientError> {
        let response = self
            .http
            .delete(format!("{}/v2/images/{id}", self.base_url))
            .header(AUTH_TOKEN_HEADER, &self.token)
            .send()
            .await
            .map_err(|e| ClientError::transport("delete image", e))?;
        if response.status() != StatusCode::NO_CONTENT {
            return Err(status_error("delete image", response).await);
        }
        debug!("deleted image {id}");
        Ok(())
    }

    /// Download an image source, register it, upload the data, and return
    /// the refreshed (active) image record.
    pub async fn create_from_url(
        &self,
        name: &str,
        image_url: &str,
        disk_format: DiskFormat,
        backend: Option<StoreBackend>,
    ) -> Result<Image, ClientError> {
        let response = self
            .http
            .get(image_url)
            .send()
            .await
            .map_err(|e| ClientError::transport("fetch image source", e))?;
        if response.status() != StatusCode::OK {
            return Err(status_error("fetch image source", response).await);
        }
        let data = response
            .bytes()
            .await
            .map_err(|e| ClientError::transport("fetch image source", e))?;

        let image = self
            .create(&CreateImageRequest {
                name: name.to_string(),
                disk_format,
                container_format: "bare".to_string(),
                backend,
            })
            .await?;
        info!(
            "created image '{name}' ({}) from {image_url}, uploading {} bytes",
            image.id,
            data.len()
        );
        self.upload(image.id, data.to_vec()).await?;
        self.get(image.id).await
    }
}
