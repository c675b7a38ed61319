use crate::error::{ClientError, status_error};
use crate::session::{AUTH_TOKEN_HEADER, Session};
use imgcheck::{ContainerSummary, StoredObject};
use reqwest::StatusCode;

/// Client for the object-store gateway's account and container listings.
#[derive(Debug, Clone)]
pub struct ObjectStoreClient {
    http: reqwest::Client,
    base_url: String,
    account: String,
    token: String,
}

impl ObjectStoreClient {
    pub fn new(session: &Session) -> Self {
        Self {
            http: session.http().clone(),
            base_url: session.catalog().object_store.clone(),
            account: session.catalog().account.clone(),
            token: session.token().to_string(),
        }
    }

    /// List the containers on the session's account.
    pub async fn get_account(&self) -> Result<Vec<ContainerSummary>, ClientError> {
        let response = self
            .http
            .get(format!("{}/{}", self.base_url, self.account))
            .header(AUTH_TOKEN_HEADER, &self.token)
            .send()
            .await
            .map_err(|e| ClientError::transport("get account", e))?;
        if response.status() != StatusCode::OK {
            return Err(status_error("get account", response).await);
        }
        response
            .json()
            .await
            .map_err(|e| ClientError::decode("get account", e))
    }

    /// List the objects in one container.
    pub async fn get_container(&self, name: &str) -> Result<Vec<StoredObject>, ClientError> {
        let response = self
            .http
            .get(format!("{}/{}/{name}", self.base_url, self.account))
            .header(AUTH_TOKEN_HEADER, &self.token)
            .send()
            .await
            .map_err(|e| ClientError::transport("get container", e))?;
        if response.status() != StatusCode::OK {
            return Err(status_error("get container", response).await);
        }
        response
            .json()
            .await
            .map_err(|e| ClientError::decode("get container", e))
    }
}
