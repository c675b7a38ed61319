use crate::error::{HarnessError, status_error};
use imgcheck::api::{
    ApplyConfigRequest, ConfigOptionsResponse, DeploymentStatusResponse, RenderedFileResponse,
    ServiceStatus, ServicesResponse,
};
use imgcheck::{ConfigDelta, Release};
use imgcheck_client::{AUTH_TOKEN_HEADER, Session};
use log::debug;
use reqwest::StatusCode;

/// HTTP client of the deployment's control plane. The verification
/// choreography built on top of these calls lives in `verify`.
#[derive(Debug, Clone)]
pub struct HarnessClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl HarnessClient {
    pub fn new(session: &Session) -> Self {
        Self {
            http: session.http().clone(),
            base_url: session.catalog().control.clone(),
            token: session.token().to_string(),
        }
    }

    pub async fn service_statuses(&self) -> Result<Vec<ServiceStatus>, HarnessError> {
        let response = self
            .http
            .get(format!("{}/services", self.base_url))
            .header(AUTH_TOKEN_HEADER, &self.token)
            .send()
            .await
            .map_err(|e| HarnessError::transport("list services", e))?;
        if response.status() != StatusCode::OK {
            return Err(status_error("list services", response).await);
        }
        let listing: ServicesResponse = response
            .json()
            .await
            .map_err(|e| HarnessError::decode("list services", e))?;
        Ok(listing.services)
    }

    pub async fn service_status(&self, name: &str) -> Result<ServiceStatus, HarnessError> {
        let response = self
            .http
            .get(format!("{}/services/{name}", self.base_url))
            .header(AUTH_TOKEN_HEADER, &self.token)
            .send()
            .await
            .map_err(|e| HarnessError::transport("get service status", e))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(HarnessError::ServiceNotFound {
                name: name.to_string(),
            });
        }
        if response.status() != StatusCode::OK {
            return Err(status_error("get service status", response).await);
        }
        response
            .json()
            .await
            .map_err(|e| HarnessError::decode("get service status", e))
    }

    /// Apply option values. The control plane re-renders the affected config
    /// files and restarts the services watching them before responding.
    pub async fn set_config(&self, delta: &ConfigDelta) -> Result<(), HarnessError> {
        debug!("applying config delta: {delta:?}");
        let response = self
            .http
            .post(format!("{}/config/options", self.base_url))
            .header(AUTH_TOKEN_HEADER, &self.token)
            .json(&ApplyConfigRequest {
                options: delta.clone(),
            })
            .send()
            .await
            .map_err(|e| HarnessError::transport("apply config", e))?;
        if response.status() != StatusCode::OK {
            return Err(status_error("apply config", response).await);
        }
        Ok(())
    }

    pub async fn config_options(&self) -> Result<ConfigDelta, HarnessError> {
        let response = self
            .http
            .get(format!("{}/config/options", self.base_url))
            .header(AUTH_TOKEN_HEADER, &self.token)
            .send()
            .await
            .map_err(|e| HarnessError::transport("get config options", e))?;
        if response.status() != StatusCode::OK {
            return Err(status_error("get config options", response).await);
        }
        let options: ConfigOptionsResponse = response
            .json()
            .await
            .map_err(|e| HarnessError::decode("get config options", e))?;
        Ok(options.options)
    }

    /// Fetch the rendered text of a deployed config file.
    pub async fn rendered_file(&self, path: &str) -> Result<String, HarnessError> {
        let response = self
            .http
            .get(format!("{}/config/files", self.base_url))
            .header(AUTH_TOKEN_HEADER, &self.token)
            .query(&[("path", path)])
            .send()
            .await
            .map_err(|e| HarnessError::transport("get rendered file", e))?;
        if response.status() != StatusCode::OK {
            return Err(status_error("get rendered file", response).await);
        }
        let rendered: RenderedFileResponse = response
            .json()
            .await
            .map_err(|e| HarnessError::decode("get rendered file", e))?;
        Ok(rendered.content)
    }

    pub async fn current_release(&self) -> Result<Release, HarnessError> {
        let response = self
            .http
            .get(format!("{}/status", self.base_url))
            .header(AUTH_TOKEN_HEADER, &self.token)
            .send()
            .await
            .map_err(|e| HarnessError::transport("get deployment status", e))?;
        if response.status() != StatusCode::OK {
            return Err(status_error("get deployment status", response).await);
        }
        let status: DeploymentStatusResponse = response
            .json()
            .await
            .map_err(|e| HarnessError::decode("get deployment status", e))?;
        Ok(status.release)
    }

    pub(crate) async fn service_action(
        &self,
        name: &str,
        action: &str,
    ) -> Result<(), HarnessError> {
        let operation = format!("{action} service");
        let response = self
            .http
            .post(format!("{}/services/{name}/{action}", self.base_url))
            .header(AUTH_TOKEN_HEADER, &self.token)
            .send()
            .await
            .map_err(|e| HarnessError::transport(&operation, e))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(HarnessError::ServiceNotFound {
                name: name.to_string(),
            });
        }
        if response.status() != StatusCode::ACCEPTED {
            return Err(status_error(&operation, response).await);
        }
        Ok(())
    }
}
