use crate::error::{ClientError, status_error};
use imgcheck::api::{ServiceCatalog, TokenRequest, TokenResponse};
use log::debug;
use reqwest::StatusCode;
use std::time::Duration;

pub use imgcheck::api::AUTH_TOKEN_HEADER;

#[derive(Debug, Clone)]
pub struct Credentials {
    pub name: String,
    pub secret: String,
}

impl Credentials {
    pub fn new(name: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            secret: secret.into(),
        }
    }
}

/// An authenticated session: a bearer token plus the service catalog issued
/// with it. Service clients are constructed from a session.
#[derive(Debug, Clone)]
pub struct Session {
    http: reqwest::Client,
    token: String,
    catalog: ServiceCatalog,
}

impl Session {
    pub async fn authenticate(
        control_url: &str,
        credentials: &Credentials,
    ) -> Result<Session, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ClientError::transport("client construction", e))?;

        let request = TokenRequest {
            name: credentials.name.clone(),
            secret: credentials.secret.clone(),
        };
        let response = http
            .post(format!("{control_url}/auth/tokens"))
            .json(&request)
            .send()
            .await
            .map_err(|e| ClientError::transport("authenticate", e))?;

        if response.status() == StatusCode::UNAUTHORIZED {
            let error = status_error("authenticate", response).await;
            return Err(ClientError::AuthFailed {
                message: error.to_string(),
            });
        }
        if response.status() != StatusCode::CREATED {
            return Err(status_error("authenticate", response).await);
        }

        let issued: TokenResponse = response
            .json()
            .await
            .map_err(|e| ClientError::decode("authenticate", e))?;
        debug!(
            "authenticated '{}' against {control_url}",
            credentials.name
        );
        Ok(Session {
            http,
            token: issued.token,
            catalog: issued.catalog,
        })
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn catalog(&self) -> &ServiceCatalog {
        &self.catalog
    }

    /// The well-known reference image source advertised by the deployment.
    pub fn reference_image_url(&self) -> &str {
        &self.catalog.reference_image
    }
}
