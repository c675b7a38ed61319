//! Request and response types shared by the deployment's HTTP surfaces.

use crate::config::ConfigDelta;
use crate::release::Release;
use crate::{DiskFormat, Image, ServiceState, StoreBackend};
use serde::{Deserialize, Serialize};

// =============================================================================
// AUTH TYPES
// =============================================================================

/// Header carrying the session token on every authenticated request.
pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRequest {
    pub name: String,
    pub secret: String,
}

/// Endpoints handed out with a token: everything a session client needs to
/// reach the image service, the object-store gateway, and the control plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceCatalog {
    pub image: String,
    pub object_store: String,
    pub account: String,
    pub control: String,
    pub reference_image: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
    pub catalog: ServiceCatalog,
}

// =============================================================================
// IMAGE API TYPES
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateImageRequest {
    pub name: String,
    pub disk_format: DiskFormat,
    pub container_format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<StoreBackend>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagesResponse {
    pub images: Vec<Image>,
}

// =============================================================================
// CONTROL PLANE TYPES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub name: String,
    pub state: ServiceState,
    pub restart_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_restart: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesResponse {
    pub services: Vec<ServiceStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyConfigRequest {
    pub options: ConfigDelta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigOptionsResponse {
    pub options: ConfigDelta,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderedFileQuery {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderedFileResponse {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentStatusResponse {
    pub release: Release,
}

// =============================================================================
// ERROR PAYLOAD
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: &str, message: impl Into<String>) -> Self {
        Self {
            error: error.to_string(),
            message: message.into(),
        }
    }
}
