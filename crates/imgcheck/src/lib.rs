use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub mod api;
pub mod config;
pub mod error;
pub mod release;
pub mod telemetry;

pub use config::{ConfigDelta, ConfigSections};
pub use error::ImgcheckError;
pub use release::Release;

// Re-export logging macros for consistent usage across the workspace
pub use log::{debug, error, info, trace, warn};

// =============================================================================
// IMAGE MODEL
// =============================================================================

/// Disk formats the image service understands, in their wire spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiskFormat {
    Ami,
    Ari,
    Aki,
    Vhd,
    Vmdk,
    Raw,
    Qcow2,
    Vdi,
    Iso,
    RootTar,
}

impl DiskFormat {
    pub const ALL: [DiskFormat; 10] = [
        DiskFormat::Ami,
        DiskFormat::Ari,
        DiskFormat::Aki,
        DiskFormat::Vhd,
        DiskFormat::Vmdk,
        DiskFormat::Raw,
        DiskFormat::Qcow2,
        DiskFormat::Vdi,
        DiskFormat::Iso,
        DiskFormat::RootTar,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DiskFormat::Ami => "ami",
            DiskFormat::Ari => "ari",
            DiskFormat::Aki => "aki",
            DiskFormat::Vhd => "vhd",
            DiskFormat::Vmdk => "vmdk",
            DiskFormat::Raw => "raw",
            DiskFormat::Qcow2 => "qcow2",
            DiskFormat::Vdi => "vdi",
            DiskFormat::Iso => "iso",
            DiskFormat::RootTar => "root-tar",
        }
    }

    /// Parse a comma-separated format list as it appears in configuration
    /// values, e.g. `"ami,ari,qcow2"`.
    pub fn parse_list(value: &str) -> Result<Vec<DiskFormat>, ImgcheckError> {
        value
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(DiskFormat::from_str)
            .collect()
    }
}

impl fmt::Display for DiskFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiskFormat {
    type Err = ImgcheckError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        DiskFormat::ALL
            .iter()
            .copied()
            .find(|format| format.as_str() == value)
            .ok_or_else(|| ImgcheckError::UnknownDiskFormat {
                value: value.to_string(),
            })
    }
}

/// Storage backend an image creation can be directed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    File,
    Swift,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::File => "file",
            StoreBackend::Swift => "swift",
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreBackend {
    type Err = ImgcheckError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "file" => Ok(StoreBackend::File),
            "swift" => Ok(StoreBackend::Swift),
            _ => Err(ImgcheckError::UnknownBackend {
                value: value.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageStatus {
    Queued,
    Active,
    Deleted,
}

impl fmt::Display for ImageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImageStatus::Queued => "queued",
            ImageStatus::Active => "active",
            ImageStatus::Deleted => "deleted",
        };
        f.write_str(name)
    }
}

/// An image record as the image API reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub id: Uuid,
    pub name: String,
    pub status: ImageStatus,
    pub disk_format: DiskFormat,
    pub container_format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<StoreBackend>,
    pub created_at: String,
}

impl Image {
    pub fn new(
        name: String,
        disk_format: DiskFormat,
        container_format: String,
        backend: Option<StoreBackend>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            status: ImageStatus::Queued,
            disk_format,
            container_format,
            size: None,
            backend,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

// =============================================================================
// OBJECT-STORE MODEL
// =============================================================================

/// Account-level listing entry of the object-store gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSummary {
    pub name: String,
    pub count: u64,
    pub bytes: u64,
}

/// Container-level listing entry of the object-store gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredObject {
    pub name: String,
    pub bytes: u64,
    pub last_modified: String,
}

// =============================================================================
// SERVICE MODEL
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    Running,
    Stopped,
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServiceState::Running => "running",
            ServiceState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disk_format_round_trips_through_str() {
        for format in DiskFormat::ALL {
            assert_eq!(format.as_str().parse::<DiskFormat>().unwrap(), format);
        }
    }

    #[test]
    fn disk_format_wire_names_match_serde() {
        let json = serde_json::to_string(&DiskFormat::RootTar).unwrap();
        assert_eq!(json, "\"root-tar\"");
        let parsed: DiskFormat = serde_json::from_str("\"qcow2\"").unwrap();
        assert_eq!(parsed, DiskFormat::Qcow2);
    }

    #[test]
    fn parse_list_handles_whitespace_and_rejects_unknown() {
        let formats = DiskFormat::parse_list("qcow2, raw").unwrap();
        assert_eq!(formats, vec![DiskFormat::Qcow2, DiskFormat::Raw]);

        let err = DiskFormat::parse_list("qcow2,floppy").unwrap_err();
        assert_eq!(
            err,
            ImgcheckError::UnknownDiskFormat {
                value: "floppy".to_string()
            }
        );
    }

    #[test]
    fn new_image_starts_queued_without_size() {
        let image = Image::new(
            "machine-image".to_string(),
            DiskFormat::Qcow2,
            "bare".to_string(),
            Some(StoreBackend::Swift),
        );
        assert_eq!(image.status, ImageStatus::Queued);
        assert_eq!(image.size, None);
        assert_eq!(image.backend, Some(StoreBackend::Swift));
    }
}
