use imgcheck::api::ErrorResponse;
use imgcheck::{DiskFormat, ImageStatus};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum TestbedError {
    UnknownOption {
        name: String,
    },
    UnknownService {
        name: String,
    },
    ImageNotFound {
        id: Uuid,
    },
    ImageNotQueued {
        id: Uuid,
        status: ImageStatus,
    },
    DiskFormatDisabled {
        format: DiskFormat,
    },
    ContainerNotFound {
        name: String,
    },
    ContainerNotEmpty {
        name: String,
    },
    ObjectNotFound {
        container: String,
        name: String,
    },
    MalformedRender {
        file: String,
        message: String,
    },
    Io {
        context: String,
        message: String,
    },
}

impl fmt::Display for TestbedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestbedError::UnknownOption { name } => {
                write!(f, "Unknown configuration option '{name}'")
            }
            TestbedError::UnknownService { name } => write!(f, "Service '{name}' not found"),
            TestbedError::ImageNotFound { id } => write!(f, "Image '{id}' not found"),
            TestbedError::ImageNotQueued { id, status } => {
                write!(f, "Image '{id}' is '{status}', data can only be uploaded once")
            }
            TestbedError::DiskFormatDisabled { format } => {
                write!(f, "Disk format '{format}' is not enabled by the service configuration")
            }
            TestbedError::ContainerNotFound { name } => {
                write!(f, "Container '{name}' not found")
            }
            TestbedError::ContainerNotEmpty { name } => {
                write!(f, "Container '{name}' is not empty")
            }
            TestbedError::ObjectNotFound { container, name } => {
                write!(f, "Object '{name}' not found in container '{container}'")
            }
            TestbedError::MalformedRender { file, message } => {
                write!(f, "Rendered config file '{file}' failed to parse back: {message}")
            }
            TestbedError::Io { context, message } => {
                write!(f, "IO error in {context}: {message}")
            }
        }
    }
}

impl std::error::Error for TestbedError {}

impl TestbedError {
    pub(crate) fn from_io(context: &str, error: std::io::Error) -> Self {
        TestbedError::Io {
            context: context.to_string(),
            message: error.to_string(),
        }
    }
}

impl From<TestbedError> for ErrorResponse {
    fn from(error: TestbedError) -> Self {
        let message = error.to_string();
        let code = match &error {
            TestbedError::UnknownOption { .. } | TestbedError::DiskFormatDisabled { .. } => {
                "invalid_parameter"
            }
            TestbedError::UnknownService { .. }
            | TestbedError::ImageNotFound { .. }
            | TestbedError::ContainerNotFound { .. }
            | TestbedError::ObjectNotFound { .. } => "not_found",
            TestbedError::ImageNotQueued { .. } | TestbedError::ContainerNotEmpty { .. } => {
                "conflict"
            }
            TestbedError::MalformedRender { .. } | TestbedError::Io { .. } => "internal_error",
        };
        ErrorResponse::new(code, message)
    }
}
