use imgcheck::api::ErrorResponse;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum HarnessError {
    Transport {
        operation: String,
        message: String,
    },
    UnexpectedStatus {
        operation: String,
        status: u16,
        message: String,
    },
    Decode {
        operation: String,
        message: String,
    },
    ServiceNotFound {
        name: String,
    },
    Timeout {
        what: String,
    },
    ConfigMismatch {
        path: String,
        expected: String,
        found: String,
    },
}

impl fmt::Display for HarnessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HarnessError::Transport { operation, message } => {
                write!(f, "Transport error during {operation}: {message}")
            }
            HarnessError::UnexpectedStatus {
                operation,
                status,
                message,
            } => {
                write!(f, "Unexpected status {status} from {operation}: {message}")
            }
            HarnessError::Decode { operation, message } => {
                write!(f, "Failed to decode {operation} response: {message}")
            }
            HarnessError::ServiceNotFound { name } => {
                write!(f, "Service '{name}' not found in the deployment")
            }
            HarnessError::Timeout { what } => {
                write!(f, "Timed out waiting for {what}")
            }
            HarnessError::ConfigMismatch {
                path,
                expected,
                found,
            } => {
                write!(
                    f,
                    "Config file '{path}' does not reflect the expected options.\nExpected:\n{expected}\nFound:\n{found}"
                )
            }
        }
    }
}

impl std::error::Error for HarnessError {}

impl HarnessError {
    pub(crate) fn transport(operation: &str, error: reqwest::Error) -> Self {
        HarnessError::Transport {
            operation: operation.to_string(),
            message: error.to_string(),
        }
    }

    pub(crate) fn decode(operation: &str, error: reqwest::Error) -> Self {
        HarnessError::Decode {
            operation: operation.to_string(),
            message: error.to_string(),
        }
    }
}

pub(crate) async fn status_error(operation: &str, response: reqwest::Response) -> HarnessError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|error| error.message)
        .unwrap_or_else(|_| body.trim().to_string());
    HarnessError::UnexpectedStatus {
        operation: operation.to_string(),
        status,
        message,
    }
}
