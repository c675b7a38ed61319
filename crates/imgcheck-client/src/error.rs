use imgcheck::api::ErrorResponse;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ClientError {
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
    AuthFailed {
        message: String,
    },
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Transport { operation, message } => {
                write!(f, "Transport error during {operation}: {message}")
            }
            ClientError::UnexpectedStatus {
                operation,
                status,
                message,
            } => {
                write!(f, "Unexpected status {status} from {operation}: {message}")
            }
            ClientError::Decode { operation, message } => {
                write!(f, "Failed to decode {operation} response: {message}")
            }
            ClientError::AuthFailed { message } => {
                write!(f, "Authentication failed: {message}")
            }
        }
    }
}

impl std::error::Error for ClientError {}

impl ClientError {
    pub(crate) fn transport(operation: &str, error: reqwest::Error) -> Self {
        ClientError::Transport {
            operation: operation.to_string(),
            message: error.to_string(),
        }
    }

    pub(crate) fn decode(operation: &str, error: reqwest::Error) -> Self {
        ClientError::Decode {
            operation: operation.to_string(),
            message: error.to_string(),
        }
    }
}

/// Turn a non-success response into an `UnexpectedStatus`, preferring the
/// service's structured error message over the raw body.
pub(crate) async fn status_error(operation: &str, response: reqwest::Response) -> ClientError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|error| error.message)
        .unwrap_or_else(|_| body.trim().to_string());
    ClientError::UnexpectedStatus {
        operation: operation.to_string(),
        status,
        message,
    }
}
