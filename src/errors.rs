use http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::models::items::ItemLine;

/// Error body returned by the lab API on non-2xx responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Items the server could and could not allocate when it answered with a
/// partial fulfilment (206) or a conflict (409).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialFulfillment {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub available_items: Vec<ItemLine>,
    #[serde(default)]
    pub unavailable_items: Vec<ItemLine>,
}

impl PartialFulfillment {
    pub fn is_empty(&self) -> bool {
        self.available_items.is_empty() && self.unavailable_items.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Authentication error: {message}")]
    Auth { status: StatusCode, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {}", .0.message)]
    Conflict(Box<PartialFulfillment>),

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error ({status}): {message}")]
    Api { status: StatusCode, message: String },

    #[error("Action already in progress: {0}")]
    InFlight(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Serialization(err.to_string())
    }
}

impl From<validator::ValidationErrors> for ClientError {
    fn from(err: validator::ValidationErrors) -> Self {
        ClientError::Validation(err.to_string())
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            ClientError::Network(err.to_string())
        } else if err.is_decode() {
            ClientError::Serialization(err.to_string())
        } else if let Some(status) = err.status() {
            ClientError::from_status(status, err.to_string(), None)
        } else {
            ClientError::Network(err.to_string())
        }
    }
}

impl ClientError {
    /// Maps a non-2xx response onto the error taxonomy. `body` is the raw
    /// response text, used for the partial-fulfilment payload on 206/409.
    pub fn from_status(status: StatusCode, message: String, body: Option<&str>) -> Self {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Self::Auth { status, message },
            StatusCode::NOT_FOUND => Self::NotFound(message),
            StatusCode::PARTIAL_CONTENT | StatusCode::CONFLICT => {
                let mut partial = body
                    .and_then(|raw| serde_json::from_str::<PartialFulfillment>(raw).ok())
                    .unwrap_or_default();
                if partial.message.is_empty() {
                    partial.message = message;
                }
                Self::Conflict(Box::new(partial))
            }
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => Self::Network(message),
            _ => Self::Api { status, message },
        }
    }

    /// HTTP status this error corresponds to, if it came off the wire.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            Self::Auth { status, .. } | Self::Api { status, .. } => Some(*status),
            Self::NotFound(_) => Some(StatusCode::NOT_FOUND),
            Self::Conflict(_) => Some(StatusCode::CONFLICT),
            _ => None,
        }
    }

    /// Only network failures may be retried, and only by explicit user action.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// Auth failures should send the user back through login.
    pub fn requires_reauth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }

    /// Text to show the user. Server messages are passed through untouched.
    pub fn response_message(&self) -> String {
        match self {
            Self::Validation(msg)
            | Self::InvalidDate(msg)
            | Self::NotFound(msg)
            | Self::Network(msg)
            | Self::InFlight(msg)
            | Self::Session(msg)
            | Self::Config(msg) => msg.clone(),
            Self::Auth { message, .. } | Self::Api { message, .. } => message.clone(),
            Self::Conflict(partial) => partial.message.clone(),
            Self::Serialization(_) => "Unexpected response from server".to_string(),
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
