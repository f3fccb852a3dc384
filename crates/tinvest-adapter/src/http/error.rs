/*
[INPUT]:  Error sources (HTTP, API envelope, serialization, handshake, WebSocket)
[OUTPUT]: Structured error types with context and retry hints
[POS]:    Error handling layer - unified error types for entire crate
[UPDATE]: When adding new error sources or improving error messages
*/

use reqwest::StatusCode;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Main error type for the Invest adapter
#[derive(Error, Debug)]
pub enum InvestError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error envelope
    #[error("API error (code {code}): {message}")]
    Api { code: String, message: String },

    /// Credential rejected by the server (REST 401/403 or streaming handshake)
    #[error("Credential rejected by server (HTTP {status})")]
    Unauthorized { status: u16 },

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// WebSocket transport error
    #[error("WebSocket error: {0}")]
    WebSocket(Box<tungstenite::Error>),

    /// Parameter outside the range accepted by the API
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Invalid response from server
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded, retry after {retry_after}s")]
    RateLimit { retry_after: u64 },

    /// Connection timeout
    #[error("Connection timeout after {duration}s")]
    Timeout { duration: u64 },

    /// Background streaming task died
    #[error("Streaming worker failed: {0}")]
    Worker(String),
}

impl From<tungstenite::Error> for InvestError {
    fn from(err: tungstenite::Error) -> Self {
        match &err {
            tungstenite::Error::Http(response)
                if matches!(response.status().as_u16(), 401 | 403) =>
            {
                InvestError::Unauthorized {
                    status: response.status().as_u16(),
                }
            }
            _ => InvestError::WebSocket(Box::new(err)),
        }
    }
}

impl InvestError {
    /// Check if the error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            InvestError::Http(_)
                | InvestError::RateLimit { .. }
                | InvestError::Timeout { .. }
                | InvestError::WebSocket(_)
                | InvestError::InvalidResponse(_)
        )
    }

    /// Get retry delay in seconds (if retryable)
    pub fn retry_delay(&self) -> Option<u64> {
        match self {
            InvestError::RateLimit { retry_after } => Some(*retry_after),
            InvestError::Timeout { .. } => Some(1),
            _ => None,
        }
    }

    /// Check if error indicates authentication failure
    pub fn is_auth_error(&self) -> bool {
        matches!(self, InvestError::Unauthorized { .. })
    }

    /// Check if the API reported an unknown instrument or order
    pub fn is_not_found(&self) -> bool {
        matches!(self, InvestError::Api { code, .. } if code == "NOT_FOUND" || code == "404")
    }

    /// Create an API error from status code and message
    pub fn api_error(status: StatusCode, message: impl Into<String>) -> Self {
        InvestError::Api {
            code: status.as_u16().to_string(),
            message: message.into(),
        }
    }
}

/// Result type alias for Invest operations
pub type Result<T> = std::result::Result<T, InvestError>;
