use hyper::StatusCode;
use thiserror::Error;

/// Unified error type for the relay
#[derive(Error, Debug)]
pub enum RelayError {
    // Gate errors
    #[error("No gates available")]
    NoGatesAvailable,

    #[error("Gate connection failed: {0}")]
    GateConnectionFailed(String),

    #[error("Failed to read gate response body: {0}")]
    BodyRead(String),

    #[error("All gates exhausted after {rounds} rounds")]
    AllGatesExhausted { rounds: u32 },

    #[error("Invalid gate address: {0}")]
    InvalidGateAddress(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Request errors
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Gate timed out")]
    Timeout,

    // I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // HTTP errors
    #[error("HTTP error: {0}")]
    Http(String),
}

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;

impl RelayError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            RelayError::InvalidRequest(_)
            | RelayError::InvalidGateAddress(_)
            | RelayError::InvalidConfig(_) => StatusCode::BAD_REQUEST,

            // 502 Bad Gateway
            RelayError::GateConnectionFailed(_)
            | RelayError::BodyRead(_)
            | RelayError::AllGatesExhausted { .. } => StatusCode::BAD_GATEWAY,

            // 503 Service Unavailable
            RelayError::NoGatesAvailable => StatusCode::SERVICE_UNAVAILABLE,

            // 504 Gateway Timeout
            RelayError::Timeout => StatusCode::GATEWAY_TIMEOUT,

            // 500 Internal Server Error
            RelayError::Io(_) | RelayError::Http(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Check if this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Check if this is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

// Convert from hyper errors
impl From<hyper::Error> for RelayError {
    fn from(err: hyper::Error) -> Self {
        RelayError::Http(err.to_string())
    }
}

// Convert from URL parse errors
impl From<url::ParseError> for RelayError {
    fn from(err: url::ParseError) -> Self {
        RelayError::InvalidRequest(err.to_string())
    }
}
