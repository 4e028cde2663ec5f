use thiserror::Error;
use vestnik_shared::{Fault, FaultKind};

/// Errors produced by the external-API clients.
#[derive(Error, Debug)]
pub enum MediaError {
    /// The caller's input was rejected before any remote call.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// API credentials are missing or unusable.
    #[error("Missing API credentials: {0}")]
    Credentials(String),

    /// Payload exceeds the service limit.
    #[error("Payload too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service rejected the request outright.
    #[error("Service rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The service failed in a way a retry may fix.
    #[error("Transient service error: {0}")]
    Transient(String),

    /// The response did not match the documented shape.
    #[error("Unexpected response shape: {0}")]
    Decode(String),
}

impl MediaError {
    /// Map a non-success response onto the fault taxonomy.
    pub(crate) async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status();
        let message = response.text().await.unwrap_or_default();
        if status.is_server_error() {
            MediaError::Transient(format!("{status}: {message}"))
        } else {
            MediaError::Rejected {
                status: status.as_u16(),
                message,
            }
        }
    }
}

impl Fault for MediaError {
    fn kind(&self) -> FaultKind {
        match self {
            MediaError::Validation(_) | MediaError::TooLarge { .. } => FaultKind::Validation,
            MediaError::Credentials(_) => FaultKind::PermanentRemote,
            MediaError::Rejected { .. } | MediaError::Decode(_) => FaultKind::PermanentRemote,
            MediaError::Transient(_) => FaultKind::TransientRemote,
            MediaError::Http(e) => {
                if e.is_timeout() || e.is_connect() || e.is_request() {
                    FaultKind::TransientRemote
                } else {
                    FaultKind::PermanentRemote
                }
            }
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MediaError>;
