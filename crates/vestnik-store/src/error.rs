use thiserror::Error;
use vestnik_shared::{Fault, FaultKind};

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The caller's input was rejected before any remote call.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// The addressed record does not exist.
    #[error("Record not found")]
    NotFound,

    /// A conditional write kept losing to concurrent writers.
    #[error("Conditional write on '{path}' lost after {attempts} attempts")]
    Conflict { path: String, attempts: u32 },

    /// The backend was unreachable or answered with a server-side failure;
    /// the same call may succeed on retry.
    #[error("Transient backend error: {0}")]
    Transient(String),

    /// The backend rejected the request outright.
    #[error("Backend rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// HTTP transport error from the REST backend.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A stored document did not match the expected shape.
    #[error("Malformed document at '{path}': {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub(crate) fn malformed(path: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Malformed {
            path: path.into(),
            source,
        }
    }

    /// Whether a retry of the same call is worthwhile.
    pub fn is_transient(&self) -> bool {
        self.kind() == FaultKind::TransientRemote
    }
}

impl Fault for StoreError {
    fn kind(&self) -> FaultKind {
        match self {
            StoreError::Validation(_) => FaultKind::Validation,
            StoreError::NotFound => FaultKind::NotFound,
            StoreError::Conflict { .. } => FaultKind::Conflict,
            StoreError::Transient(_) => FaultKind::TransientRemote,
            StoreError::Rejected { .. } => FaultKind::PermanentRemote,
            StoreError::Http(e) => {
                if e.is_timeout() || e.is_connect() || e.is_request() {
                    FaultKind::TransientRemote
                } else {
                    FaultKind::PermanentRemote
                }
            }
            StoreError::Malformed { .. } => FaultKind::PermanentRemote,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
