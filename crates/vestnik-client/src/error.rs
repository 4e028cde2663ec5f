use thiserror::Error;
use vestnik_shared::{Fault, FaultKind};

use crate::auth::AuthError;

/// Errors surfaced by the command layer.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Store error: {0}")]
    Store(#[from] vestnik_store::StoreError),

    #[error("Media error: {0}")]
    Media(#[from] vestnik_media::MediaError),

    /// A command that needs a session was called while signed out.
    #[error("Not signed in")]
    NotSignedIn,
}

impl Fault for ClientError {
    fn kind(&self) -> FaultKind {
        match self {
            ClientError::Auth(e) => e.kind(),
            ClientError::Store(e) => e.kind(),
            ClientError::Media(e) => e.kind(),
            ClientError::NotSignedIn => FaultKind::Validation,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ClientError>;
