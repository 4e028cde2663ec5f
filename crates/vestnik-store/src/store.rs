//! Store handle.
//!
//! [`Store`] owns the document backend and carries every typed data
//! operation as methods spread across the per-concern modules (`users`,
//! `chats`, `posts`, `feed`, `photos`, `tracks`).

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::backend::DocumentBackend;
use crate::error::{Result, StoreError};
use crate::memory::MemoryBackend;

/// Handle to the remote document store.
///
/// Cheap to clone; all clones share one backend connection.
#[derive(Clone)]
pub struct Store {
    backend: Arc<dyn DocumentBackend>,
}

impl Store {
    pub fn new(backend: Arc<dyn DocumentBackend>) -> Self {
        Self { backend }
    }

    /// Store over a fresh in-process backend.  Used by tests and demos.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Direct access to the backend.  Callers should prefer the typed
    /// operations, but fixtures occasionally need raw document access.
    pub fn backend(&self) -> &dyn DocumentBackend {
        self.backend.as_ref()
    }

    /// Fetch and deserialize the document at `path`.
    pub(crate) async fn read_doc<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        match self.backend.get(path).await? {
            None => Ok(None),
            Some(snapshot) => serde_json::from_value(snapshot.value)
                .map(Some)
                .map_err(|e| StoreError::malformed(path, e)),
        }
    }

    /// Like [`read_doc`](Self::read_doc) but missing documents are an
    /// error.
    pub(crate) async fn require_doc<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.read_doc(path).await?.ok_or(StoreError::NotFound)
    }
}
