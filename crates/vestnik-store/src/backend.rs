//! The document-store collaborator seam.
//!
//! [`DocumentBackend`] is the full operation surface this crate consumes
//! from the remote document database: get/put/patch/delete by key path,
//! equality queries over a collection, shallow key listing, and a
//! conditional-write primitive.  The conditional write is what every
//! read-modify-write operation in the store is built on; nothing in this
//! crate writes a record it has read without proving the record is
//! unchanged.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde_json::{Map, Value};

use vestnik_shared::constants::CAS_ATTEMPTS;

use crate::error::{Result, StoreError};

/// Version tag of a stored subtree.  `Etag::absent()` names the state
/// "no record exists here", so create-if-missing is just a conditional
/// write against the absent tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Etag(Option<String>);

impl Etag {
    pub fn tag(tag: impl Into<String>) -> Self {
        Self(Some(tag.into()))
    }

    pub fn absent() -> Self {
        Self(None)
    }

    pub fn is_absent(&self) -> bool {
        self.0.is_none()
    }

    pub fn as_str(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

/// A subtree read together with its version tag.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub value: Value,
    pub etag: Etag,
}

/// Outcome of a conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    /// The write landed.
    Committed,
    /// The stored version no longer matched `expected`; nothing was
    /// written.
    Conflict,
}

/// Key-path document database operations.
///
/// Paths are `/`-separated segments (`users/<uid>`, `chats/<chat-id>`).
/// A "collection" is simply a path whose children are documents.
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    /// Fetch the subtree at `path`, or `None` if nothing is stored there.
    async fn get(&self, path: &str) -> Result<Option<Snapshot>>;

    /// Replace the subtree at `path`.
    async fn put(&self, path: &str, value: Value) -> Result<()>;

    /// Replace the subtree at `path` only if its current version matches
    /// `expected`.  With `Etag::absent()` this is create-if-missing.
    async fn put_if(&self, path: &str, expected: &Etag, value: Value) -> Result<CasOutcome>;

    /// Shallow-merge `fields` into the object at `path`, creating it if
    /// missing.
    async fn patch(&self, path: &str, fields: Map<String, Value>) -> Result<()>;

    /// Delete the subtree at `path`.  Deleting a missing path is a no-op.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Children of `path` whose top-level `field` equals `value`.
    async fn query_eq(
        &self,
        path: &str,
        field: &str,
        value: &Value,
    ) -> Result<BTreeMap<String, Value>>;

    /// Shallow listing of the child keys under `path`.
    async fn keys(&self, path: &str) -> Result<Vec<String>>;
}

/// What a [`cas_loop`] mutation step decided.
pub enum Mutation {
    /// Commit this value (conditionally on the snapshot the closure saw).
    Write(Value),
    /// The record already has the desired state; write nothing.
    Keep,
}

/// Bounded read-modify-write loop over a single document.
///
/// Each attempt reads the current snapshot, hands it to `mutate`, and
/// commits the produced value conditionally.  Lost races re-read and
/// retry; transient backend faults back off and retry on the same budget.
/// Returns the committed value, or `None` when `mutate` chose
/// [`Mutation::Keep`].
pub async fn cas_loop<F>(
    backend: &dyn DocumentBackend,
    path: &str,
    mut mutate: F,
) -> Result<Option<Value>>
where
    F: FnMut(Option<&Value>) -> Result<Mutation>,
{
    for attempt in 0..CAS_ATTEMPTS {
        let snapshot = match backend.get(path).await {
            Ok(s) => s,
            Err(e) if e.is_transient() && attempt + 1 < CAS_ATTEMPTS => {
                tracing::debug!(path, attempt, error = %e, "transient read fault, retrying");
                backoff(attempt).await;
                continue;
            }
            Err(e) => return Err(e),
        };

        let (current, etag) = match &snapshot {
            Some(s) => (Some(&s.value), s.etag.clone()),
            None => (None, Etag::absent()),
        };

        let next = match mutate(current)? {
            Mutation::Keep => return Ok(None),
            Mutation::Write(v) => v,
        };

        match backend.put_if(path, &etag, next.clone()).await {
            Ok(CasOutcome::Committed) => return Ok(Some(next)),
            Ok(CasOutcome::Conflict) => {
                tracing::debug!(path, attempt, "conditional write lost, retrying");
                backoff(attempt).await;
            }
            Err(e) if e.is_transient() && attempt + 1 < CAS_ATTEMPTS => {
                tracing::debug!(path, attempt, error = %e, "transient write fault, retrying");
                backoff(attempt).await;
            }
            Err(e) => return Err(e),
        }
    }

    Err(StoreError::Conflict {
        path: path.to_string(),
        attempts: CAS_ATTEMPTS,
    })
}

/// Exponential backoff with jitter, capped well under a second so UI
/// handlers stay responsive.
async fn backoff(attempt: u32) {
    let base = 20u64.saturating_mul(1 << attempt.min(5));
    let jitter = rand::thread_rng().gen_range(0..20);
    tokio::time::sleep(Duration::from_millis(base.min(400) + jitter)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;
    use serde_json::json;

    #[tokio::test]
    async fn cas_loop_creates_when_absent() {
        let backend = MemoryBackend::new();
        let written = cas_loop(&backend, "a/b", |current| {
            assert!(current.is_none());
            Ok(Mutation::Write(json!({ "n": 1 })))
        })
        .await
        .unwrap();

        assert_eq!(written, Some(json!({ "n": 1 })));
        let stored = backend.get("a/b").await.unwrap().unwrap();
        assert_eq!(stored.value, json!({ "n": 1 }));
    }

    #[tokio::test]
    async fn cas_loop_keep_writes_nothing() {
        let backend = MemoryBackend::new();
        backend.put("a", json!({ "n": 1 })).await.unwrap();
        let before = backend.get("a").await.unwrap().unwrap().etag;

        let written = cas_loop(&backend, "a", |_| Ok(Mutation::Keep)).await.unwrap();

        assert!(written.is_none());
        assert_eq!(backend.get("a").await.unwrap().unwrap().etag, before);
    }

    #[tokio::test]
    async fn concurrent_increments_do_not_lose_updates() {
        let backend = std::sync::Arc::new(MemoryBackend::new());
        backend.put("counter", json!({ "n": 0 })).await.unwrap();

        // 8 writers against an 8-attempt budget: a writer can lose one
        // race per other committed write, so every task must land.
        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let backend = backend.clone();
                tokio::spawn(async move {
                    cas_loop(backend.as_ref(), "counter", |current| {
                        let n = current
                            .and_then(|v| v["n"].as_i64())
                            .unwrap_or(0);
                        Ok(Mutation::Write(json!({ "n": n + 1 })))
                    })
                    .await
                })
            })
            .collect();

        for t in tasks {
            t.await.unwrap().unwrap();
        }

        let stored = backend.get("counter").await.unwrap().unwrap();
        assert_eq!(stored.value, json!({ "n": 8 }));
    }
}
