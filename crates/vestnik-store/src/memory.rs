//! In-process document backend.
//!
//! One JSON tree behind a `tokio::sync::Mutex`.  Version tags are blake3
//! hashes of the canonically serialized subtree, so equal content always
//! carries an equal tag.  Server-value sentinels are resolved locally at
//! write time.
//!
//! This is the backend every test in the workspace runs against; it is
//! also usable as a fixture store for demos.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::backend::{CasOutcome, DocumentBackend, Etag, Snapshot};
use crate::error::{Result, StoreError};
use crate::value::resolve_server_values;

pub struct MemoryBackend {
    root: Mutex<Value>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            root: Mutex::new(Value::Object(Map::new())),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn split(path: &str) -> Result<Vec<&str>> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return Err(StoreError::Validation("empty document path".into()));
    }
    Ok(segments)
}

fn lookup<'a>(root: &'a Value, segments: &[&str]) -> Option<&'a Value> {
    let mut node = root;
    for seg in segments {
        node = node.as_object()?.get(*seg)?;
    }
    Some(node)
}

/// Walk to the parent object of the final segment, creating intermediate
/// objects along the way.
fn lookup_parent_mut<'a>(
    root: &'a mut Value,
    segments: &[&str],
) -> Result<&'a mut Map<String, Value>> {
    let mut node = root;
    for seg in &segments[..segments.len() - 1] {
        let map = node
            .as_object_mut()
            .ok_or_else(|| StoreError::Validation(format!("'{seg}' is not a collection")))?;
        node = map
            .entry(seg.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    node.as_object_mut()
        .ok_or_else(|| StoreError::Validation("path ends inside a scalar".into()))
}

fn etag_of(node: Option<&Value>) -> Etag {
    match node {
        None | Some(Value::Null) => Etag::absent(),
        Some(v) => {
            // serde_json maps are ordered, so serialization is canonical.
            let bytes = serde_json::to_vec(v).unwrap_or_default();
            Etag::tag(hex::encode(blake3::hash(&bytes).as_bytes()))
        }
    }
}

#[async_trait]
impl DocumentBackend for MemoryBackend {
    async fn get(&self, path: &str) -> Result<Option<Snapshot>> {
        let segments = split(path)?;
        let root = self.root.lock().await;
        Ok(lookup(&root, &segments)
            .filter(|v| !v.is_null())
            .map(|v| Snapshot {
                value: v.clone(),
                etag: etag_of(Some(v)),
            }))
    }

    async fn put(&self, path: &str, mut value: Value) -> Result<()> {
        resolve_server_values(&mut value, Utc::now());
        let segments = split(path)?;
        let mut root = self.root.lock().await;
        let parent = lookup_parent_mut(&mut root, &segments)?;
        parent.insert(segments[segments.len() - 1].to_string(), value);
        Ok(())
    }

    async fn put_if(&self, path: &str, expected: &Etag, mut value: Value) -> Result<CasOutcome> {
        resolve_server_values(&mut value, Utc::now());
        let segments = split(path)?;
        let mut root = self.root.lock().await;

        let current = etag_of(lookup(&root, &segments));
        if current != *expected {
            return Ok(CasOutcome::Conflict);
        }

        let parent = lookup_parent_mut(&mut root, &segments)?;
        parent.insert(segments[segments.len() - 1].to_string(), value);
        Ok(CasOutcome::Committed)
    }

    async fn patch(&self, path: &str, fields: Map<String, Value>) -> Result<()> {
        let segments = split(path)?;
        let mut root = self.root.lock().await;
        let parent = lookup_parent_mut(&mut root, &segments)?;
        let node = parent
            .entry(segments[segments.len() - 1].to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        let map = node
            .as_object_mut()
            .ok_or_else(|| StoreError::Validation("patch target is not an object".into()))?;
        for (k, mut v) in fields {
            resolve_server_values(&mut v, Utc::now());
            map.insert(k, v);
        }
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let segments = split(path)?;
        let mut root = self.root.lock().await;
        if let Ok(parent) = lookup_parent_mut(&mut root, &segments) {
            parent.remove(segments[segments.len() - 1]);
        }
        Ok(())
    }

    async fn query_eq(
        &self,
        path: &str,
        field: &str,
        value: &Value,
    ) -> Result<BTreeMap<String, Value>> {
        let segments = split(path)?;
        let root = self.root.lock().await;
        let mut out = BTreeMap::new();
        if let Some(children) = lookup(&root, &segments).and_then(Value::as_object) {
            for (key, child) in children {
                if child.get(field) == Some(value) {
                    out.insert(key.clone(), child.clone());
                }
            }
        }
        Ok(out)
    }

    async fn keys(&self, path: &str) -> Result<Vec<String>> {
        let segments = split(path)?;
        let root = self.root.lock().await;
        Ok(lookup(&root, &segments)
            .and_then(Value::as_object)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn get_missing_is_none() {
        let backend = MemoryBackend::new();
        assert!(backend.get("users/nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_then_get_round_trip() {
        let backend = MemoryBackend::new();
        backend
            .put("users/u1", json!({ "full_name": "Anna" }))
            .await
            .unwrap();

        let snap = backend.get("users/u1").await.unwrap().unwrap();
        assert_eq!(snap.value["full_name"], "Anna");
        assert!(!snap.etag.is_absent());
    }

    #[tokio::test]
    async fn put_if_absent_rejects_existing() {
        let backend = MemoryBackend::new();
        backend.put("d", json!(1)).await.unwrap();

        let outcome = backend
            .put_if("d", &Etag::absent(), json!(2))
            .await
            .unwrap();
        assert_eq!(outcome, CasOutcome::Conflict);
        assert_eq!(backend.get("d").await.unwrap().unwrap().value, json!(1));
    }

    #[tokio::test]
    async fn put_if_detects_stale_etag() {
        let backend = MemoryBackend::new();
        backend.put("d", json!({ "n": 1 })).await.unwrap();
        let stale = backend.get("d").await.unwrap().unwrap().etag;

        backend.put("d", json!({ "n": 2 })).await.unwrap();

        let outcome = backend.put_if("d", &stale, json!({ "n": 3 })).await.unwrap();
        assert_eq!(outcome, CasOutcome::Conflict);
    }

    #[tokio::test]
    async fn patch_merges_top_level_fields() {
        let backend = MemoryBackend::new();
        backend
            .put("users/u1", json!({ "a": 1, "b": 2 }))
            .await
            .unwrap();

        let mut fields = Map::new();
        fields.insert("b".into(), json!(20));
        fields.insert("c".into(), json!(30));
        backend.patch("users/u1", fields).await.unwrap();

        let snap = backend.get("users/u1").await.unwrap().unwrap();
        assert_eq!(snap.value, json!({ "a": 1, "b": 20, "c": 30 }));
    }

    #[tokio::test]
    async fn query_eq_matches_children() {
        let backend = MemoryBackend::new();
        backend
            .put("posts/a", json!({ "likes": 3, "content": "x" }))
            .await
            .unwrap();
        backend
            .put("posts/b", json!({ "likes": 0, "content": "y" }))
            .await
            .unwrap();

        let hits = backend.query_eq("posts", "likes", &json!(3)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits.contains_key("a"));
    }

    #[tokio::test]
    async fn keys_lists_children_shallowly() {
        let backend = MemoryBackend::new();
        backend.put("users/u1", json!({ "x": 1 })).await.unwrap();
        backend.put("users/u2", json!({ "x": 2 })).await.unwrap();

        let mut keys = backend.keys("users").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["u1", "u2"]);
    }

    #[tokio::test]
    async fn server_timestamp_resolves_to_millis() {
        let backend = MemoryBackend::new();
        backend
            .put("d", json!({ "date": crate::value::server_timestamp() }))
            .await
            .unwrap();

        let snap = backend.get("d").await.unwrap().unwrap();
        assert!(snap.value["date"].as_i64().unwrap() > 1_600_000_000_000);
    }

    #[tokio::test]
    async fn delete_removes_subtree() {
        let backend = MemoryBackend::new();
        backend.put("a/b", json!(1)).await.unwrap();
        backend.delete("a/b").await.unwrap();
        assert!(backend.get("a/b").await.unwrap().is_none());
    }
}
