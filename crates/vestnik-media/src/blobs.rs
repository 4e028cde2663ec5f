//! Binary object store client.
//!
//! Avatars and audio files live in a remote object store addressed by
//! `/`-separated key paths namespaced per user (`users/{uid}/…`).  The
//! store exposes upload, a stable download URL per object, delete, and
//! prefix listing.

use std::time::Duration;

use bytes::Bytes;
use serde::Deserialize;
use tracing::{debug, info};

use vestnik_shared::UserId;

use crate::error::{MediaError, Result};

#[derive(Debug, Clone)]
pub struct BlobConfig {
    /// Object store root URL.
    pub base_url: String,
    pub auth_token: Option<String>,
    /// Upload size ceiling in bytes.
    pub max_size: usize,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            auth_token: None,
            max_size: 10 * 1024 * 1024, // 10 MiB
        }
    }
}

pub struct BlobStoreClient {
    http: reqwest::Client,
    config: BlobConfig,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default = "Vec::new")]
    items: Vec<ListItem>,
}

#[derive(Debug, Deserialize)]
struct ListItem {
    name: String,
}

/// Object key for a user's avatar image.
pub fn avatar_path(user: &UserId) -> String {
    format!("users/{user}/avatar")
}

/// Object key for an image in a user's gallery.
pub fn image_path(user: &UserId, title: &str) -> String {
    format!("users/{user}/images/{title}")
}

/// Reject separators and traversal so a key can never escape its
/// namespace.
fn validate_path(path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(MediaError::Validation("object path is empty".into()));
    }
    if path.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
        return Err(MediaError::Validation(format!(
            "object path '{path}' contains traversal segments"
        )));
    }
    Ok(())
}

impl BlobStoreClient {
    pub fn new(config: BlobConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        let mut config = config;
        while config.base_url.ends_with('/') {
            config.base_url.pop();
        }
        Ok(Self { http, config })
    }

    fn with_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.auth_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Upload `data` under `path` and return its download URL.
    pub async fn upload(&self, path: &str, data: Bytes, content_type: &str) -> Result<String> {
        validate_path(path)?;
        if data.is_empty() {
            return Err(MediaError::Validation("empty upload".into()));
        }
        if data.len() > self.config.max_size {
            return Err(MediaError::TooLarge {
                size: data.len(),
                max: self.config.max_size,
            });
        }

        let url = self.object_url(path);
        let response = self
            .with_auth(self.http.put(&url))
            .header(reqwest::header::CONTENT_TYPE, content_type.to_string())
            .body(data.clone())
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(MediaError::from_response(response).await);
        }

        info!(path, size = data.len(), "blob uploaded");
        Ok(url)
    }

    /// Stable URL an `<img>`/`<audio>` tag can fetch the object from.
    pub fn download_url(&self, path: &str) -> Result<String> {
        validate_path(path)?;
        Ok(self.object_url(path))
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        validate_path(path)?;
        let response = self
            .with_auth(self.http.delete(self.object_url(path)))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(MediaError::from_response(response).await);
        }
        debug!(path, "blob deleted");
        Ok(())
    }

    /// Object keys stored under `prefix`.
    pub async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        validate_path(prefix)?;
        let response = self
            .with_auth(self.http.get(&self.config.base_url))
            .query(&[("prefix", prefix)])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(MediaError::from_response(response).await);
        }

        let body: ListResponse = response.json().await?;
        Ok(body.items.into_iter().map(|i| i.name).collect())
    }

    fn object_url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> BlobStoreClient {
        BlobStoreClient::new(BlobConfig {
            base_url: "https://blobs.example.com/".into(),
            auth_token: None,
            max_size: 16,
        })
        .unwrap()
    }

    #[test]
    fn traversal_paths_are_rejected() {
        assert!(validate_path("users/u1/../u2/avatar").is_err());
        assert!(validate_path("/users/u1").is_err());
        assert!(validate_path("").is_err());
        assert!(validate_path("users/u1/avatar").is_ok());
    }

    #[test]
    fn download_url_joins_base_and_path() {
        let url = client().download_url("users/u1/avatar").unwrap();
        assert_eq!(url, "https://blobs.example.com/users/u1/avatar");
    }

    #[tokio::test]
    async fn empty_and_oversized_uploads_are_rejected() {
        let client = client();
        let err = client
            .upload("users/u1/avatar", Bytes::new(), "image/png")
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Validation(_)));

        let err = client
            .upload(
                "users/u1/avatar",
                Bytes::from(vec![0u8; 32]),
                "image/png",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::TooLarge { .. }));
    }

    #[test]
    fn avatar_path_is_namespaced() {
        assert_eq!(avatar_path(&UserId::from("u1")), "users/u1/avatar");
    }
}
