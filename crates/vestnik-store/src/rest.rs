//! REST document backend.
//!
//! Speaks the JSON-over-HTTP dialect of the hosted document database the
//! application is deployed against: every subtree is addressable as
//! `{base}/{path}.json`, conditional writes use entity tags
//! (`X-Firebase-ETag` on reads, `if-match` on writes, 412 on a lost
//! race), equality queries use `orderBy`/`equalTo`, and shallow listing
//! uses `shallow=true`.  Server-value sentinels are resolved remotely.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, StatusCode};
use serde_json::{Map, Value};

use crate::backend::{CasOutcome, DocumentBackend, Etag, Snapshot};
use crate::error::{Result, StoreError};

/// Tag the remote store reports for a location that holds no data.
const NULL_ETAG: &str = "null_etag";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct RestBackend {
    http: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl RestBackend {
    pub fn new(base_url: impl Into<String>, auth_token: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Ok(Self {
            http,
            base_url,
            auth_token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}.json", self.base_url, path.trim_matches('/'))
    }

    fn with_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => req.query(&[("auth", token.as_str())]),
            None => req,
        }
    }

    /// Map a non-success status onto the fault taxonomy.
    async fn fail(response: reqwest::Response) -> StoreError {
        let status = response.status();
        let message = response.text().await.unwrap_or_default();
        if status.is_server_error() {
            StoreError::Transient(format!("{status}: {message}"))
        } else {
            StoreError::Rejected {
                status: status.as_u16(),
                message,
            }
        }
    }
}

#[async_trait]
impl DocumentBackend for RestBackend {
    async fn get(&self, path: &str) -> Result<Option<Snapshot>> {
        let response = self
            .with_auth(self.http.get(self.url(path)))
            .header("X-Firebase-ETag", "true")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::fail(response).await);
        }

        let etag = response
            .headers()
            .get(header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let value: Value = response.json().await?;

        if value.is_null() {
            return Ok(None);
        }
        let etag = match etag {
            Some(tag) if tag != NULL_ETAG => Etag::tag(tag),
            // A populated location always carries a tag; treat a missing
            // header as unversioned content that any CAS must re-read.
            _ => Etag::absent(),
        };
        Ok(Some(Snapshot { value, etag }))
    }

    async fn put(&self, path: &str, value: Value) -> Result<()> {
        let response = self
            .with_auth(self.http.put(self.url(path)))
            .json(&value)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::fail(response).await);
        }
        Ok(())
    }

    async fn put_if(&self, path: &str, expected: &Etag, value: Value) -> Result<CasOutcome> {
        let tag = expected.as_str().unwrap_or(NULL_ETAG);
        let response = self
            .with_auth(self.http.put(self.url(path)))
            .header(header::IF_MATCH, tag)
            .json(&value)
            .send()
            .await?;

        match response.status() {
            StatusCode::PRECONDITION_FAILED => Ok(CasOutcome::Conflict),
            s if s.is_success() => Ok(CasOutcome::Committed),
            _ => Err(Self::fail(response).await),
        }
    }

    async fn patch(&self, path: &str, fields: Map<String, Value>) -> Result<()> {
        let response = self
            .with_auth(self.http.patch(self.url(path)))
            .json(&Value::Object(fields))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::fail(response).await);
        }
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let response = self
            .with_auth(self.http.delete(self.url(path)))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::fail(response).await);
        }
        Ok(())
    }

    async fn query_eq(
        &self,
        path: &str,
        field: &str,
        value: &Value,
    ) -> Result<BTreeMap<String, Value>> {
        // orderBy takes a JSON-quoted field name; equalTo takes a JSON
        // literal.
        let order_by = format!("\"{field}\"");
        let equal_to = serde_json::to_string(value)
            .map_err(|e| StoreError::Validation(format!("unencodable query value: {e}")))?;

        let response = self
            .with_auth(self.http.get(self.url(path)))
            .query(&[("orderBy", order_by.as_str()), ("equalTo", equal_to.as_str())])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::fail(response).await);
        }

        let body: Value = response.json().await?;
        match body {
            Value::Null => Ok(BTreeMap::new()),
            Value::Object(map) => Ok(map.into_iter().collect()),
            other => Err(StoreError::malformed(
                path,
                serde::de::Error::custom(format!("query returned non-object: {other}")),
            )),
        }
    }

    async fn keys(&self, path: &str) -> Result<Vec<String>> {
        let response = self
            .with_auth(self.http.get(self.url(path)))
            .query(&[("shallow", "true")])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::fail(response).await);
        }

        let body: Value = response.json().await?;
        Ok(body
            .as_object()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default())
    }
}
