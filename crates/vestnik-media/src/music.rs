//! Music catalog client.
//!
//! Auth is a client-credentials grant against the catalog's token
//! endpoint; the access token is cached in-process and re-exchanged
//! shortly before it expires instead of once per call.  Search results
//! are filtered to items that actually carry a preview URL, because the
//! player can only play previews.

use std::time::Duration;

use chrono::{DateTime, Utc};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use vestnik_shared::TrackId;

use crate::error::{MediaError, Result};

/// Seconds before expiry at which a cached token is considered stale.
const TOKEN_SLACK_SECS: i64 = 30;

#[derive(Debug, Clone)]
pub struct MusicConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Token-exchange endpoint.
    pub token_url: String,
    /// Catalog API root (the `/search`, `/tracks` endpoints live here).
    pub api_url: String,
}

/// A playable catalog track.  Only tracks with a preview URL survive the
/// client-side filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    pub artists: Vec<String>,
    pub preview_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artist {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playlist {
    pub id: String,
    pub name: String,
}

#[derive(Debug)]
pub struct MusicClient {
    http: reqwest::Client,
    config: MusicConfig,
    token: Mutex<Option<CachedToken>>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

// -- wire shapes ------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct TrackItem {
    id: String,
    name: String,
    #[serde(default)]
    preview_url: Option<String>,
    #[serde(default)]
    artists: Vec<ArtistItem>,
}

#[derive(Debug, Deserialize)]
struct ArtistItem {
    #[serde(default)]
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct Paged<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct TrackSearchResponse {
    tracks: Paged<TrackItem>,
}

#[derive(Debug, Deserialize)]
struct ArtistSearchResponse {
    artists: Paged<ArtistItem>,
}

#[derive(Debug, Deserialize)]
struct PlaylistSearchResponse {
    playlists: Paged<PlaylistItem>,
}

#[derive(Debug, Deserialize)]
struct TracksByIdsResponse {
    #[serde(default = "Vec::new")]
    tracks: Vec<Option<TrackItem>>,
}

impl From<TrackItem> for Track {
    fn from(item: TrackItem) -> Self {
        Self {
            id: TrackId(item.id),
            title: item.name,
            artists: item.artists.into_iter().map(|a| a.name).collect(),
            preview_url: item.preview_url.unwrap_or_default(),
        }
    }
}

impl MusicClient {
    pub fn new(config: MusicConfig) -> Result<Self> {
        if config.client_id.is_empty() || config.client_secret.is_empty() {
            return Err(MediaError::Credentials(
                "music catalog client id/secret not configured".into(),
            ));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            config,
            token: Mutex::new(None),
        })
    }

    /// A valid access token, exchanged anew only when the cached one is
    /// missing or about to expire.
    async fn token(&self) -> Result<String> {
        let mut guard = self.token.lock().await;
        if let Some(cached) = guard.as_ref() {
            if cached.expires_at - chrono::Duration::seconds(TOKEN_SLACK_SECS) > Utc::now() {
                return Ok(cached.access_token.clone());
            }
        }

        let basic = BASE64.encode(format!(
            "{}:{}",
            self.config.client_id, self.config.client_secret
        ));
        let response = self
            .http
            .post(&self.config.token_url)
            .header(reqwest::header::AUTHORIZATION, format!("Basic {basic}"))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(MediaError::from_response(response).await);
        }

        let body: TokenResponse = response.json().await?;
        let token = CachedToken {
            access_token: body.access_token.clone(),
            expires_at: Utc::now() + chrono::Duration::seconds(body.expires_in),
        };
        info!(expires_in = body.expires_in, "music token exchanged");
        *guard = Some(token);
        Ok(body.access_token)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let token = self.token().await?;
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(MediaError::from_response(response).await);
        }
        Ok(response.json().await?)
    }

    /// Search tracks.  Results without a preview URL are dropped.
    pub async fn search_tracks(&self, query: &str, limit: u32, offset: u32) -> Result<Vec<Track>> {
        let url = format!("{}/search", self.config.api_url);
        let body: TrackSearchResponse = self
            .get_json(
                &url,
                &[
                    ("q", query.to_string()),
                    ("type", "track".to_string()),
                    ("limit", limit.to_string()),
                    ("offset", offset.to_string()),
                ],
            )
            .await?;

        let tracks = filter_playable(body.tracks.items);
        debug!(query, found = tracks.len(), "track search");
        Ok(tracks)
    }

    pub async fn search_artists(&self, query: &str, limit: u32) -> Result<Vec<Artist>> {
        let url = format!("{}/search", self.config.api_url);
        let body: ArtistSearchResponse = self
            .get_json(
                &url,
                &[
                    ("q", query.to_string()),
                    ("type", "artist".to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;
        Ok(body
            .artists
            .items
            .into_iter()
            .map(|a| Artist { id: a.id, name: a.name })
            .collect())
    }

    pub async fn search_playlists(&self, query: &str, limit: u32) -> Result<Vec<Playlist>> {
        let url = format!("{}/search", self.config.api_url);
        let body: PlaylistSearchResponse = self
            .get_json(
                &url,
                &[
                    ("q", query.to_string()),
                    ("type", "playlist".to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;
        Ok(body
            .playlists
            .items
            .into_iter()
            .map(|p| Playlist { id: p.id, name: p.name })
            .collect())
    }

    /// Resolve saved track ids back to playable tracks.  Unknown ids are
    /// skipped (the catalog returns null entries for them).
    pub async fn tracks_by_ids(&self, ids: &[TrackId]) -> Result<Vec<Track>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let joined = ids
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(",");
        let url = format!("{}/tracks", self.config.api_url);
        let body: TracksByIdsResponse = self.get_json(&url, &[("ids", joined)]).await?;
        Ok(filter_playable(body.tracks.into_iter().flatten().collect()))
    }

    /// Popular tracks: one search per seed artist, flattened.
    pub async fn popular_tracks(&self, seeds: &[String]) -> Result<Vec<Track>> {
        let searches = seeds.iter().map(|seed| self.search_tracks(seed, 20, 0));
        let results = futures::future::try_join_all(searches).await?;
        Ok(results.into_iter().flatten().collect())
    }

    /// Popular tracks cut to a random-length prefix, for the "surprise
    /// playlist" screen.
    pub async fn sampled_tracks(&self, seeds: &[String]) -> Result<Vec<Track>> {
        use rand::Rng;
        let mut tracks = self.popular_tracks(seeds).await?;
        if !tracks.is_empty() {
            let keep = rand::thread_rng().gen_range(1..=tracks.len());
            tracks.truncate(keep);
        }
        Ok(tracks)
    }
}

fn filter_playable(items: Vec<TrackItem>) -> Vec<Track> {
    items
        .into_iter()
        .filter(|t| t.preview_url.as_deref().is_some_and(|u| !u.is_empty()))
        .map(Track::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, preview: Option<&str>) -> TrackItem {
        TrackItem {
            id: id.to_string(),
            name: format!("track {id}"),
            preview_url: preview.map(str::to_string),
            artists: vec![ArtistItem {
                id: "a1".into(),
                name: "Кино".into(),
            }],
        }
    }

    #[test]
    fn filter_drops_tracks_without_preview() {
        let tracks = filter_playable(vec![
            item("t1", Some("https://p/1.mp3")),
            item("t2", None),
            item("t3", Some("")),
        ]);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].id, TrackId("t1".into()));
        assert_eq!(tracks[0].artists, vec!["Кино".to_string()]);
    }

    #[test]
    fn missing_credentials_are_rejected() {
        let err = MusicClient::new(MusicConfig {
            client_id: String::new(),
            client_secret: String::new(),
            token_url: "https://auth.example/token".into(),
            api_url: "https://api.example/v1".into(),
        })
        .unwrap_err();
        assert!(matches!(err, MediaError::Credentials(_)));
    }

    #[test]
    fn search_response_shape_deserializes() {
        let json = r#"{
            "tracks": { "items": [
                { "id": "t1", "name": "Перемен",
                  "preview_url": "https://p/1.mp3",
                  "artists": [ { "id": "a", "name": "Кино" } ] }
            ] }
        }"#;
        let parsed: TrackSearchResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.tracks.items.len(), 1);
        assert_eq!(parsed.tracks.items[0].name, "Перемен");
    }

    #[test]
    fn tracks_by_ids_tolerates_null_entries() {
        let json = r#"{ "tracks": [ null,
            { "id": "t2", "name": "x", "preview_url": "https://p/2.mp3", "artists": [] } ] }"#;
        let parsed: TracksByIdsResponse = serde_json::from_str(json).unwrap();
        let tracks = filter_playable(parsed.tracks.into_iter().flatten().collect());
        assert_eq!(tracks.len(), 1);
    }
}
