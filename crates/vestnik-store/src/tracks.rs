//! Saved music tracks on the profile.

use chrono::Utc;
use serde_json::Value;
use tracing::info;

use vestnik_shared::{Session, TrackId, UserId};

use crate::backend::{cas_loop, Mutation};
use crate::error::{Result, StoreError};
use crate::models::TrackRef;
use crate::paths;
use crate::store::Store;

/// Catalog metadata for a track being saved.
#[derive(Debug, Clone)]
pub struct NewTrack {
    pub id: TrackId,
    pub title: String,
    pub artists: Vec<String>,
    pub preview_url: String,
}

fn parse_tracks(current: Option<&Value>, path: &str) -> Result<Vec<TrackRef>> {
    match current {
        None => Ok(Vec::new()),
        Some(v) => serde_json::from_value(v.clone()).map_err(|e| StoreError::malformed(path, e)),
    }
}

impl Store {
    /// Save a catalog track to the caller's profile.  Returns `false`
    /// when the track id is already saved.
    pub async fn save_track(&self, session: &Session, new_track: NewTrack) -> Result<bool> {
        if new_track.title.trim().is_empty() {
            return Err(StoreError::Validation("track title is empty".into()));
        }
        self.assert_user(session.user()).await?;

        let track = TrackRef {
            id: new_track.id,
            title: new_track.title,
            artists: new_track.artists,
            preview_url: new_track.preview_url,
            added_at: Utc::now(),
        };
        let path = paths::user_field(session.user(), "tracks");
        let mut saved = false;
        cas_loop(self.backend(), &path, |current| {
            let mut tracks = parse_tracks(current, &path)?;
            if tracks.iter().any(|t| t.id == track.id) {
                saved = false;
                return Ok(Mutation::Keep);
            }
            tracks.push(track.clone());
            saved = true;
            serde_json::to_value(&tracks)
                .map(Mutation::Write)
                .map_err(|e| StoreError::malformed(&path, e))
        })
        .await?;

        if saved {
            info!(user = %session.user(), track = %track.id, "track saved");
        }
        Ok(saved)
    }

    /// Remove a saved track by catalog id.  Returns `false` when it was
    /// not saved.
    pub async fn remove_track(&self, session: &Session, id: &TrackId) -> Result<bool> {
        let path = paths::user_field(session.user(), "tracks");
        let mut removed = false;
        cas_loop(self.backend(), &path, |current| {
            let tracks = parse_tracks(current, &path)?;
            let filtered: Vec<TrackRef> =
                tracks.iter().filter(|t| &t.id != id).cloned().collect();
            if filtered.len() == tracks.len() {
                removed = false;
                return Ok(Mutation::Keep);
            }
            removed = true;
            serde_json::to_value(&filtered)
                .map(Mutation::Write)
                .map_err(|e| StoreError::malformed(&path, e))
        })
        .await?;
        Ok(removed)
    }

    /// A user's saved tracks, most recently added first.
    pub async fn tracks_of(&self, user: &UserId) -> Result<Vec<TrackRef>> {
        let mut tracks = self.get_user(user).await?.tracks;
        tracks.sort_by(|a, b| b.added_at.cmp(&a.added_at));
        Ok(tracks)
    }
}
