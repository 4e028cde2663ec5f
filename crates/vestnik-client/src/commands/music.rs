//! Music catalog and saved-track commands.

use serde::Serialize;

use vestnik_media::{MediaError, MusicClient, Track};
use vestnik_shared::TrackId;
use vestnik_store::tracks::NewTrack;
use vestnik_store::TrackRef;

use crate::error::{ClientError, Result};
use crate::state::AppState;

/// Seed artists for the "popular now" shelf.
const POPULAR_SEEDS: &[&str] = &[
    "ariana grande",
    "eminem",
    "billie eilish",
    "justin bieber",
    "hip hop",
];

/// Seed artists for the surprise playlist.
const PLAYLIST_SEEDS: &[&str] = &["Кино", "Сплин", "Аквариум", "ДДТ", "Земфира"];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackDto {
    pub id: String,
    pub title: String,
    pub artists: Vec<String>,
    pub preview_url: String,
    pub saved: bool,
}

fn track_dto(track: Track, saved_ids: &[TrackId]) -> TrackDto {
    let saved = saved_ids.contains(&track.id);
    TrackDto {
        id: track.id.0,
        title: track.title,
        artists: track.artists,
        preview_url: track.preview_url,
        saved,
    }
}

fn saved_dto(track: TrackRef) -> TrackDto {
    TrackDto {
        id: track.id.0,
        title: track.title,
        artists: track.artists,
        preview_url: track.preview_url,
        saved: true,
    }
}

fn catalog(state: &AppState) -> Result<&MusicClient> {
    state.music.as_ref().ok_or_else(|| {
        ClientError::Media(MediaError::Credentials(
            "music catalog is not configured".into(),
        ))
    })
}

async fn saved_ids(state: &AppState) -> Result<Vec<TrackId>> {
    let session = state.session().await?;
    Ok(state
        .store
        .tracks_of(session.user())
        .await?
        .into_iter()
        .map(|t| t.id)
        .collect())
}

/// Search the catalog, flagging tracks the caller has saved.
pub async fn search(state: &AppState, query: &str, offset: u32) -> Result<Vec<TrackDto>> {
    let saved = saved_ids(state).await?;
    let tracks = catalog(state)?.search_tracks(query, 10, offset).await?;
    Ok(tracks.into_iter().map(|t| track_dto(t, &saved)).collect())
}

/// The "popular now" shelf.
pub async fn popular(state: &AppState) -> Result<Vec<TrackDto>> {
    let saved = saved_ids(state).await?;
    let seeds: Vec<String> = POPULAR_SEEDS.iter().map(|s| s.to_string()).collect();
    let tracks = catalog(state)?.popular_tracks(&seeds).await?;
    Ok(tracks.into_iter().map(|t| track_dto(t, &saved)).collect())
}

/// A random-length playlist sampled from the seed artists.
pub async fn surprise_playlist(state: &AppState) -> Result<Vec<TrackDto>> {
    let saved = saved_ids(state).await?;
    let seeds: Vec<String> = PLAYLIST_SEEDS.iter().map(|s| s.to_string()).collect();
    let tracks = catalog(state)?.sampled_tracks(&seeds).await?;
    Ok(tracks.into_iter().map(|t| track_dto(t, &saved)).collect())
}

/// Save a catalog track to the profile.  Returns `false` when it was
/// already saved.
pub async fn save_track(state: &AppState, track: TrackDto) -> Result<bool> {
    let session = state.session().await?;
    Ok(state
        .store
        .save_track(
            &session,
            NewTrack {
                id: TrackId(track.id),
                title: track.title,
                artists: track.artists,
                preview_url: track.preview_url,
            },
        )
        .await?)
}

/// Remove a saved track.
pub async fn remove_track(state: &AppState, id: &str) -> Result<bool> {
    let session = state.session().await?;
    Ok(state
        .store
        .remove_track(&session, &TrackId(id.to_string()))
        .await?)
}

/// The caller's saved tracks, newest first.
pub async fn saved_tracks(state: &AppState) -> Result<Vec<TrackDto>> {
    let session = state.session().await?;
    Ok(state
        .store
        .tracks_of(session.user())
        .await?
        .into_iter()
        .map(saved_dto)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::profile::{register, RegisterForm};
    use crate::commands::testing::app;

    fn dto(id: &str, title: &str) -> TrackDto {
        TrackDto {
            id: id.to_string(),
            title: title.to_string(),
            artists: vec!["Кино".to_string()],
            preview_url: format!("https://p/{id}.mp3"),
            saved: false,
        }
    }

    #[tokio::test]
    async fn save_and_list_tracks() {
        let state = app();
        register(
            &state,
            RegisterForm {
                email: "anna@example.com".into(),
                password: "correct-horse".into(),
                full_name: "Anna".into(),
                birth_date: String::new(),
                city: String::new(),
            },
        )
        .await
        .unwrap();

        assert!(save_track(&state, dto("t1", "Пачка сигарет")).await.unwrap());
        assert!(!save_track(&state, dto("t1", "Пачка сигарет")).await.unwrap());

        let saved = saved_tracks(&state).await.unwrap();
        assert_eq!(saved.len(), 1);
        assert!(saved[0].saved);

        assert!(remove_track(&state, "t1").await.unwrap());
        assert!(saved_tracks(&state).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_without_catalog_is_a_configuration_fault() {
        let state = app();
        register(
            &state,
            RegisterForm {
                email: "anna@example.com".into(),
                password: "correct-horse".into(),
                full_name: "Anna".into(),
                birth_date: String::new(),
                city: String::new(),
            },
        )
        .await
        .unwrap();

        let err = search(&state, "кино", 0).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Media(MediaError::Credentials(_))
        ));
    }
}
