//! Photo and album commands.

use bytes::Bytes;
use serde::Serialize;

use vestnik_media::blobs::image_path;
use vestnik_store::{Album, ImageRef, Photos};

use crate::error::Result;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDto {
    pub url: String,
    pub title: String,
    pub date: String,
}

impl From<ImageRef> for ImageDto {
    fn from(i: ImageRef) -> Self {
        Self {
            url: i.url,
            title: i.title,
            date: i.date.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumDto {
    pub title: String,
    pub preview: String,
    pub images: Vec<ImageDto>,
    pub date: String,
}

impl From<Album> for AlbumDto {
    fn from(a: Album) -> Self {
        Self {
            title: a.title,
            preview: a.preview,
            images: a.images.into_iter().map(ImageDto::from).collect(),
            date: a.date.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotosDto {
    pub albums: Vec<AlbumDto>,
    pub user_images: Vec<ImageDto>,
}

impl From<Photos> for PhotosDto {
    fn from(p: Photos) -> Self {
        Self {
            albums: p.albums.into_iter().map(AlbumDto::from).collect(),
            user_images: p.user_images.into_iter().map(ImageDto::from).collect(),
        }
    }
}

/// The caller's albums and standalone images.
pub async fn photos(state: &AppState) -> Result<PhotosDto> {
    let session = state.session().await?;
    Ok(state.store.photos_of(&session).await?.into())
}

/// Upload image bytes to the object store and attach the resulting URL
/// to the profile gallery.
pub async fn upload_image(
    state: &AppState,
    title: &str,
    data: Bytes,
    content_type: &str,
) -> Result<String> {
    let session = state.session().await?;
    let url = state
        .blobs
        .upload(&image_path(session.user(), title), data, content_type)
        .await?;
    state.store.add_image(&session, title, &url).await?;
    Ok(url)
}

/// Attach an already-hosted image URL to the gallery.
pub async fn add_image(state: &AppState, title: &str, url: &str) -> Result<()> {
    let session = state.session().await?;
    Ok(state.store.add_image(&session, title, url).await?)
}

/// Remove the standalone image at `index`.
pub async fn remove_image(state: &AppState, index: usize) -> Result<ImageDto> {
    let session = state.session().await?;
    Ok(state.store.remove_image(&session, index).await?.into())
}

/// Create an album.
pub async fn add_album(state: &AppState, title: &str, preview_url: &str) -> Result<()> {
    let session = state.session().await?;
    Ok(state.store.add_album(&session, title, preview_url).await?)
}

/// Add an image to the album at `album_index`.
pub async fn add_album_image(
    state: &AppState,
    album_index: usize,
    title: &str,
    url: &str,
) -> Result<()> {
    let session = state.session().await?;
    Ok(state
        .store
        .add_album_image(&session, album_index, title, url)
        .await?)
}

/// Delete the album at `index`.
pub async fn remove_album(state: &AppState, index: usize) -> Result<AlbumDto> {
    let session = state.session().await?;
    Ok(state.store.remove_album(&session, index).await?.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::profile::{register, RegisterForm};
    use crate::commands::testing::app;

    #[tokio::test]
    async fn gallery_round_trip() {
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

        add_image(&state, "закат", "https://img/1.png").await.unwrap();
        add_album(&state, "отпуск", "https://img/p.png").await.unwrap();
        add_album_image(&state, 0, "пляж", "https://img/2.png").await.unwrap();

        let all = photos(&state).await.unwrap();
        assert_eq!(all.user_images.len(), 1);
        assert_eq!(all.albums.len(), 1);
        assert_eq!(all.albums[0].images.len(), 1);

        let removed = remove_album(&state, 0).await.unwrap();
        assert_eq!(removed.title, "отпуск");
        let all = photos(&state).await.unwrap();
        assert!(all.albums.is_empty());
        assert_eq!(all.user_images.len(), 1);
    }
}
