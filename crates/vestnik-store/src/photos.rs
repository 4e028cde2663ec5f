//! Photo and album operations on the profile's `photos` subtree.
//!
//! Albums and standalone images are value records inside the profile
//! document.  Every mutation re-reads and conditionally rewrites the
//! whole `photos` subtree, so concurrent edits from two devices cannot
//! silently drop each other's changes.  Index-addressed removals are
//! bounds-checked instead of splicing blindly.

use chrono::Utc;
use serde_json::Value;
use tracing::info;

use vestnik_shared::Session;

use crate::backend::{cas_loop, Mutation};
use crate::error::{Result, StoreError};
use crate::models::{Album, ImageRef, Photos};
use crate::paths;
use crate::store::Store;

fn parse_photos(current: Option<&Value>, path: &str) -> Result<Photos> {
    match current {
        None => Ok(Photos::default()),
        Some(v) => serde_json::from_value(v.clone()).map_err(|e| StoreError::malformed(path, e)),
    }
}

fn to_value(photos: &Photos, path: &str) -> Result<Value> {
    serde_json::to_value(photos).map_err(|e| StoreError::malformed(path, e))
}

impl Store {
    /// The caller's photo collections.
    pub async fn photos_of(&self, session: &Session) -> Result<Photos> {
        Ok(self.get_user(session.user()).await?.photos)
    }

    /// Add a standalone image to the profile.
    pub async fn add_image(&self, session: &Session, title: &str, url: &str) -> Result<()> {
        if url.trim().is_empty() {
            return Err(StoreError::Validation("image url is empty".into()));
        }
        self.assert_user(session.user()).await?;

        let image = ImageRef {
            url: url.to_string(),
            title: title.to_string(),
            date: Utc::now(),
        };
        let path = paths::user_field(session.user(), "photos");
        cas_loop(self.backend(), &path, |current| {
            let mut photos = parse_photos(current, &path)?;
            photos.user_images.push(image.clone());
            to_value(&photos, &path).map(Mutation::Write)
        })
        .await?;

        info!(user = %session.user(), "image added");
        Ok(())
    }

    /// Remove the standalone image at `index`, returning it.
    pub async fn remove_image(&self, session: &Session, index: usize) -> Result<ImageRef> {
        let path = paths::user_field(session.user(), "photos");
        let mut removed = None;
        cas_loop(self.backend(), &path, |current| {
            let mut photos = parse_photos(current, &path)?;
            if index >= photos.user_images.len() {
                return Err(StoreError::Validation(format!(
                    "image index {index} out of range"
                )));
            }
            removed = Some(photos.user_images.remove(index));
            to_value(&photos, &path).map(Mutation::Write)
        })
        .await?;

        // The loop only commits after `removed` is set.
        removed.ok_or(StoreError::NotFound)
    }

    /// Create an empty album with a preview image.
    pub async fn add_album(&self, session: &Session, title: &str, preview_url: &str) -> Result<()> {
        let title = title.trim();
        if title.is_empty() {
            return Err(StoreError::Validation("album title is empty".into()));
        }
        self.assert_user(session.user()).await?;

        let album = Album {
            title: title.to_string(),
            preview: preview_url.to_string(),
            images: Vec::new(),
            date: Utc::now(),
        };
        let path = paths::user_field(session.user(), "photos");
        cas_loop(self.backend(), &path, |current| {
            let mut photos = parse_photos(current, &path)?;
            photos.albums.push(album.clone());
            to_value(&photos, &path).map(Mutation::Write)
        })
        .await?;

        info!(user = %session.user(), album = title, "album created");
        Ok(())
    }

    /// Add an image to the album at `album_index`.
    pub async fn add_album_image(
        &self,
        session: &Session,
        album_index: usize,
        title: &str,
        url: &str,
    ) -> Result<()> {
        if url.trim().is_empty() {
            return Err(StoreError::Validation("image url is empty".into()));
        }

        let image = ImageRef {
            url: url.to_string(),
            title: title.to_string(),
            date: Utc::now(),
        };
        let path = paths::user_field(session.user(), "photos");
        cas_loop(self.backend(), &path, |current| {
            let mut photos = parse_photos(current, &path)?;
            let album = photos.albums.get_mut(album_index).ok_or_else(|| {
                StoreError::Validation(format!("album index {album_index} out of range"))
            })?;
            album.images.push(image.clone());
            to_value(&photos, &path).map(Mutation::Write)
        })
        .await?;
        Ok(())
    }

    /// Delete the album at `index`, returning it.  Standalone images are
    /// untouched.
    pub async fn remove_album(&self, session: &Session, index: usize) -> Result<Album> {
        let path = paths::user_field(session.user(), "photos");
        let mut removed = None;
        cas_loop(self.backend(), &path, |current| {
            let mut photos = parse_photos(current, &path)?;
            if index >= photos.albums.len() {
                return Err(StoreError::Validation(format!(
                    "album index {index} out of range"
                )));
            }
            removed = Some(photos.albums.remove(index));
            to_value(&photos, &path).map(Mutation::Write)
        })
        .await?;

        removed.ok_or(StoreError::NotFound)
    }
}
