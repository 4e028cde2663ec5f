//! # vestnik-media
//!
//! Clients for the external consumer APIs the application leans on: the
//! music catalog (token exchange + search), the text/image generation
//! service, and the binary object store holding avatars and audio files.
//! All three are opaque collaborators; this crate owns only the HTTP
//! plumbing, response shapes, and fault classification.

pub mod blobs;
pub mod generate;
pub mod music;

mod error;

pub use blobs::{BlobConfig, BlobStoreClient};
pub use error::{MediaError, Result};
pub use generate::{ChatTurn, GenClient, GenConfig, Role};
pub use music::{Artist, MusicClient, MusicConfig, Playlist, Track};
