//! Domain model structs as they are stored in the document tree.
//!
//! Field names match the deployed document shapes (`full_name`,
//! `users_liked`, `user_images`, …), so these structs deserialize records
//! written by earlier clients.  All timestamps are epoch milliseconds
//! assigned by the store at write time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use vestnik_shared::{ChatId, PostId, TrackId, UserId};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A user profile document, keyed by the auth-assigned user id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub id: UserId,
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default)]
    pub is_online: bool,
    #[serde(default)]
    pub info: ProfileInfo,
    /// Friend ids.  Operations enforce set semantics; the stored form is
    /// an array for wire compatibility.
    #[serde(default)]
    pub friends: Vec<UserId>,
    #[serde(default)]
    pub photos: Photos,
    #[serde(default)]
    pub tracks: Vec<TrackRef>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub registration_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileInfo {
    #[serde(default)]
    pub birth_date: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub status: String,
}

// ---------------------------------------------------------------------------
// Photos
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Photos {
    #[serde(default)]
    pub albums: Vec<Album>,
    #[serde(default)]
    pub user_images: Vec<ImageRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Album {
    pub title: String,
    #[serde(default)]
    pub preview: String,
    #[serde(default)]
    pub images: Vec<ImageRef>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageRef {
    pub url: String,
    pub title: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub date: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// The canonical record of a conversation.  Exactly one copy exists per
/// chat; `users` is the access-control list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chat {
    pub id: ChatId,
    pub kind: ChatKind,
    /// Group chats carry a stored title; a direct chat is titled per
    /// viewer with the other participant's name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub users: Vec<UserId>,
    /// Append-only message log, total-ordered by committed append order.
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    Direct,
    Group,
}

/// A single chat message, embedded in the canonical log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: Uuid,
    pub text: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub date: DateTime<Utc>,
    pub sender: UserId,
}

/// Per-user chat index entry: derived metadata for the chat list screen.
/// The canonical [`Chat`] record is the source of truth; a missing or
/// stale entry is healed by the materializer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatRef {
    pub chat_id: ChatId,
    pub title: String,
    pub preview: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_text: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Post
// ---------------------------------------------------------------------------

/// A news-feed post, stored under its author's namespace.
///
/// Invariant: `likes == users_liked.len()` after every committed write;
/// both fields change together in one conditional update.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Post {
    pub id: PostId,
    pub content: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub likes: u32,
    #[serde(default)]
    pub users_liked: Vec<UserId>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub date: DateTime<Utc>,
}

/// A comment embedded in a post's append-only comment list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Comment {
    pub user_id: UserId,
    pub user_name: String,
    #[serde(default)]
    pub user_preview: String,
    pub content: String,
}

// ---------------------------------------------------------------------------
// Tracks
// ---------------------------------------------------------------------------

/// Reference to a track in the external music catalog, saved on the
/// profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackRef {
    pub id: TrackId,
    pub title: String,
    #[serde(default)]
    pub artists: Vec<String>,
    #[serde(default)]
    pub preview_url: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub added_at: DateTime<Utc>,
}
