//! Profile and friend-list operations.

use serde_json::{json, Map, Value};
use tracing::{info, warn};

use vestnik_shared::{Session, UserId};

use crate::backend::{cas_loop, CasOutcome, Etag, Mutation};
use crate::error::{Result, StoreError};
use crate::models::UserProfile;
use crate::paths;
use crate::store::Store;
use crate::value::server_timestamp;

/// Registration payload for a new profile document.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub full_name: String,
    pub email: String,
    pub birth_date: String,
    pub city: String,
}

impl Store {
    // ------------------------------------------------------------------
    // Profile
    // ------------------------------------------------------------------

    /// Create the profile document for a freshly registered user.
    ///
    /// The document is created only if none exists; a second registration
    /// under the same id is rejected instead of clobbering the profile.
    pub async fn create_user_document(&self, session: &Session, new_user: NewUser) -> Result<()> {
        let full_name = new_user.full_name.trim();
        if full_name.is_empty() {
            return Err(StoreError::Validation("full name is empty".into()));
        }
        if !new_user.email.contains('@') {
            return Err(StoreError::Validation(format!(
                "'{}' is not an email address",
                new_user.email
            )));
        }

        let doc = json!({
            "id": session.user(),
            "full_name": full_name,
            "email": new_user.email,
            "avatar_url": "",
            "is_online": true,
            "info": {
                "birth_date": new_user.birth_date,
                "city": new_user.city,
                "status": "",
            },
            "friends": [],
            "photos": { "albums": [], "user_images": [] },
            "tracks": [],
            "registration_date": server_timestamp(),
        });

        let path = paths::user_doc(session.user());
        match self.backend().put_if(&path, &Etag::absent(), doc).await? {
            CasOutcome::Committed => {
                info!(user = %session.user(), "profile created");
                Ok(())
            }
            CasOutcome::Conflict => Err(StoreError::Validation(
                "a profile already exists for this user".into(),
            )),
        }
    }

    /// Fetch a single profile.
    pub async fn get_user(&self, id: &UserId) -> Result<UserProfile> {
        self.require_doc(&paths::user_doc(id)).await
    }

    /// All profiles, for the people-search screen, sorted by name.
    pub async fn get_users(&self) -> Result<Vec<UserProfile>> {
        let snapshot = self.backend().get(paths::USERS).await?;
        let mut users = Vec::new();
        if let Some(map) = snapshot.and_then(|s| match s.value {
            Value::Object(map) => Some(map),
            _ => None,
        }) {
            for (id, doc) in map {
                match serde_json::from_value::<UserProfile>(doc) {
                    Ok(user) => users.push(user),
                    Err(e) => warn!(user = %id, error = %e, "skipping malformed profile"),
                }
            }
        }
        users.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        Ok(users)
    }

    /// Update the profile status line.  Returns `false` when the new
    /// status equals the stored one and nothing was written.
    pub async fn update_status(&self, session: &Session, status: &str) -> Result<bool> {
        let user = self.get_user(session.user()).await?;
        if user.info.status == status {
            return Ok(false);
        }

        let mut fields = Map::new();
        fields.insert("status".into(), json!(status));
        self.backend()
            .patch(&paths::user_field(session.user(), "info"), fields)
            .await?;
        Ok(true)
    }

    /// Point the profile at a new avatar URL.  Returns `false` when the
    /// URL is unchanged.
    pub async fn update_avatar_url(&self, session: &Session, url: &str) -> Result<bool> {
        let user = self.get_user(session.user()).await?;
        if user.avatar_url == url {
            return Ok(false);
        }

        let mut fields = Map::new();
        fields.insert("avatar_url".into(), json!(url));
        self.backend()
            .patch(&paths::user_doc(session.user()), fields)
            .await?;
        Ok(true)
    }

    /// Flip the presence flag.
    pub async fn set_online(&self, session: &Session, is_online: bool) -> Result<()> {
        let mut fields = Map::new();
        fields.insert("is_online".into(), json!(is_online));
        self.backend()
            .patch(&paths::user_doc(session.user()), fields)
            .await?;
        Ok(())
    }

    /// Cheap existence check used before writing into a profile subtree.
    pub(crate) async fn assert_user(&self, user: &UserId) -> Result<()> {
        match self.backend().get(&paths::user_field(user, "id")).await? {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound),
        }
    }

    // ------------------------------------------------------------------
    // Friends
    // ------------------------------------------------------------------

    /// Add `friend` to the caller's friend list.  Set semantics: returns
    /// `false` if the id was already present, and never writes a
    /// duplicate even under concurrent adds.
    pub async fn add_friend(&self, session: &Session, friend: &UserId) -> Result<bool> {
        if friend == session.user() {
            return Err(StoreError::Validation(
                "cannot add yourself as a friend".into(),
            ));
        }
        // Both profiles must exist; a dangling friend id would poison
        // the chat materializer later.
        self.assert_user(session.user()).await?;
        self.assert_user(friend).await?;

        let path = paths::user_field(session.user(), "friends");
        let mut added = false;
        cas_loop(self.backend(), &path, |current| {
            let mut friends = parse_friends(current, &path)?;
            if friends.contains(friend) {
                added = false;
                return Ok(Mutation::Keep);
            }
            friends.push(friend.clone());
            added = true;
            Ok(Mutation::Write(json!(friends)))
        })
        .await?;

        if added {
            info!(user = %session.user(), friend = %friend, "friend added");
        }
        Ok(added)
    }

    /// Remove `friend` from the caller's friend list.  Returns `false`
    /// if the id was not present.
    pub async fn remove_friend(&self, session: &Session, friend: &UserId) -> Result<bool> {
        let path = paths::user_field(session.user(), "friends");
        let mut removed = false;
        cas_loop(self.backend(), &path, |current| {
            let friends = parse_friends(current, &path)?;
            let filtered: Vec<UserId> =
                friends.iter().filter(|f| *f != friend).cloned().collect();
            if filtered.len() == friends.len() {
                removed = false;
                return Ok(Mutation::Keep);
            }
            removed = true;
            Ok(Mutation::Write(json!(filtered)))
        })
        .await?;

        if removed {
            info!(user = %session.user(), friend = %friend, "friend removed");
        }
        Ok(removed)
    }

    /// Profiles of the caller's friends.  Dangling ids (deleted or
    /// never-materialized profiles) are skipped, not errors.
    pub async fn friends_of(&self, user: &UserId) -> Result<Vec<UserProfile>> {
        let profile = self.get_user(user).await?;
        let mut friends = Vec::with_capacity(profile.friends.len());
        for id in &profile.friends {
            match self.get_user(id).await {
                Ok(friend) => friends.push(friend),
                Err(StoreError::NotFound) => {
                    warn!(user = %user, friend = %id, "skipping dangling friend id");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(friends)
    }
}

fn parse_friends(current: Option<&Value>, path: &str) -> Result<Vec<UserId>> {
    match current {
        None => Ok(Vec::new()),
        Some(v) => serde_json::from_value(v.clone()).map_err(|e| StoreError::malformed(path, e)),
    }
}
