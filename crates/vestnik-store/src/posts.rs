//! Post creation, likes, and comments.
//!
//! Posts are addressed by [`PostKey`] (author id plus generated post
//! id), so every operation goes straight to the record without scanning a
//! collection.  The like counter and the membership set behind it change
//! together in one conditional write, so `likes == users_liked.len()`
//! holds after every commit, concurrency included.

use serde_json::{json, Value};
use tracing::{info, warn};

use vestnik_shared::constants::{MAX_POST_IMAGES, MAX_POST_LEN};
use vestnik_shared::{PostId, PostKey, Session, UserId};

use crate::backend::{cas_loop, Mutation};
use crate::error::{Result, StoreError};
use crate::models::{Comment, Post};
use crate::paths;
use crate::store::Store;
use crate::value::server_timestamp;

/// Payload for a new post.
#[derive(Debug, Clone, Default)]
pub struct NewPost {
    pub content: String,
    pub images: Vec<String>,
}

impl Store {
    // ------------------------------------------------------------------
    // Create / read
    // ------------------------------------------------------------------

    /// Publish a post under the caller's namespace and return its key.
    pub async fn create_post(&self, session: &Session, new_post: NewPost) -> Result<PostKey> {
        let content = new_post.content.trim();
        if content.is_empty() {
            return Err(StoreError::Validation("post content is empty".into()));
        }
        if content.len() > MAX_POST_LEN {
            return Err(StoreError::Validation(format!(
                "post is longer than {MAX_POST_LEN} bytes"
            )));
        }
        if new_post.images.len() > MAX_POST_IMAGES {
            return Err(StoreError::Validation(format!(
                "a post can carry at most {MAX_POST_IMAGES} images"
            )));
        }
        self.assert_user(session.user()).await?;

        let key = PostKey::new(session.user().clone(), PostId::new());
        let doc = json!({
            "id": key.post,
            "content": content,
            "images": new_post.images,
            "likes": 0,
            "users_liked": [],
            "comments": [],
            "date": server_timestamp(),
        });
        self.backend().put(&paths::post_doc(&key), doc).await?;

        info!(post = %key, "post created");
        Ok(key)
    }

    /// Fetch a post by its key.
    pub async fn get_post(&self, key: &PostKey) -> Result<Post> {
        self.require_doc(&paths::post_doc(key)).await
    }

    /// All posts by one author, newest first.
    pub async fn posts_of(&self, author: &UserId) -> Result<Vec<Post>> {
        let snapshot = self.backend().get(&paths::posts_of(author)).await?;
        let mut posts = Vec::new();
        if let Some(map) = snapshot.and_then(|s| match s.value {
            Value::Object(map) => Some(map),
            _ => None,
        }) {
            for (id, doc) in map {
                match serde_json::from_value::<Post>(doc) {
                    Ok(post) => posts.push(post),
                    Err(e) => warn!(author = %author, post = %id, error = %e, "skipping malformed post"),
                }
            }
        }
        posts.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(posts)
    }

    // ------------------------------------------------------------------
    // Likes
    // ------------------------------------------------------------------

    /// Record a like by the caller and return the resulting count.
    ///
    /// Membership decides everything: a like from a user already in
    /// `users_liked` changes nothing.  The set and the counter are
    /// written in the same conditional update.
    pub async fn like(&self, session: &Session, key: &PostKey) -> Result<u32> {
        self.mutate_liked(session, key, true).await
    }

    /// Withdraw the caller's like and return the resulting count.  A
    /// non-member unlike changes nothing.
    pub async fn unlike(&self, session: &Session, key: &PostKey) -> Result<u32> {
        self.mutate_liked(session, key, false).await
    }

    async fn mutate_liked(&self, session: &Session, key: &PostKey, member: bool) -> Result<u32> {
        let path = paths::post_doc(key);
        let actor = session.user().clone();
        let mut count = 0u32;

        cas_loop(self.backend(), &path, |current| {
            let doc = current.ok_or(StoreError::NotFound)?;
            let mut liked: Vec<UserId> = serde_json::from_value(doc["users_liked"].clone())
                .unwrap_or_default();

            let present = liked.contains(&actor);
            if present == member {
                count = liked.len() as u32;
                return Ok(Mutation::Keep);
            }
            if member {
                liked.push(actor.clone());
            } else {
                liked.retain(|u| u != &actor);
            }
            count = liked.len() as u32;

            let mut next = doc.clone();
            next["users_liked"] = json!(liked);
            next["likes"] = json!(count);
            Ok(Mutation::Write(next))
        })
        .await?;

        Ok(count)
    }

    // ------------------------------------------------------------------
    // Comments
    // ------------------------------------------------------------------

    /// Append a comment to a post, tagged with the caller's display name
    /// and avatar.
    pub async fn add_comment(
        &self,
        session: &Session,
        key: &PostKey,
        content: &str,
    ) -> Result<Comment> {
        let content = content.trim();
        if content.is_empty() {
            return Err(StoreError::Validation("comment is empty".into()));
        }

        let author = self.get_user(session.user()).await?;
        let comment = Comment {
            user_id: author.id,
            user_name: author.full_name,
            user_preview: author.avatar_url,
            content: content.to_string(),
        };

        let path = paths::post_doc(key);
        cas_loop(self.backend(), &path, |current| {
            let doc = current.ok_or(StoreError::NotFound)?;
            let mut next = doc.clone();
            let entry = serde_json::to_value(&comment)
                .map_err(|e| StoreError::malformed(&path, e))?;
            match next.get_mut("comments") {
                Some(Value::Array(list)) => list.push(entry),
                _ => {
                    next["comments"] = Value::Array(vec![entry]);
                }
            }
            Ok(Mutation::Write(next))
        })
        .await?;

        info!(post = %key, commenter = %comment.user_id, "comment added");
        Ok(comment)
    }

    /// A post's comments in append order.
    pub async fn comments_of(&self, key: &PostKey) -> Result<Vec<Comment>> {
        Ok(self.get_post(key).await?.comments)
    }
}
