//! News-feed and post commands.

use serde::Serialize;
use uuid::Uuid;

use vestnik_shared::{PostId, PostKey, UserId};
use vestnik_store::feed::{FeedPost, FeedQuery};
use vestnik_store::posts::NewPost;
use vestnik_store::{Comment, Post, StoreError};

use crate::error::{ClientError, Result};
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentDto {
    pub user_id: String,
    pub user_name: String,
    pub user_preview: String,
    pub content: String,
}

impl From<Comment> for CommentDto {
    fn from(c: Comment) -> Self {
        Self {
            user_id: c.user_id.0,
            user_name: c.user_name,
            user_preview: c.user_preview,
            content: c.content,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDto {
    pub author_id: String,
    pub author_name: String,
    pub author_avatar: String,
    pub post_id: String,
    pub content: String,
    pub images: Vec<String>,
    pub likes: u32,
    pub liked_by_me: bool,
    pub comments: Vec<CommentDto>,
    pub date: String,
}

fn post_dto(author_id: &UserId, author_name: &str, author_avatar: &str, post: Post, me: &UserId) -> PostDto {
    PostDto {
        author_id: author_id.0.clone(),
        author_name: author_name.to_string(),
        author_avatar: author_avatar.to_string(),
        post_id: post.id.to_string(),
        content: post.content,
        images: post.images,
        likes: post.likes,
        liked_by_me: post.users_liked.contains(me),
        comments: post.comments.into_iter().map(CommentDto::from).collect(),
        date: post.date.to_rfc3339(),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPageDto {
    pub posts: Vec<PostDto>,
    pub next_cursor: Option<String>,
}

fn parse_key(author_id: &str, post_id: &str) -> Result<PostKey> {
    let post = Uuid::parse_str(post_id)
        .map_err(|_| ClientError::Store(StoreError::Validation(format!(
            "'{post_id}' is not a post id"
        ))))?;
    Ok(PostKey::new(UserId::from(author_id), PostId(post)))
}

/// One page of the global news feed.
pub async fn news_feed(
    state: &AppState,
    limit: Option<usize>,
    cursor: Option<String>,
) -> Result<FeedPageDto> {
    let session = state.session().await?;
    let page = state.store.load_feed(FeedQuery { limit, cursor }).await?;

    let posts = page
        .posts
        .into_iter()
        .map(|FeedPost { author, post }| {
            post_dto(&author.id, &author.full_name, &author.avatar_url, post, session.user())
        })
        .collect();
    Ok(FeedPageDto {
        posts,
        next_cursor: page.next_cursor,
    })
}

/// The caller's own posts, newest first.
pub async fn my_posts(state: &AppState) -> Result<Vec<PostDto>> {
    let session = state.session().await?;
    let me = state.store.get_user(session.user()).await?;
    Ok(state
        .store
        .posts_of(session.user())
        .await?
        .into_iter()
        .map(|p| post_dto(&me.id, &me.full_name, &me.avatar_url, p, session.user()))
        .collect())
}

/// Publish a post.  Returns `(author_id, post_id)` for addressing it.
pub async fn create_post(
    state: &AppState,
    content: &str,
    images: Vec<String>,
) -> Result<(String, String)> {
    let session = state.session().await?;
    let key = state
        .store
        .create_post(
            &session,
            NewPost {
                content: content.to_string(),
                images,
            },
        )
        .await?;
    Ok((key.author.0, key.post.to_string()))
}

/// Like a post; returns the resulting like count.
pub async fn like_post(state: &AppState, author_id: &str, post_id: &str) -> Result<u32> {
    let session = state.session().await?;
    Ok(state.store.like(&session, &parse_key(author_id, post_id)?).await?)
}

/// Withdraw a like; returns the resulting like count.
pub async fn unlike_post(state: &AppState, author_id: &str, post_id: &str) -> Result<u32> {
    let session = state.session().await?;
    Ok(state
        .store
        .unlike(&session, &parse_key(author_id, post_id)?)
        .await?)
}

/// Comment on a post.
pub async fn comment_post(
    state: &AppState,
    author_id: &str,
    post_id: &str,
    content: &str,
) -> Result<CommentDto> {
    let session = state.session().await?;
    Ok(state
        .store
        .add_comment(&session, &parse_key(author_id, post_id)?, content)
        .await?
        .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::profile::{register, sign_in, sign_out, RegisterForm};
    use crate::commands::testing::app;

    async fn registered(state: &crate::state::AppState, email: &str, name: &str) {
        register(
            state,
            RegisterForm {
                email: email.to_string(),
                password: "correct-horse".to_string(),
                full_name: name.to_string(),
                birth_date: String::new(),
                city: String::new(),
            },
        )
        .await
        .unwrap();
        sign_out(state).await.unwrap();
    }

    #[tokio::test]
    async fn feed_like_and_comment_flow() {
        let state = app();
        registered(&state, "boris@example.com", "Boris").await;

        // Boris publishes.
        sign_in(&state, "boris@example.com", "pw-123456").await.unwrap();
        let (author, post) = create_post(&state, "всем привет", vec![]).await.unwrap();
        sign_out(&state).await.unwrap();

        // Anna reads the feed, likes, likes again, comments.
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

        let page = news_feed(&state, None, None).await.unwrap();
        assert_eq!(page.posts.len(), 1);
        assert_eq!(page.posts[0].author_name, "Boris");
        assert!(!page.posts[0].liked_by_me);

        assert_eq!(like_post(&state, &author, &post).await.unwrap(), 1);
        assert_eq!(like_post(&state, &author, &post).await.unwrap(), 1);

        let comment = comment_post(&state, &author, &post, "огонь").await.unwrap();
        assert_eq!(comment.user_name, "Anna");

        let page = news_feed(&state, None, None).await.unwrap();
        assert_eq!(page.posts[0].likes, 1);
        assert!(page.posts[0].liked_by_me);
        assert_eq!(page.posts[0].comments.len(), 1);

        assert_eq!(unlike_post(&state, &author, &post).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn malformed_post_id_is_a_validation_error() {
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

        let err = like_post(&state, "boris", "not-a-uuid").await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Store(StoreError::Validation(_))
        ));
    }
}
