//! Chat commands.

use serde::Serialize;

use vestnik_shared::{ChatId, UserId};
use vestnik_store::{Chat, ChatKind, ChatRef, Message};

use crate::error::Result;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRefDto {
    pub id: String,
    pub title: String,
    pub preview: String,
    pub last_text: Option<String>,
    pub updated_at: String,
}

impl From<ChatRef> for ChatRefDto {
    fn from(r: ChatRef) -> Self {
        Self {
            id: r.chat_id.0,
            title: r.title,
            preview: r.preview,
            last_text: r.last_text,
            updated_at: r.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    pub id: String,
    pub text: String,
    pub sender_id: String,
    pub date: String,
}

impl From<Message> for MessageDto {
    fn from(m: Message) -> Self {
        Self {
            id: m.id.to_string(),
            text: m.text,
            sender_id: m.sender.0,
            date: m.date.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatDto {
    pub id: String,
    pub is_group: bool,
    pub title: Option<String>,
    pub users: Vec<String>,
    pub messages: Vec<MessageDto>,
}

impl From<Chat> for ChatDto {
    fn from(c: Chat) -> Self {
        Self {
            id: c.id.0,
            is_group: matches!(c.kind, ChatKind::Group),
            title: c.title,
            users: c.users.into_iter().map(|u| u.0).collect(),
            messages: c.messages.into_iter().map(MessageDto::from).collect(),
        }
    }
}

/// Open the chats screen: materialize direct chats for every friend,
/// then return the chat list.
pub async fn open_chats(state: &AppState) -> Result<Vec<ChatRefDto>> {
    let session = state.session().await?;
    state.store.ensure_direct_chats(&session).await?;
    Ok(state
        .store
        .list_chats(&session)
        .await?
        .into_iter()
        .map(ChatRefDto::from)
        .collect())
}

/// One conversation with its full message log.
pub async fn get_chat(state: &AppState, chat_id: &str) -> Result<ChatDto> {
    let session = state.session().await?;
    Ok(state
        .store
        .get_chat(&session, &ChatId(chat_id.to_string()))
        .await?
        .into())
}

/// Send a message; returns its id.
pub async fn send_message(state: &AppState, chat_id: &str, text: &str) -> Result<String> {
    let session = state.session().await?;
    let id = state
        .store
        .send_message(&session, &ChatId(chat_id.to_string()), text)
        .await?;
    Ok(id.to_string())
}

/// Create a group chat with the given members; returns its id.
pub async fn create_group_chat(
    state: &AppState,
    title: &str,
    avatar_url: Option<&str>,
    member_ids: &[String],
) -> Result<String> {
    let session = state.session().await?;
    let members: Vec<UserId> = member_ids.iter().map(|m| UserId::from(m.as_str())).collect();
    let id = state
        .store
        .create_group_chat(&session, title, avatar_url, &members)
        .await?;
    Ok(id.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::profile::{register, sign_in, sign_out, RegisterForm};
    use crate::commands::testing::app;
    use crate::commands::friends::add_friend;

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
    async fn open_chats_then_exchange_messages() {
        let state = app();
        registered(&state, "boris@example.com", "Boris").await;
        registered(&state, "anna@example.com", "Anna").await;

        sign_in(&state, "anna@example.com", "pw-123456").await.unwrap();
        add_friend(&state, "boris").await.unwrap();

        let chats = open_chats(&state).await.unwrap();
        assert_eq!(chats.len(), 1);
        assert_eq!(chats[0].title, "Boris");

        send_message(&state, &chats[0].id, "привет!").await.unwrap();
        sign_out(&state).await.unwrap();

        // Boris sees the same conversation without materializing first.
        sign_in(&state, "boris@example.com", "pw-123456").await.unwrap();
        let boris_chats = open_chats(&state).await.unwrap();
        assert_eq!(boris_chats.len(), 1);
        assert_eq!(boris_chats[0].title, "Anna");
        assert_eq!(boris_chats[0].last_text.as_deref(), Some("привет!"));

        let chat = get_chat(&state, &boris_chats[0].id).await.unwrap();
        assert_eq!(chat.messages.len(), 1);
        assert_eq!(chat.messages[0].text, "привет!");
        assert_eq!(chat.messages[0].sender_id, "anna");
    }

    #[tokio::test]
    async fn group_chat_round_trip() {
        let state = app();
        registered(&state, "boris@example.com", "Boris").await;
        registered(&state, "carol@example.com", "Carol").await;
        registered(&state, "anna@example.com", "Anna").await;

        sign_in(&state, "anna@example.com", "pw-123456").await.unwrap();
        let id = create_group_chat(
            &state,
            "дача",
            None,
            &["boris".to_string(), "carol".to_string()],
        )
        .await
        .unwrap();

        let chat = get_chat(&state, &id).await.unwrap();
        assert!(chat.is_group);
        assert_eq!(chat.users, vec!["anna", "boris", "carol"]);
    }
}
