//! Chat materialization and the message writer.
//!
//! A conversation is ONE canonical record at `chats/{chat_id}` holding
//! the participant list and the whole message log.  Participants
//! additionally carry a lightweight entry under their own
//! `chat_index/{uid}` so the chat list renders without touching every
//! canonical record.  Index entries are derived data: the canonical
//! record is authoritative, and [`Store::ensure_direct_chats`] recreates
//! any entry that is missing.
//!
//! Direct chats are addressed by an id derived from the sorted user
//! pair, so both sides converge on the same record with no coordination
//! and concurrent initialization cannot produce a duplicate.

use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use vestnik_shared::constants::{DEFAULT_AVATAR, MAX_MESSAGE_LEN};
use vestnik_shared::{ChatId, Session, UserId};

use crate::backend::{cas_loop, CasOutcome, Etag, Mutation};
use crate::error::{Result, StoreError};
use crate::models::{Chat, ChatRef, UserProfile};
use crate::paths;
use crate::store::Store;
use crate::value::server_timestamp;

/// What a materializer run actually wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterializeReport {
    pub chats_created: u32,
    pub index_entries_created: u32,
}

/// Longest chat-list preview derived from a message text.
const PREVIEW_LEN: usize = 80;

impl Store {
    // ------------------------------------------------------------------
    // Materializer
    // ------------------------------------------------------------------

    /// Guarantee that a chat exists between the caller and each of their
    /// friends, and that both sides' index entries are present.
    ///
    /// Idempotent: a run over fully materialized state writes nothing.
    /// It also heals one-sided state: if only one participant's index
    /// entry exists (a crashed earlier run, or a friend added on another
    /// device), the missing entry is recreated from the canonical
    /// record's side.
    pub async fn ensure_direct_chats(&self, session: &Session) -> Result<MaterializeReport> {
        let me = self.get_user(session.user()).await?;
        let mut report = MaterializeReport::default();

        for friend_id in &me.friends {
            if friend_id == session.user() {
                continue;
            }
            let friend = match self.get_user(friend_id).await {
                Ok(f) => f,
                Err(StoreError::NotFound) => {
                    warn!(friend = %friend_id, "skipping dangling friend id");
                    continue;
                }
                Err(e) => return Err(e),
            };

            let chat_id = ChatId::direct_between(session.user(), friend_id);
            if self.create_direct_chat(&chat_id, session.user(), friend_id).await? {
                report.chats_created += 1;
            }

            // Each side's entry is titled with the *other* side's name.
            if self
                .ensure_index_entry(session.user(), &chat_id, &friend)
                .await?
            {
                report.index_entries_created += 1;
            }
            if self.ensure_index_entry(friend_id, &chat_id, &me).await? {
                report.index_entries_created += 1;
            }
        }

        if report != MaterializeReport::default() {
            info!(
                user = %session.user(),
                chats = report.chats_created,
                entries = report.index_entries_created,
                "materialized direct chats"
            );
        }
        Ok(report)
    }

    /// Create the canonical record for a direct chat if it is missing.
    /// Returns whether this call created it.
    async fn create_direct_chat(&self, chat_id: &ChatId, a: &UserId, b: &UserId) -> Result<bool> {
        let path = paths::chat_doc(chat_id);
        if self.backend().get(&path).await?.is_some() {
            return Ok(false);
        }

        let mut users = [a.clone(), b.clone()];
        users.sort();
        let doc = json!({
            "id": chat_id,
            "kind": "direct",
            "users": users,
            "messages": [],
            "created_at": server_timestamp(),
        });

        match self.backend().put_if(&path, &Etag::absent(), doc).await? {
            CasOutcome::Committed => Ok(true),
            // The other participant's session won the creation race;
            // the record they wrote is the same canonical one.
            CasOutcome::Conflict => Ok(false),
        }
    }

    /// Write `owner`'s index entry for `chat_id` if missing, titled and
    /// previewed from `other`'s profile.
    async fn ensure_index_entry(
        &self,
        owner: &UserId,
        chat_id: &ChatId,
        other: &UserProfile,
    ) -> Result<bool> {
        let path = paths::chat_index_entry(owner, chat_id);
        if self.backend().get(&path).await?.is_some() {
            return Ok(false);
        }

        let preview = if other.avatar_url.is_empty() {
            DEFAULT_AVATAR
        } else {
            other.avatar_url.as_str()
        };
        let entry = json!({
            "chat_id": chat_id,
            "title": other.full_name,
            "preview": preview,
            "updated_at": server_timestamp(),
        });
        self.backend().put(&path, entry).await?;
        debug!(owner = %owner, chat = %chat_id, "index entry created");
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Group chats
    // ------------------------------------------------------------------

    /// Create a group chat.  One canonical record is written, plus an
    /// index entry for every member (creator included).
    pub async fn create_group_chat(
        &self,
        session: &Session,
        title: &str,
        avatar_url: Option<&str>,
        members: &[UserId],
    ) -> Result<ChatId> {
        let title = title.trim();
        if title.is_empty() {
            return Err(StoreError::Validation("group chat title is empty".into()));
        }

        let mut users = vec![session.user().clone()];
        for member in members {
            if !users.contains(member) {
                users.push(member.clone());
            }
        }
        if users.len() < 2 {
            return Err(StoreError::Validation(
                "a group chat needs at least one member besides the creator".into(),
            ));
        }
        for member in &users {
            if member != session.user() {
                self.assert_user(member).await.map_err(|e| match e {
                    StoreError::NotFound => {
                        StoreError::Validation(format!("unknown member '{member}'"))
                    }
                    other => other,
                })?;
            }
        }

        let chat_id = ChatId::group();
        let preview = avatar_url.filter(|s| !s.is_empty()).unwrap_or(DEFAULT_AVATAR);
        let doc = json!({
            "id": chat_id,
            "kind": "group",
            "title": title,
            "avatar_url": preview,
            "users": users,
            "messages": [],
            "created_at": server_timestamp(),
        });

        let path = paths::chat_doc(&chat_id);
        match self.backend().put_if(&path, &Etag::absent(), doc).await? {
            CasOutcome::Committed => {}
            CasOutcome::Conflict => {
                return Err(StoreError::Conflict { path, attempts: 1 });
            }
        }

        for member in &users {
            let entry = json!({
                "chat_id": chat_id,
                "title": title,
                "preview": preview,
                "updated_at": server_timestamp(),
            });
            self.backend()
                .put(&paths::chat_index_entry(member, &chat_id), entry)
                .await?;
        }

        info!(chat = %chat_id, members = users.len(), "group chat created");
        Ok(chat_id)
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// The caller's chat list, most recently active first.
    pub async fn list_chats(&self, session: &Session) -> Result<Vec<ChatRef>> {
        let snapshot = self
            .backend()
            .get(&paths::chat_index_of(session.user()))
            .await?;
        let mut refs = Vec::new();
        if let Some(map) = snapshot.and_then(|s| match s.value {
            Value::Object(map) => Some(map),
            _ => None,
        }) {
            for (id, entry) in map {
                match serde_json::from_value::<ChatRef>(entry) {
                    Ok(r) => refs.push(r),
                    Err(e) => warn!(chat = %id, error = %e, "skipping malformed index entry"),
                }
            }
        }
        refs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(refs)
    }

    /// The canonical chat record, if the caller participates in it.
    /// Non-participants get `NotFound`; the record's existence is not
    /// revealed outside its ACL.
    pub async fn get_chat(&self, session: &Session, chat_id: &ChatId) -> Result<Chat> {
        let chat: Chat = self.require_doc(&paths::chat_doc(chat_id)).await?;
        if !chat.users.contains(session.user()) {
            return Err(StoreError::NotFound);
        }
        Ok(chat)
    }

    // ------------------------------------------------------------------
    // Message writer
    // ------------------------------------------------------------------

    /// Append a message to the chat's single shared log.
    ///
    /// The append is one conditional write on the canonical record:
    /// concurrent senders are serialized by the store, every participant
    /// observes the same log in the same order, and a failed write leaves
    /// no partial state anywhere.  Participants' index previews are
    /// refreshed afterwards on a best-effort basis; they are derived
    /// data and the next materializer pass heals any miss.
    pub async fn send_message(
        &self,
        session: &Session,
        chat_id: &ChatId,
        text: &str,
    ) -> Result<Uuid> {
        let text = text.trim();
        if text.is_empty() {
            return Err(StoreError::Validation("message text is empty".into()));
        }
        if text.len() > MAX_MESSAGE_LEN {
            return Err(StoreError::Validation(format!(
                "message is longer than {MAX_MESSAGE_LEN} bytes"
            )));
        }

        let message_id = Uuid::new_v4();
        let path = paths::chat_doc(chat_id);
        let mut participants: Vec<UserId> = Vec::new();

        cas_loop(self.backend(), &path, |current| {
            let doc = current.ok_or(StoreError::NotFound)?;

            participants = serde_json::from_value(doc["users"].clone())
                .map_err(|e| StoreError::malformed(&path, e))?;
            if !participants.contains(session.user()) {
                return Err(StoreError::Validation(
                    "sender is not a participant of this chat".into(),
                ));
            }

            let message = json!({
                "id": message_id,
                "text": text,
                "date": server_timestamp(),
                "sender": session.user(),
            });

            let mut next = doc.clone();
            match next.get_mut("messages") {
                Some(Value::Array(log)) => log.push(message),
                _ => {
                    next["messages"] = Value::Array(vec![message]);
                }
            }
            Ok(Mutation::Write(next))
        })
        .await?;

        info!(chat = %chat_id, message = %message_id, sender = %session.user(), "message sent");
        self.refresh_index_previews(chat_id, &participants, text).await;
        Ok(message_id)
    }

    /// Patch `last_text`/`updated_at` on each participant's index entry.
    /// Failures are logged, never surfaced: the canonical log already
    /// holds the message.
    async fn refresh_index_previews(&self, chat_id: &ChatId, participants: &[UserId], text: &str) {
        let last_text = truncate_preview(text);
        for user in participants {
            let path = paths::chat_index_entry(user, chat_id);
            let exists = match self.backend().get(&path).await {
                Ok(s) => s.is_some(),
                Err(e) => {
                    warn!(user = %user, chat = %chat_id, error = %e, "index preview read failed");
                    continue;
                }
            };
            // A missing entry belongs to the materializer, which writes
            // title and preview as well; patching a partial entry here
            // would leave an undeserializable record.
            if !exists {
                continue;
            }

            let mut fields = Map::new();
            fields.insert("last_text".into(), json!(last_text));
            fields.insert("updated_at".into(), server_timestamp());
            if let Err(e) = self.backend().patch(&path, fields).await {
                warn!(user = %user, chat = %chat_id, error = %e, "index preview update failed");
            }
        }
    }
}

fn truncate_preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_LEN {
        text.to_string()
    } else {
        let cut: String = text.chars().take(PREVIEW_LEN).collect();
        format!("{cut}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::NewUser;

    fn session(id: &str) -> Session {
        Session::new(UserId::from(id))
    }

    async fn store_with_users(names: &[(&str, &str)]) -> Store {
        let store = Store::in_memory();
        for (id, name) in names {
            store
                .create_user_document(
                    &session(id),
                    NewUser {
                        full_name: name.to_string(),
                        email: format!("{id}@example.com"),
                        birth_date: "1990-01-01".to_string(),
                        city: String::new(),
                    },
                )
                .await
                .unwrap();
        }
        store
    }

    /// Two mutual friends, chats materialized from `a`'s side.
    async fn befriended_store() -> (Store, ChatId) {
        let store = store_with_users(&[("a", "Anna"), ("b", "Boris")]).await;
        store
            .add_friend(&session("a"), &UserId::from("b"))
            .await
            .unwrap();
        store
            .add_friend(&session("b"), &UserId::from("a"))
            .await
            .unwrap();
        store.ensure_direct_chats(&session("a")).await.unwrap();
        let chat_id = ChatId::direct_between(&UserId::from("a"), &UserId::from("b"));
        (store, chat_id)
    }

    #[tokio::test]
    async fn materializer_creates_one_chat_and_both_entries() {
        let (store, chat_id) = befriended_store().await;

        let from_a = store.get_chat(&session("a"), &chat_id).await.unwrap();
        let from_b = store.get_chat(&session("b"), &chat_id).await.unwrap();
        assert_eq!(from_a.users, from_b.users);
        assert_eq!(from_a.users, vec![UserId::from("a"), UserId::from("b")]);

        assert_eq!(store.list_chats(&session("a")).await.unwrap().len(), 1);
        let b_refs = store.list_chats(&session("b")).await.unwrap();
        assert_eq!(b_refs.len(), 1);
        assert_eq!(b_refs[0].title, "Anna");
    }

    #[tokio::test]
    async fn materializer_is_idempotent() {
        let (store, _) = befriended_store().await;

        let report = store.ensure_direct_chats(&session("a")).await.unwrap();
        assert_eq!(report, MaterializeReport::default());
        let report = store.ensure_direct_chats(&session("b")).await.unwrap();
        assert_eq!(report, MaterializeReport::default());

        assert_eq!(store.list_chats(&session("a")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn materializer_heals_one_sided_index() {
        let (store, chat_id) = befriended_store().await;

        // Simulate the asymmetric-state failure: one side's entry lost.
        store
            .backend()
            .delete(&paths::chat_index_entry(&UserId::from("b"), &chat_id))
            .await
            .unwrap();
        assert!(store.list_chats(&session("b")).await.unwrap().is_empty());

        let report = store.ensure_direct_chats(&session("a")).await.unwrap();
        assert_eq!(report.chats_created, 0);
        assert_eq!(report.index_entries_created, 1);
        assert_eq!(store.list_chats(&session("b")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn hello_reaches_both_participants_once() {
        let (store, chat_id) = befriended_store().await;

        store
            .send_message(&session("a"), &chat_id, "hello")
            .await
            .unwrap();

        for viewer in ["a", "b"] {
            let chat = store.get_chat(&session(viewer), &chat_id).await.unwrap();
            assert_eq!(chat.messages.len(), 1);
            assert_eq!(chat.messages[0].text, "hello");
            assert_eq!(chat.messages[0].sender, UserId::from("a"));
        }
    }

    #[tokio::test]
    async fn send_updates_index_previews() {
        let (store, chat_id) = befriended_store().await;

        store
            .send_message(&session("a"), &chat_id, "до встречи")
            .await
            .unwrap();

        let refs = store.list_chats(&session("b")).await.unwrap();
        assert_eq!(refs[0].last_text.as_deref(), Some("до встречи"));
    }

    #[tokio::test]
    async fn empty_message_is_rejected() {
        let (store, chat_id) = befriended_store().await;
        let err = store
            .send_message(&session("a"), &chat_id, "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[tokio::test]
    async fn non_participant_cannot_send_or_read() {
        let (store, chat_id) = befriended_store().await;
        store
            .create_user_document(
                &session("c"),
                NewUser {
                    full_name: "Carol".into(),
                    email: "c@example.com".into(),
                    birth_date: String::new(),
                    city: String::new(),
                },
            )
            .await
            .unwrap();

        let err = store
            .send_message(&session("c"), &chat_id, "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        let err = store.get_chat(&session("c"), &chat_id).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn concurrent_sends_all_land_exactly_once() {
        let (store, chat_id) = befriended_store().await;

        let mut handles = Vec::new();
        for (who, text) in [("a", "one"), ("b", "two"), ("a", "three"), ("b", "four")] {
            let store = store.clone();
            let chat_id = chat_id.clone();
            handles.push(tokio::spawn(async move {
                store.send_message(&session(who), &chat_id, text).await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        let chat = store.get_chat(&session("a"), &chat_id).await.unwrap();
        let mut texts: Vec<_> = chat.messages.iter().map(|m| m.text.clone()).collect();
        texts.sort();
        assert_eq!(texts, vec!["four", "one", "three", "two"]);

        // Both viewers read the same single log, so order agrees.
        let other = store.get_chat(&session("b"), &chat_id).await.unwrap();
        assert_eq!(chat.messages, other.messages);
    }

    #[tokio::test]
    async fn group_chat_writes_entry_per_member() {
        let store = store_with_users(&[("a", "Anna"), ("b", "Boris"), ("c", "Carol")]).await;
        let members = [UserId::from("b"), UserId::from("c")];

        let chat_id = store
            .create_group_chat(&session("a"), "выходные", None, &members)
            .await
            .unwrap();

        let chat = store.get_chat(&session("c"), &chat_id).await.unwrap();
        assert_eq!(
            chat.users,
            vec![UserId::from("a"), UserId::from("b"), UserId::from("c")]
        );
        assert_eq!(chat.title.as_deref(), Some("выходные"));

        for viewer in ["a", "b", "c"] {
            let refs = store.list_chats(&session(viewer)).await.unwrap();
            assert_eq!(refs.len(), 1);
            assert_eq!(refs[0].title, "выходные");
        }
    }

    #[tokio::test]
    async fn group_chat_requires_title_and_members() {
        let store = store_with_users(&[("a", "Anna"), ("b", "Boris")]).await;

        let err = store
            .create_group_chat(&session("a"), "  ", None, &[UserId::from("b")])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        let err = store
            .create_group_chat(&session("a"), "чат", None, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        let err = store
            .create_group_chat(&session("a"), "чат", None, &[UserId::from("ghost")])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn preview_truncates_long_text() {
        let long = "я".repeat(200);
        let preview = truncate_preview(&long);
        assert_eq!(preview.chars().count(), PREVIEW_LEN + 1);
        assert!(preview.ends_with('…'));
    }
}
