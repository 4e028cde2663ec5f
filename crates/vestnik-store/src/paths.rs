//! Key-path layout of the document tree.
//!
//! Collections are flattened to the top level so reading a profile never
//! drags the owner's posts or chat index along:
//!
//! ```text
//! users/{uid}                  profile document
//! posts/{uid}/{post_id}        posts, namespaced per author
//! chats/{chat_id}              canonical chat records (single copy)
//! chat_index/{uid}/{chat_id}   per-user chat membership index
//! ```

use vestnik_shared::{ChatId, PostKey, UserId};

pub const USERS: &str = "users";
pub const CHATS: &str = "chats";
pub const POSTS: &str = "posts";
pub const CHAT_INDEX: &str = "chat_index";

pub fn user_doc(user: &UserId) -> String {
    format!("{USERS}/{user}")
}

pub fn user_field(user: &UserId, field: &str) -> String {
    format!("{USERS}/{user}/{field}")
}

pub fn chat_doc(chat: &ChatId) -> String {
    format!("{CHATS}/{chat}")
}

pub fn chat_index_of(user: &UserId) -> String {
    format!("{CHAT_INDEX}/{user}")
}

pub fn chat_index_entry(user: &UserId, chat: &ChatId) -> String {
    format!("{CHAT_INDEX}/{user}/{chat}")
}

pub fn posts_of(author: &UserId) -> String {
    format!("{POSTS}/{author}")
}

pub fn post_doc(key: &PostKey) -> String {
    format!("{POSTS}/{}/{}", key.author, key.post)
}
