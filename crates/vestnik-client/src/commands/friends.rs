//! Friend-list and people-search commands.

use serde::Serialize;

use vestnik_shared::UserId;
use vestnik_store::UserProfile;

use crate::error::Result;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonDto {
    pub id: String,
    pub full_name: String,
    pub avatar_url: String,
    pub is_online: bool,
    pub city: String,
    pub is_friend: bool,
}

fn person(user: UserProfile, my_friends: &[UserId]) -> PersonDto {
    let is_friend = my_friends.contains(&user.id);
    PersonDto {
        id: user.id.0,
        full_name: user.full_name,
        avatar_url: user.avatar_url,
        is_online: user.is_online,
        city: user.info.city,
        is_friend,
    }
}

/// Everyone except the caller, flagged with friendship state.
pub async fn people(state: &AppState) -> Result<Vec<PersonDto>> {
    let session = state.session().await?;
    let me = state.store.get_user(session.user()).await?;

    Ok(state
        .store
        .get_users()
        .await?
        .into_iter()
        .filter(|u| u.id != me.id)
        .map(|u| person(u, &me.friends))
        .collect())
}

/// The caller's friends.
pub async fn friends(state: &AppState) -> Result<Vec<PersonDto>> {
    let session = state.session().await?;
    let me = state.store.get_user(session.user()).await?;
    Ok(state
        .store
        .friends_of(session.user())
        .await?
        .into_iter()
        .map(|u| person(u, &me.friends))
        .collect())
}

/// Add a friend.  Returns `false` when already friends.
pub async fn add_friend(state: &AppState, id: &str) -> Result<bool> {
    let session = state.session().await?;
    Ok(state
        .store
        .add_friend(&session, &UserId::from(id))
        .await?)
}

/// Remove a friend.  Returns `false` when there was nothing to remove.
pub async fn remove_friend(state: &AppState, id: &str) -> Result<bool> {
    let session = state.session().await?;
    Ok(state
        .store
        .remove_friend(&session, &UserId::from(id))
        .await?)
}
