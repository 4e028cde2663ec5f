//! Registration, sign-in, and profile commands.

use bytes::Bytes;
use serde::Serialize;
use tracing::{info, warn};

use vestnik_media::blobs::avatar_path;
use vestnik_shared::Session;
use vestnik_store::users::NewUser;
use vestnik_store::UserProfile;

use crate::error::Result;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub avatar_url: String,
    pub is_online: bool,
    pub status: String,
    pub city: String,
    pub birth_date: String,
    pub friend_count: usize,
}

impl From<UserProfile> for UserDto {
    fn from(user: UserProfile) -> Self {
        Self {
            id: user.id.0,
            full_name: user.full_name,
            email: user.email,
            avatar_url: user.avatar_url,
            is_online: user.is_online,
            status: user.info.status,
            city: user.info.city,
            birth_date: user.info.birth_date,
            friend_count: user.friends.len(),
        }
    }
}

/// Registration form payload.
#[derive(Debug, Clone)]
pub struct RegisterForm {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub birth_date: String,
    pub city: String,
}

/// Create an account, its profile document, and a session.
pub async fn register(state: &AppState, form: RegisterForm) -> Result<UserDto> {
    state.flow.lock().await.begin()?;

    let result = async {
        let user_id = state.auth.sign_up(&form.email, &form.password).await?;
        let session = Session::new(user_id);
        state
            .store
            .create_user_document(
                &session,
                NewUser {
                    full_name: form.full_name.clone(),
                    email: form.email.clone(),
                    birth_date: form.birth_date.clone(),
                    city: form.city.clone(),
                },
            )
            .await?;
        let profile = state.store.get_user(session.user()).await?;
        Ok((session, profile))
    }
    .await;

    let mut flow = state.flow.lock().await;
    match result {
        Ok((session, profile)) => {
            info!(user = %session.user(), "registered");
            flow.complete(session)?;
            Ok(UserDto::from(profile))
        }
        Err(e) => {
            flow.fail();
            Err(e)
        }
    }
}

/// Exchange credentials for a session and load the profile.
pub async fn sign_in(state: &AppState, email: &str, password: &str) -> Result<UserDto> {
    state.flow.lock().await.begin()?;

    let result = async {
        let user_id = state.auth.sign_in(email, password).await?;
        let session = Session::new(user_id);
        let profile = state.store.get_user(session.user()).await?;
        state.store.set_online(&session, true).await?;
        Ok((session, profile))
    }
    .await;

    let mut flow = state.flow.lock().await;
    match result {
        Ok((session, profile)) => {
            flow.complete(session)?;
            Ok(UserDto::from(profile))
        }
        Err(e) => {
            flow.fail();
            Err(e)
        }
    }
}

/// Drop the session.  The presence flag is cleared best-effort first.
pub async fn sign_out(state: &AppState) -> Result<()> {
    if let Ok(session) = state.session().await {
        if let Err(e) = state.store.set_online(&session, false).await {
            warn!(error = %e, "could not clear presence on sign-out");
        }
    }
    state.flow.lock().await.sign_out();
    Ok(())
}

/// One-shot welcome-toast trigger, true exactly once after sign-in.
pub async fn take_just_signed_in(state: &AppState) -> bool {
    state.flow.lock().await.take_just_signed_in()
}

/// The signed-in user's profile.
pub async fn current_profile(state: &AppState) -> Result<UserDto> {
    let session = state.session().await?;
    Ok(state.store.get_user(session.user()).await?.into())
}

/// Update the status line.  Returns whether anything changed.
pub async fn change_status(state: &AppState, status: &str) -> Result<bool> {
    let session = state.session().await?;
    Ok(state.store.update_status(&session, status).await?)
}

/// Upload a new avatar image and point the profile at it.  Returns the
/// download URL.
pub async fn change_avatar(state: &AppState, image: Bytes, content_type: &str) -> Result<String> {
    let session = state.session().await?;
    let url = state
        .blobs
        .upload(&avatar_path(session.user()), image, content_type)
        .await?;
    state.store.update_avatar_url(&session, &url).await?;
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::app;
    use crate::error::ClientError;
    use crate::auth::AuthError;

    fn form(email: &str, name: &str) -> RegisterForm {
        RegisterForm {
            email: email.to_string(),
            password: "correct-horse".to_string(),
            full_name: name.to_string(),
            birth_date: "1995-05-05".to_string(),
            city: "Казань".to_string(),
        }
    }

    #[tokio::test]
    async fn register_creates_profile_and_session() {
        let state = app();
        let dto = register(&state, form("anna@example.com", "Anna")).await.unwrap();

        assert_eq!(dto.id, "anna");
        assert_eq!(dto.full_name, "Anna");
        assert!(take_just_signed_in(&state).await);
        assert!(!take_just_signed_in(&state).await);

        let me = current_profile(&state).await.unwrap();
        assert_eq!(me.full_name, "Anna");
    }

    #[tokio::test]
    async fn failed_sign_in_returns_to_signed_out() {
        let state = app();
        register(&state, form("anna@example.com", "Anna")).await.unwrap();
        sign_out(&state).await.unwrap();

        let err = sign_in(&state, "anna@example.com", "wrong").await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Auth(AuthError::InvalidCredentials)
        ));

        // The flow recovered; a correct attempt works.
        let dto = sign_in(&state, "anna@example.com", "correct-horse").await.unwrap();
        assert_eq!(dto.id, "anna");
    }

    #[tokio::test]
    async fn sign_in_flips_presence() {
        let state = app();
        register(&state, form("anna@example.com", "Anna")).await.unwrap();
        sign_out(&state).await.unwrap();

        let profile = current_profile(&state).await;
        assert!(matches!(profile, Err(ClientError::NotSignedIn)));

        sign_in(&state, "anna@example.com", "pw-123456").await.unwrap();
        assert!(current_profile(&state).await.unwrap().is_online);
    }

    #[tokio::test]
    async fn status_change_round_trip() {
        let state = app();
        register(&state, form("anna@example.com", "Anna")).await.unwrap();

        assert!(change_status(&state, "в отпуске").await.unwrap());
        assert!(!change_status(&state, "в отпуске").await.unwrap());
        assert_eq!(current_profile(&state).await.unwrap().status, "в отпуске");
    }
}
