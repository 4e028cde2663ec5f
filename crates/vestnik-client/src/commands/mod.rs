//! Per-feature command modules.  Every function is thin glue: resolve
//! the session, call the store / media clients, shape a DTO.

pub mod ai;
pub mod friends;
pub mod messaging;
pub mod music;
pub mod photos;
pub mod posts;
pub mod profile;

#[cfg(test)]
pub(crate) mod testing {
    use async_trait::async_trait;

    use vestnik_shared::UserId;

    use crate::auth::{AuthError, AuthProvider};
    use crate::state::AppState;

    /// Auth double: the user id is the email's local part; the password
    /// "wrong" always fails.
    pub struct StaticAuth;

    #[async_trait]
    impl AuthProvider for StaticAuth {
        async fn sign_in(&self, email: &str, password: &str) -> Result<UserId, AuthError> {
            if password == "wrong" {
                return Err(AuthError::InvalidCredentials);
            }
            Ok(uid_of(email))
        }

        async fn sign_up(&self, email: &str, password: &str) -> Result<UserId, AuthError> {
            if password.len() < 6 {
                return Err(AuthError::WeakPassword);
            }
            Ok(uid_of(email))
        }
    }

    pub fn uid_of(email: &str) -> UserId {
        UserId::from(email.split('@').next().unwrap_or(email))
    }

    pub fn app() -> AppState {
        AppState::in_memory(Box::new(StaticAuth)).unwrap()
    }
}
