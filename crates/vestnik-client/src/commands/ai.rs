//! AI chat and image-generation commands.
//!
//! The conversation lives in the UI; each call receives the full turn
//! history and returns (or streams) the assistant's reply.

use bytes::Bytes;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use vestnik_media::{ChatTurn, GenClient, MediaError, Role};

use crate::error::{ClientError, Result};
use crate::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnDto {
    /// `"user"` or `"assistant"`.
    pub role: String,
    pub content: String,
}

fn to_turns(turns: &[TurnDto]) -> Result<Vec<ChatTurn>> {
    turns
        .iter()
        .map(|t| {
            let role = match t.role.as_str() {
                "user" => Role::User,
                "assistant" => Role::Assistant,
                other => {
                    return Err(ClientError::Media(MediaError::Validation(format!(
                        "unknown role '{other}'"
                    ))))
                }
            };
            Ok(ChatTurn {
                role,
                content: t.content.clone(),
            })
        })
        .collect()
}

fn generator(state: &AppState) -> Result<&GenClient> {
    state.generation.as_ref().ok_or_else(|| {
        ClientError::Media(MediaError::Credentials(
            "generation service is not configured".into(),
        ))
    })
}

/// Stream the assistant's reply chunk by chunk.
pub async fn ask_stream(
    state: &AppState,
    turns: &[TurnDto],
) -> Result<BoxStream<'static, vestnik_media::Result<String>>> {
    state.session().await?;
    let turns = to_turns(turns)?;
    Ok(generator(state)?.chat_stream(&turns).await?)
}

/// The assistant's full reply, for callers that do not stream.
pub async fn ask(state: &AppState, turns: &[TurnDto]) -> Result<String> {
    state.session().await?;
    let turns = to_turns(turns)?;
    Ok(generator(state)?.chat(&turns).await?)
}

/// Render an image for `prompt`; returns the encoded image bytes.
pub async fn imagine(state: &AppState, prompt: &str) -> Result<Bytes> {
    state.session().await?;
    Ok(generator(state)?.generate_image(prompt).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::profile::{register, RegisterForm};
    use crate::commands::testing::app;

    #[tokio::test]
    async fn unknown_role_is_rejected() {
        let turns = [TurnDto {
            role: "narrator".into(),
            content: "жили-были".into(),
        }];
        let err = to_turns(&turns).unwrap_err();
        assert!(matches!(
            err,
            ClientError::Media(MediaError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn ask_requires_session_and_configuration() {
        let state = app();

        // Signed out: the session check fires first.
        let err = ask(&state, &[]).await.unwrap_err();
        assert!(matches!(err, ClientError::NotSignedIn));

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

        // Signed in but no generation credentials configured.
        let err = ask(&state, &[]).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Media(MediaError::Credentials(_))
        ));
    }
}
