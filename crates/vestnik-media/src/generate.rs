//! Text and image generation client.
//!
//! Text generation is prompt-in, streamed-text-out: the service answers
//! with server-sent `data:` lines, each carrying one generated token.
//! The stream surfaces here as `futures::Stream<Item = Result<String>>`
//! so the UI can append chunks as they arrive.  Image generation is
//! prompt-in, image-bytes-out.

use std::time::Duration;

use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::error::{MediaError, Result};

#[derive(Debug, Clone)]
pub struct GenConfig {
    /// Inference API root.
    pub base_url: String,
    pub api_token: String,
    pub text_model: String,
    pub image_model: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of an AI conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

pub struct GenClient {
    http: reqwest::Client,
    config: GenConfig,
}

#[derive(Debug, Deserialize)]
struct StreamEvent {
    #[serde(default)]
    token: Option<StreamToken>,
}

#[derive(Debug, Deserialize)]
struct StreamToken {
    text: String,
    #[serde(default)]
    special: bool,
}

impl GenClient {
    pub fn new(config: GenConfig) -> Result<Self> {
        if config.api_token.is_empty() {
            return Err(MediaError::Credentials(
                "generation API token not configured".into(),
            ));
        }
        let http = reqwest::Client::builder()
            // Image generation can take a while on a cold model.
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self { http, config })
    }

    /// Stream the assistant's reply to a conversation.
    pub async fn chat_stream(
        &self,
        turns: &[ChatTurn],
    ) -> Result<BoxStream<'static, Result<String>>> {
        if turns.is_empty() {
            return Err(MediaError::Validation("conversation is empty".into()));
        }

        let url = format!("{}/models/{}", self.config.base_url, self.config.text_model);
        let body = json!({
            "inputs": build_prompt(turns),
            "parameters": {
                "max_new_tokens": 200,
                "typical_p": 0.2,
                "repetition_penalty": 1.0,
                "truncate": 1000,
                "return_full_text": false,
            },
            "stream": true,
        });

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.config.api_token)
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(MediaError::from_response(response).await);
        }

        // Re-chunk the byte stream into SSE lines; one `data:` line is
        // one generated token.
        let stream = response
            .bytes_stream()
            .scan(String::new(), |buffer, chunk| {
                let items: Vec<Result<String>> = match chunk {
                    Ok(bytes) => {
                        buffer.push_str(&String::from_utf8_lossy(&bytes));
                        let mut tokens = Vec::new();
                        while let Some(pos) = buffer.find('\n') {
                            let line: String = buffer.drain(..=pos).collect();
                            if let Some(text) = parse_sse_line(line.trim()) {
                                tokens.push(Ok(text));
                            }
                        }
                        tokens
                    }
                    Err(e) => vec![Err(MediaError::from(e))],
                };
                futures::future::ready(Some(stream::iter(items)))
            })
            .flatten()
            .boxed();

        Ok(stream)
    }

    /// The assistant's full reply, for callers that do not stream.
    pub async fn chat(&self, turns: &[ChatTurn]) -> Result<String> {
        let mut stream = self.chat_stream(turns).await?;
        let mut reply = String::new();
        while let Some(chunk) = stream.next().await {
            reply.push_str(&chunk?);
        }
        Ok(reply)
    }

    /// Render an image for `prompt` and return the raw encoded bytes.
    pub async fn generate_image(&self, prompt: &str) -> Result<Bytes> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(MediaError::Validation("image prompt is empty".into()));
        }

        let url = format!(
            "{}/models/{}",
            self.config.base_url, self.config.image_model
        );
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.config.api_token)
            .json(&json!({ "inputs": prompt }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(MediaError::from_response(response).await);
        }

        let bytes = response.bytes().await?;
        info!(prompt_len = prompt.len(), size = bytes.len(), "image generated");
        Ok(bytes)
    }
}

/// Render a conversation in the open-assistant prompt format the text
/// model was tuned on.
fn build_prompt(turns: &[ChatTurn]) -> String {
    let mut prompt = String::new();
    for turn in turns {
        match turn.role {
            Role::User => {
                prompt.push_str("<|prompter|>");
                prompt.push_str(&turn.content);
                prompt.push_str("<|endoftext|>");
            }
            Role::Assistant => {
                prompt.push_str("<|assistant|>");
                prompt.push_str(&turn.content);
                prompt.push_str("<|endoftext|>");
            }
        }
    }
    prompt.push_str("<|assistant|>");
    prompt
}

/// Extract the token text from one SSE line, if it carries any.
fn parse_sse_line(line: &str) -> Option<String> {
    let payload = line.strip_prefix("data:")?.trim();
    if payload.is_empty() || payload == "[DONE]" {
        return None;
    }
    let event: StreamEvent = serde_json::from_str(payload).ok()?;
    match event.token {
        Some(token) if !token.special => Some(token.text),
        _ => None,
    }
}
