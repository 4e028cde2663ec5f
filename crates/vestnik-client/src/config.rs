//! Client configuration loaded from environment variables.
//!
//! All endpoints have development defaults; only credentials (API keys,
//! client secrets) must be provided for the corresponding feature to
//! come up.

use vestnik_media::{BlobConfig, GenConfig, MusicConfig};

/// Configuration for every remote collaborator.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Document store root URL.
    /// Env: `VESTNIK_STORE_URL`
    pub store_url: String,

    /// Document store auth token, if the deployment requires one.
    /// Env: `VESTNIK_STORE_TOKEN`
    pub store_token: Option<String>,

    /// Identity service root URL.
    /// Env: `VESTNIK_AUTH_URL`
    pub auth_url: String,

    /// Identity service API key.
    /// Env: `VESTNIK_AUTH_KEY`
    pub auth_key: String,

    /// Music catalog credentials and endpoints.
    /// Env: `MUSIC_CLIENT_ID`, `MUSIC_CLIENT_SECRET`,
    ///      `MUSIC_TOKEN_URL`, `MUSIC_API_URL`
    pub music: MusicConfig,

    /// Generation service endpoint, token, and model ids.
    /// Env: `GEN_API_URL`, `GEN_API_TOKEN`,
    ///      `GEN_TEXT_MODEL`, `GEN_IMAGE_MODEL`
    pub generation: GenConfig,

    /// Binary object store endpoint and upload ceiling.
    /// Env: `BLOB_STORE_URL`, `BLOB_STORE_TOKEN`, `BLOB_MAX_SIZE`
    pub blobs: BlobConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            store_url: "http://localhost:9000".to_string(),
            store_token: None,
            auth_url: "https://identitytoolkit.googleapis.com".to_string(),
            auth_key: String::new(),
            music: MusicConfig {
                client_id: String::new(),
                client_secret: String::new(),
                token_url: "https://accounts.spotify.com/api/token".to_string(),
                api_url: "https://api.spotify.com/v1".to_string(),
            },
            generation: GenConfig {
                base_url: "https://api-inference.huggingface.co".to_string(),
                api_token: String::new(),
                text_model: "meta-llama/Meta-Llama-3-8B-Instruct".to_string(),
                image_model: "stabilityai/stable-diffusion-2-1".to_string(),
            },
            blobs: BlobConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("VESTNIK_STORE_URL") {
            config.store_url = url;
        }
        if let Ok(token) = std::env::var("VESTNIK_STORE_TOKEN") {
            if !token.is_empty() {
                config.store_token = Some(token);
            }
        }
        if let Ok(url) = std::env::var("VESTNIK_AUTH_URL") {
            config.auth_url = url;
        }
        if let Ok(key) = std::env::var("VESTNIK_AUTH_KEY") {
            config.auth_key = key;
        }

        if let Ok(id) = std::env::var("MUSIC_CLIENT_ID") {
            config.music.client_id = id;
        }
        if let Ok(secret) = std::env::var("MUSIC_CLIENT_SECRET") {
            config.music.client_secret = secret;
        }
        if let Ok(url) = std::env::var("MUSIC_TOKEN_URL") {
            config.music.token_url = url;
        }
        if let Ok(url) = std::env::var("MUSIC_API_URL") {
            config.music.api_url = url;
        }

        if let Ok(url) = std::env::var("GEN_API_URL") {
            config.generation.base_url = url;
        }
        if let Ok(token) = std::env::var("GEN_API_TOKEN") {
            config.generation.api_token = token;
        }
        if let Ok(model) = std::env::var("GEN_TEXT_MODEL") {
            config.generation.text_model = model;
        }
        if let Ok(model) = std::env::var("GEN_IMAGE_MODEL") {
            config.generation.image_model = model;
        }

        if let Ok(url) = std::env::var("BLOB_STORE_URL") {
            config.blobs.base_url = url;
        }
        if let Ok(token) = std::env::var("BLOB_STORE_TOKEN") {
            if !token.is_empty() {
                config.blobs.auth_token = Some(token);
            }
        }
        if let Ok(size) = std::env::var("BLOB_MAX_SIZE") {
            match size.parse::<usize>() {
                Ok(n) => config.blobs.max_size = n,
                Err(_) => {
                    tracing::warn!(value = %size, "Invalid BLOB_MAX_SIZE, using default");
                }
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter.

        config
    }
}
