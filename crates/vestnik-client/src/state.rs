//! Application state shared by every command.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::warn;

use vestnik_media::{BlobStoreClient, GenClient, MusicClient};
use vestnik_shared::Session;
use vestnik_store::{RestBackend, Store};

use crate::auth::{AuthFlow, AuthProvider, RestAuth};
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};

/// Central application state.
///
/// Holds the store handle, the external API clients, the auth provider,
/// and the session flow.  Optional clients stay `None` when their
/// credentials are not configured; the corresponding screens degrade
/// instead of the whole application failing to start.
pub struct AppState {
    pub config: ClientConfig,
    pub store: Store,
    pub auth: Box<dyn AuthProvider>,
    pub flow: Mutex<AuthFlow>,
    pub music: Option<MusicClient>,
    pub generation: Option<GenClient>,
    pub blobs: BlobStoreClient,
}

impl AppState {
    /// Build state for a deployed configuration.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let backend = RestBackend::new(&config.store_url, config.store_token.clone())
            .map_err(ClientError::Store)?;
        let store = Store::new(Arc::new(backend));
        let auth = Box::new(RestAuth::new(&config.auth_url, &config.auth_key)?);

        let music = match MusicClient::new(config.music.clone()) {
            Ok(client) => Some(client),
            Err(e) => {
                warn!(error = %e, "music catalog disabled");
                None
            }
        };
        let generation = match GenClient::new(config.generation.clone()) {
            Ok(client) => Some(client),
            Err(e) => {
                warn!(error = %e, "generation service disabled");
                None
            }
        };
        let blobs = BlobStoreClient::new(config.blobs.clone()).map_err(ClientError::Media)?;

        Ok(Self {
            config,
            store,
            auth,
            flow: Mutex::new(AuthFlow::new()),
            music,
            generation,
            blobs,
        })
    }

    /// State over an in-process store, for tests and demos.
    pub fn in_memory(auth: Box<dyn AuthProvider>) -> Result<Self> {
        let config = ClientConfig::default();
        let blobs = BlobStoreClient::new(config.blobs.clone()).map_err(ClientError::Media)?;
        Ok(Self {
            config,
            store: Store::in_memory(),
            auth,
            flow: Mutex::new(AuthFlow::new()),
            music: None,
            generation: None,
            blobs,
        })
    }

    /// The current session, or `NotSignedIn`.
    pub async fn session(&self) -> Result<Session> {
        self.flow
            .lock()
            .await
            .session()
            .cloned()
            .ok_or(ClientError::NotSignedIn)
    }
}
