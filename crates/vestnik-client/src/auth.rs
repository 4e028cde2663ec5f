//! Authentication: the external auth collaborator and the session flow.
//!
//! [`AuthFlow`] is an explicit state machine.  Signing in moves
//! `SignedOut → Authenticating → SignedIn`; signing out (or a failed
//! attempt) returns to `SignedOut`.  The "just signed in" welcome toast
//! is a one-shot flag consumed through [`AuthFlow::take_just_signed_in`]
//! and not persisted anywhere, so it cannot fire twice or
//! leak across users.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::info;

use vestnik_shared::{Fault, FaultKind, Session, UserId};

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("An account with this email already exists")]
    EmailTaken,

    #[error("Password is too weak")]
    WeakPassword,

    #[error("Invalid input: {0}")]
    Validation(String),

    /// The flow was asked for a transition its current state forbids.
    #[error("Illegal auth transition: {0}")]
    State(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Auth service rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Transient auth service error: {0}")]
    Transient(String),
}

impl Fault for AuthError {
    fn kind(&self) -> FaultKind {
        match self {
            AuthError::InvalidCredentials
            | AuthError::EmailTaken
            | AuthError::WeakPassword
            | AuthError::Validation(_)
            | AuthError::State(_) => FaultKind::Validation,
            AuthError::Transient(_) => FaultKind::TransientRemote,
            AuthError::Rejected { .. } => FaultKind::PermanentRemote,
            AuthError::Http(e) => {
                if e.is_timeout() || e.is_connect() || e.is_request() {
                    FaultKind::TransientRemote
                } else {
                    FaultKind::PermanentRemote
                }
            }
        }
    }
}

/// The external auth collaborator: exchanges credentials for a user id.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<UserId, AuthError>;
    async fn sign_up(&self, email: &str, password: &str) -> Result<UserId, AuthError>;
}

// ---------------------------------------------------------------------------
// REST implementation
// ---------------------------------------------------------------------------

/// Client for the hosted identity service (email/password accounts).
pub struct RestAuth {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    #[serde(rename = "localId")]
    local_id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

impl RestAuth {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Ok(Self {
            http,
            base_url,
            api_key: api_key.into(),
        })
    }

    async fn account_call(
        &self,
        endpoint: &str,
        email: &str,
        password: &str,
    ) -> Result<UserId, AuthError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AuthError::Validation("email and password are required".into()));
        }

        let url = format!("{}/v1/accounts:{endpoint}", self.base_url);
        let response = self
            .http
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&json!({
                "email": email,
                "password": password,
                "returnSecureToken": true,
            }))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let body: AccountResponse = response.json().await?;
            return Ok(UserId::new(body.local_id));
        }

        let message = response
            .json::<ErrorResponse>()
            .await
            .map(|e| e.error.message)
            .unwrap_or_default();
        Err(match message.as_str() {
            m if m.starts_with("INVALID_PASSWORD")
                || m.starts_with("EMAIL_NOT_FOUND")
                || m.starts_with("INVALID_LOGIN_CREDENTIALS") =>
            {
                AuthError::InvalidCredentials
            }
            m if m.starts_with("EMAIL_EXISTS") => AuthError::EmailTaken,
            m if m.starts_with("WEAK_PASSWORD") => AuthError::WeakPassword,
            _ if status.is_server_error() => AuthError::Transient(format!("{status}: {message}")),
            _ => AuthError::Rejected {
                status: status.as_u16(),
                message,
            },
        })
    }
}

#[async_trait]
impl AuthProvider for RestAuth {
    async fn sign_in(&self, email: &str, password: &str) -> Result<UserId, AuthError> {
        let user = self.account_call("signInWithPassword", email, password).await?;
        info!(user = %user, "signed in");
        Ok(user)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<UserId, AuthError> {
        let user = self.account_call("signUp", email, password).await?;
        info!(user = %user, "account created");
        Ok(user)
    }
}

// ---------------------------------------------------------------------------
// Session flow
// ---------------------------------------------------------------------------

/// Explicit session state machine.
#[derive(Debug, Clone)]
pub enum AuthFlow {
    SignedOut,
    Authenticating,
    SignedIn {
        session: Session,
        just_signed_in: bool,
    },
}

impl AuthFlow {
    pub fn new() -> Self {
        AuthFlow::SignedOut
    }

    /// `SignedOut → Authenticating`.
    pub fn begin(&mut self) -> Result<(), AuthError> {
        match self {
            AuthFlow::SignedOut => {
                *self = AuthFlow::Authenticating;
                Ok(())
            }
            AuthFlow::Authenticating => Err(AuthError::State(
                "an authentication attempt is already in progress".into(),
            )),
            AuthFlow::SignedIn { .. } => Err(AuthError::State("already signed in".into())),
        }
    }

    /// `Authenticating → SignedIn`.
    pub fn complete(&mut self, session: Session) -> Result<(), AuthError> {
        match self {
            AuthFlow::Authenticating => {
                *self = AuthFlow::SignedIn {
                    session,
                    just_signed_in: true,
                };
                Ok(())
            }
            _ => Err(AuthError::State(
                "complete() outside an authentication attempt".into(),
            )),
        }
    }

    /// `Authenticating → SignedOut` after a failed attempt.
    pub fn fail(&mut self) {
        if matches!(self, AuthFlow::Authenticating) {
            *self = AuthFlow::SignedOut;
        }
    }

    /// Any state `→ SignedOut`.
    pub fn sign_out(&mut self) {
        *self = AuthFlow::SignedOut;
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            AuthFlow::SignedIn { session, .. } => Some(session),
            _ => None,
        }
    }

    /// One-shot: `true` exactly once per successful sign-in.
    pub fn take_just_signed_in(&mut self) -> bool {
        match self {
            AuthFlow::SignedIn { just_signed_in, .. } => std::mem::take(just_signed_in),
            _ => false,
        }
    }
}

impl Default for AuthFlow {
    fn default() -> Self {
        Self::new()
    }
}
