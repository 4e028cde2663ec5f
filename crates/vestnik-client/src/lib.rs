//! # vestnik-client
//!
//! The command layer an embedding shell calls.  Owns application state
//! (store handle, external API clients, the auth flow), exposes thin
//! per-feature command modules returning camelCase DTOs, and maps every
//! failure onto one uniform user-facing notice.

pub mod auth;
pub mod commands;
pub mod config;
pub mod notify;
pub mod state;
pub mod telemetry;

mod error;

pub use auth::{AuthFlow, AuthProvider, RestAuth};
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use notify::{Notice, NoticeLevel};
pub use state::AppState;
