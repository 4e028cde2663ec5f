//! # vestnik-shared
//!
//! Types shared by every Vestnik crate: id newtypes, the authenticated
//! session context, the fault taxonomy used for user-facing notices, and
//! application-wide constants.

pub mod constants;
pub mod error;
pub mod session;
pub mod types;

pub use error::{Fault, FaultKind};
pub use session::Session;
pub use types::{ChatId, PostId, PostKey, TrackId, UserId};
