//! # vestnik-store
//!
//! Data layer of the Vestnik client: typed operations over a remote
//! key-path document database.
//!
//! The backend is a seam ([`DocumentBackend`]) with two implementations:
//! the hosted REST store used in production and an in-process tree used
//! by tests.  Everything that mutates shared records (friend lists, chat
//! logs, like counters, photo collections) goes through a bounded
//! conditional-write loop, so concurrent writers cannot lose each
//! other's updates.

pub mod backend;
pub mod chats;
pub mod feed;
pub mod memory;
pub mod models;
pub mod paths;
pub mod photos;
pub mod posts;
pub mod rest;
pub mod store;
pub mod tracks;
pub mod users;
pub mod value;

mod error;

pub use backend::{CasOutcome, DocumentBackend, Etag, Snapshot};
pub use error::{Result, StoreError};
pub use memory::MemoryBackend;
pub use models::*;
pub use rest::RestBackend;
pub use store::Store;
