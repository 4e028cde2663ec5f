use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::UserId;

/// The authenticated identity for one signed-in user.
///
/// Every data-access function takes a `&Session` explicitly.  There is no
/// ambient "current user" read from global state; whoever holds a session
/// is whoever the operation acts as.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub user: UserId,
    pub signed_in_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user: UserId) -> Self {
        Self {
            user,
            signed_in_at: Utc::now(),
        }
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }
}
