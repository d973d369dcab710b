use serde::{Deserialize, Serialize};

use crate::UserId;

/// Authenticated identity attached to a request or live connection.
///
/// The pair is supplied by the external auth layer after session or token
/// validation; this crate never issues or verifies credentials itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    user_id: UserId,
    is_global_admin: bool,
}

impl Principal {
    /// Creates a principal from validated identity data.
    #[must_use]
    pub fn new(user_id: UserId, is_global_admin: bool) -> Self {
        Self {
            user_id,
            is_global_admin,
        }
    }

    /// Returns the stable user identifier.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns whether the user holds the global admin override.
    #[must_use]
    pub fn is_global_admin(&self) -> bool {
        self.is_global_admin
    }
}
