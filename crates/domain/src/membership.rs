use std::collections::BTreeSet;

use corkboard_core::{AppError, AppResult, BoardId, CustomRoleId, UserId};
use serde::{Deserialize, Serialize};

use crate::{Capability, LegacyRole};

/// One user's legacy role on one board.
///
/// Exactly one row exists per (board, user); it is created when the user is
/// added and deleted when the user is removed or the board is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardMembership {
    /// Board the membership belongs to.
    pub board_id: BoardId,
    /// Member user.
    pub user_id: UserId,
    /// Legacy role evaluated beneath custom role assignments.
    pub role: LegacyRole,
}

/// Named, board-independent bundle of capability keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomRole {
    /// Stable role identifier.
    pub id: CustomRoleId,
    /// Display name.
    pub name: String,
    /// Whether the role is system-defined and immutable.
    pub is_system: bool,
    /// Capability keys the role bundles; insertion order is irrelevant.
    pub capabilities: BTreeSet<Capability>,
}

impl CustomRole {
    /// Creates an admin-defined custom role.
    pub fn new(name: impl Into<String>, capabilities: BTreeSet<Capability>) -> AppResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(AppError::Validation(
                "custom role name must not be empty".to_owned(),
            ));
        }

        if let Some(capability) = capabilities.iter().find(|value| value.is_app_scoped()) {
            return Err(AppError::Validation(format!(
                "custom roles cannot bundle app-scoped capability '{}'",
                capability.as_str()
            )));
        }

        Ok(Self {
            id: CustomRoleId::new(),
            name,
            is_system: false,
            capabilities,
        })
    }
}

/// Assignment of a custom role to a user within one board.
///
/// Many assignments per (board, user) are allowed; the effective grant is the
/// union of all assigned roles' capabilities, evaluated only in that board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomRoleAssignment {
    /// Board the assignment is scoped to.
    pub board_id: BoardId,
    /// Assigned user.
    pub user_id: UserId,
    /// Assigned custom role.
    pub custom_role_id: CustomRoleId,
}
