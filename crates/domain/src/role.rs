use std::str::FromStr;

use corkboard_core::AppError;
use serde::{Deserialize, Serialize};

use crate::Capability;

/// Capabilities granted by the legacy `manager` role.
///
/// This is the stricter later revision of the tier: board, member, and invite
/// management plus read access. Column, card, and label structure edits are
/// not part of it.
const MANAGER_CAPABILITIES: &[Capability] = &[
    Capability::BoardView,
    Capability::BoardEdit,
    Capability::BoardMembersView,
    Capability::BoardMembersManage,
    Capability::BoardInvitesManage,
    Capability::AttachmentView,
    Capability::AttachmentDownload,
    Capability::SubtaskView,
];

/// Capabilities granted by the legacy `viewer` role.
const VIEWER_CAPABILITIES: &[Capability] = &[
    Capability::BoardView,
    Capability::BoardMembersView,
    Capability::AttachmentView,
    Capability::AttachmentDownload,
    Capability::SubtaskView,
];

/// Original three-tier per-board role, retained as the fallback beneath
/// custom role assignments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegacyRole {
    /// Full control within the board.
    Admin,
    /// Board, member, and invite management without destructive settings.
    Manager,
    /// Read-only access.
    Viewer,
}

impl LegacyRole {
    /// Returns a stable storage value for this role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Manager => "manager",
            Self::Viewer => "viewer",
        }
    }

    /// Returns all known legacy roles.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[LegacyRole] = &[LegacyRole::Admin, LegacyRole::Manager, LegacyRole::Viewer];

        ALL
    }

    /// Returns the board-scoped capabilities the role grants.
    ///
    /// `admin` grants the complete board-scoped vocabulary; the other tiers
    /// use fixed tables kept in lockstep with published role documentation.
    pub fn capabilities(&self) -> impl Iterator<Item = Capability> {
        match self {
            Self::Admin => RoleCapabilityIter::Full(Box::new(Capability::board_scoped())),
            Self::Manager => RoleCapabilityIter::Table(MANAGER_CAPABILITIES.iter()),
            Self::Viewer => RoleCapabilityIter::Table(VIEWER_CAPABILITIES.iter()),
        }
    }

    /// Returns whether the role grants the given board-scoped capability.
    #[must_use]
    pub fn grants(&self, capability: Capability) -> bool {
        self.capabilities().any(|granted| granted == capability)
    }
}

enum RoleCapabilityIter {
    Full(Box<dyn Iterator<Item = Capability>>),
    Table(std::slice::Iter<'static, Capability>),
}

impl Iterator for RoleCapabilityIter {
    type Item = Capability;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Full(inner) => inner.next(),
            Self::Table(inner) => inner.next().copied(),
        }
    }
}

impl FromStr for LegacyRole {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "admin" => Ok(Self::Admin),
            "manager" => Ok(Self::Manager),
            "viewer" => Ok(Self::Viewer),
            _ => Err(AppError::Validation(format!(
                "unknown legacy role value '{value}'"
            ))),
        }
    }
}
