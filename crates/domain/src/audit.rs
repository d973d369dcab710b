use std::str::FromStr;

use chrono::{DateTime, Utc};
use corkboard_core::{AppError, BoardId, UserId};
use serde::{Deserialize, Serialize};

use crate::LegacyRole;

/// Stable membership-change actions recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipAuditAction {
    /// A member was added directly.
    Added,
    /// A member was removed.
    Removed,
    /// A member's legacy role was changed.
    RoleChanged,
    /// A member joined by redeeming an invite link.
    AddedViaInvite,
}

impl MembershipAuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Removed => "removed",
            Self::RoleChanged => "role_changed",
            Self::AddedViaInvite => "added_via_invite",
        }
    }
}

impl FromStr for MembershipAuditAction {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "added" => Ok(Self::Added),
            "removed" => Ok(Self::Removed),
            "role_changed" => Ok(Self::RoleChanged),
            "added_via_invite" => Ok(Self::AddedViaInvite),
            _ => Err(AppError::Validation(format!(
                "unknown membership audit action '{value}'"
            ))),
        }
    }
}

/// Immutable record of one board-membership change.
///
/// Written in the same transaction as the membership mutation it describes,
/// never updated, and deleted only by the retention sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipAuditEntry {
    /// Board the change happened on.
    pub board_id: BoardId,
    /// What happened.
    pub action: MembershipAuditAction,
    /// User the change was about.
    pub target_user_id: UserId,
    /// User who performed the change; `None` for system-triggered changes.
    pub actor_user_id: Option<UserId>,
    /// Previous legacy role, for role changes and removals.
    pub old_role: Option<LegacyRole>,
    /// New legacy role, for additions and role changes.
    pub new_role: Option<LegacyRole>,
    /// When the change was recorded.
    pub created_at: DateTime<Utc>,
}
