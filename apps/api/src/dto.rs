//! Request and response payloads for the HTTP API.

use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use corkboard_application::{CreatedInvite, InviteRedemption};
use corkboard_core::{AppError, AppResult, BoardId, UserId};
use corkboard_domain::{
    BoardMembership, Capability, CustomRole, InviteLinkType, LegacyRole, MembershipAuditEntry,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub user_id: UserId,
    pub role: LegacyRole,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRoleRequest {
    pub role: LegacyRole,
}

#[derive(Debug, Serialize)]
pub struct MemberResponse {
    pub board_id: BoardId,
    pub user_id: UserId,
    pub role: LegacyRole,
}

impl From<BoardMembership> for MemberResponse {
    fn from(value: BoardMembership) -> Self {
        Self {
            board_id: value.board_id,
            user_id: value.user_id,
            role: value.role,
        }
    }
}

/// Effective capability keys for the caller on one board.
#[derive(Debug, Serialize)]
pub struct PermissionsResponse {
    pub capabilities: Vec<&'static str>,
}

impl PermissionsResponse {
    pub fn from_set(capabilities: &BTreeSet<Capability>) -> Self {
        Self {
            capabilities: capabilities.iter().map(Capability::as_str).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateRoleRequest {
    pub name: String,
    /// Capability keys in their dotted storage form (for example
    /// `board.members.manage`).
    pub capabilities: Vec<String>,
}

impl CreateRoleRequest {
    pub fn parsed_capabilities(&self) -> AppResult<BTreeSet<Capability>> {
        self.capabilities
            .iter()
            .map(|key| {
                Capability::from_str(key.as_str()).map_err(|_| {
                    AppError::Validation(format!("unknown capability key '{key}'"))
                })
            })
            .collect()
    }
}

#[derive(Debug, Serialize)]
pub struct CustomRoleResponse {
    pub id: String,
    pub name: String,
    pub capabilities: Vec<&'static str>,
}

impl From<CustomRole> for CustomRoleResponse {
    fn from(value: CustomRole) -> Self {
        Self {
            id: value.id.to_string(),
            name: value.name,
            capabilities: value.capabilities.iter().map(Capability::as_str).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AssignRoleRequest {
    pub user_id: UserId,
}

#[derive(Debug, Deserialize)]
pub struct CreateInviteRequest {
    pub link_type: InviteLinkType,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct InviteResponse {
    /// Raw token; shown exactly once at creation.
    pub token: String,
    pub board_id: BoardId,
    pub link_type: InviteLinkType,
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<CreatedInvite> for InviteResponse {
    fn from(value: CreatedInvite) -> Self {
        Self {
            token: value.raw_token,
            board_id: value.token.board_id,
            link_type: value.token.link_type,
            expires_at: value.token.expires_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RedeemInviteRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct RedeemInviteResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub board_id: Option<BoardId>,
}

impl From<InviteRedemption> for RedeemInviteResponse {
    fn from(value: InviteRedemption) -> Self {
        match value {
            InviteRedemption::Joined(membership) => Self {
                status: "joined",
                board_id: Some(membership.board_id),
            },
            InviteRedemption::AlreadyMember(board_id) => Self {
                status: "already_member",
                board_id: Some(board_id),
            },
            InviteRedemption::Invalid => Self {
                status: "invalid",
                board_id: None,
            },
            InviteRedemption::Expired => Self {
                status: "expired",
                board_id: None,
            },
            InviteRedemption::AlreadyUsed => Self {
                status: "already_used",
                board_id: None,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuditEntryResponse {
    pub board_id: BoardId,
    pub action: &'static str,
    pub target_user_id: UserId,
    pub actor_user_id: Option<UserId>,
    pub old_role: Option<&'static str>,
    pub new_role: Option<&'static str>,
    pub created_at: DateTime<Utc>,
}

impl From<MembershipAuditEntry> for AuditEntryResponse {
    fn from(value: MembershipAuditEntry) -> Self {
        Self {
            board_id: value.board_id,
            action: value.action.as_str(),
            target_user_id: value.target_user_id,
            actor_user_id: value.actor_user_id,
            old_role: value.old_role.map(|role| role.as_str()),
            new_role: value.new_role.map(|role| role.as_str()),
            created_at: value.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::CreateRoleRequest;

    #[test]
    fn role_request_rejects_unknown_capability_keys() {
        let request = CreateRoleRequest {
            name: "reviewers".to_owned(),
            capabilities: vec!["board.view".to_owned(), "board.launch_rockets".to_owned()],
        };
        assert!(request.parsed_capabilities().is_err());
    }

    #[test]
    fn role_request_parses_dotted_keys() {
        let request = CreateRoleRequest {
            name: "reviewers".to_owned(),
            capabilities: vec!["board.view".to_owned(), "comment.write".to_owned()],
        };
        let parsed = request.parsed_capabilities();
        assert!(parsed.is_ok());
        assert_eq!(parsed.unwrap_or_default().len(), 2);
    }
}
