use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use corkboard_core::{AppError, AppResult, BoardId, Principal, UserId};
use corkboard_domain::{
    BoardMembership, Capability, ChangeOp, CustomRole, CustomRoleAssignment, LegacyRole,
    MembershipAuditAction, MembershipAuditEntry,
};
use serde_json::{Value, json};
use tracing::warn;

use crate::{
    AuditRepository, ChangeEventEmitter, CustomRoleRepository, MembershipRepository,
    PermissionService,
};

/// Application service for board membership and custom role administration.
///
/// Every mutation is permission-gated, audited, and emitted as a change
/// event. Audit writes are best-effort: a failed append is logged and never
/// blocks the membership mutation it describes.
#[derive(Clone)]
pub struct MembershipService {
    permissions: PermissionService,
    memberships: Arc<dyn MembershipRepository>,
    custom_roles: Arc<dyn CustomRoleRepository>,
    audit: Arc<dyn AuditRepository>,
    emitter: ChangeEventEmitter,
}

impl MembershipService {
    /// Creates a membership service from its collaborators.
    #[must_use]
    pub fn new(
        permissions: PermissionService,
        memberships: Arc<dyn MembershipRepository>,
        custom_roles: Arc<dyn CustomRoleRepository>,
        audit: Arc<dyn AuditRepository>,
        emitter: ChangeEventEmitter,
    ) -> Self {
        Self {
            permissions,
            memberships,
            custom_roles,
            audit,
            emitter,
        }
    }

    /// Adds a user to a board with the given legacy role.
    pub async fn add_member(
        &self,
        actor: Principal,
        board_id: BoardId,
        user_id: UserId,
        role: LegacyRole,
    ) -> AppResult<BoardMembership> {
        self.permissions
            .require(actor, Capability::BoardMembersManage, Some(board_id))
            .await?;

        let membership = BoardMembership {
            board_id,
            user_id,
            role,
        };
        self.memberships.insert_membership(membership).await?;

        self.record_audit(MembershipAuditEntry {
            board_id,
            action: MembershipAuditAction::Added,
            target_user_id: user_id,
            actor_user_id: Some(actor.user_id()),
            old_role: None,
            new_role: Some(role),
            created_at: Utc::now(),
        })
        .await;

        self.emitter
            .emit(
                "board_members",
                ChangeOp::Insert,
                Some(membership_row(&membership)),
                None,
            )
            .await;

        Ok(membership)
    }

    /// Removes a user from a board.
    ///
    /// The membership DELETE envelope is emitted before any subscription
    /// teardown happens downstream, so the removed member still receives
    /// their own removal notice.
    pub async fn remove_member(
        &self,
        actor: Principal,
        board_id: BoardId,
        user_id: UserId,
    ) -> AppResult<()> {
        self.permissions
            .require(actor, Capability::BoardMembersManage, Some(board_id))
            .await?;

        let removed = self
            .memberships
            .delete_membership(board_id, user_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "user '{user_id}' is not a member of board '{board_id}'"
                ))
            })?;

        self.record_audit(MembershipAuditEntry {
            board_id,
            action: MembershipAuditAction::Removed,
            target_user_id: user_id,
            actor_user_id: Some(actor.user_id()),
            old_role: Some(removed.role),
            new_role: None,
            created_at: Utc::now(),
        })
        .await;

        self.emitter
            .emit(
                "board_members",
                ChangeOp::Delete,
                None,
                Some(membership_row(&removed)),
            )
            .await;

        Ok(())
    }

    /// Changes a member's legacy role.
    pub async fn change_role(
        &self,
        actor: Principal,
        board_id: BoardId,
        user_id: UserId,
        role: LegacyRole,
    ) -> AppResult<()> {
        self.permissions
            .require(actor, Capability::BoardMembersManage, Some(board_id))
            .await?;

        let old_role = self
            .memberships
            .update_membership_role(board_id, user_id, role)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "user '{user_id}' is not a member of board '{board_id}'"
                ))
            })?;

        if old_role == role {
            return Ok(());
        }

        self.record_audit(MembershipAuditEntry {
            board_id,
            action: MembershipAuditAction::RoleChanged,
            target_user_id: user_id,
            actor_user_id: Some(actor.user_id()),
            old_role: Some(old_role),
            new_role: Some(role),
            created_at: Utc::now(),
        })
        .await;

        let old_membership = BoardMembership {
            board_id,
            user_id,
            role: old_role,
        };
        let new_membership = BoardMembership {
            board_id,
            user_id,
            role,
        };
        self.emitter
            .emit(
                "board_members",
                ChangeOp::Update,
                Some(membership_row(&new_membership)),
                Some(membership_row(&old_membership)),
            )
            .await;

        Ok(())
    }

    /// Lists a board's memberships.
    pub async fn list_members(
        &self,
        actor: Principal,
        board_id: BoardId,
    ) -> AppResult<Vec<BoardMembership>> {
        self.permissions
            .require(actor, Capability::BoardMembersView, Some(board_id))
            .await?;

        self.memberships.list_board_memberships(board_id).await
    }

    /// Creates a custom role definition.
    ///
    /// Role definitions are board-independent, so creation is gated on the
    /// app-level settings capability rather than any single board.
    pub async fn create_custom_role(
        &self,
        actor: Principal,
        name: &str,
        capabilities: BTreeSet<Capability>,
    ) -> AppResult<CustomRole> {
        self.permissions
            .require(actor, Capability::AppSettingsManage, None)
            .await?;

        let role = CustomRole::new(name, capabilities)?;
        self.custom_roles.create_custom_role(role.clone()).await?;

        Ok(role)
    }

    /// Assigns a custom role to a user within a board.
    pub async fn assign_custom_role(
        &self,
        actor: Principal,
        assignment: CustomRoleAssignment,
    ) -> AppResult<()> {
        self.permissions
            .require(
                actor,
                Capability::BoardMembersManage,
                Some(assignment.board_id),
            )
            .await?;

        self.custom_roles.assign_custom_role(assignment).await?;

        self.emitter
            .emit(
                "custom_role_assignments",
                ChangeOp::Insert,
                Some(assignment_row(&assignment)),
                None,
            )
            .await;

        Ok(())
    }

    /// Removes a custom role assignment.
    pub async fn unassign_custom_role(
        &self,
        actor: Principal,
        assignment: CustomRoleAssignment,
    ) -> AppResult<()> {
        self.permissions
            .require(
                actor,
                Capability::BoardMembersManage,
                Some(assignment.board_id),
            )
            .await?;

        let existed = self.custom_roles.unassign_custom_role(assignment).await?;
        if !existed {
            return Err(AppError::NotFound(format!(
                "user '{}' has no such custom role assignment on board '{}'",
                assignment.user_id, assignment.board_id
            )));
        }

        self.emitter
            .emit(
                "custom_role_assignments",
                ChangeOp::Delete,
                None,
                Some(assignment_row(&assignment)),
            )
            .await;

        Ok(())
    }

    async fn record_audit(&self, entry: MembershipAuditEntry) {
        if let Err(error) = self.audit.append_entry(entry).await {
            warn!(error = %error, "failed to append membership audit entry");
        }
    }
}

fn membership_row(membership: &BoardMembership) -> Value {
    json!({
        "board_id": membership.board_id.as_uuid().to_string(),
        "user_id": membership.user_id.as_uuid().to_string(),
        "role": membership.role.as_str(),
    })
}

fn assignment_row(assignment: &CustomRoleAssignment) -> Value {
    json!({
        "board_id": assignment.board_id.as_uuid().to_string(),
        "user_id": assignment.user_id.as_uuid().to_string(),
        "custom_role_id": assignment.custom_role_id.as_uuid().to_string(),
    })
}
