//! Ports consumed by the application services.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use corkboard_core::{AppResult, BoardId, UserId, WorkspaceId};
use corkboard_domain::{
    BoardMembership, Capability, ChangeEnvelope, CustomRole, CustomRoleAssignment, InviteToken,
    LegacyRole, MembershipAuditEntry,
};
use uuid::Uuid;

/// Repository port for legacy board memberships.
#[async_trait]
pub trait MembershipRepository: Send + Sync {
    /// Finds the membership row for a user on a board.
    async fn find_membership(
        &self,
        board_id: BoardId,
        user_id: UserId,
    ) -> AppResult<Option<BoardMembership>>;

    /// Inserts a membership row; fails on an existing (board, user) pair.
    async fn insert_membership(&self, membership: BoardMembership) -> AppResult<()>;

    /// Deletes a membership row, returning the removed row if present.
    async fn delete_membership(
        &self,
        board_id: BoardId,
        user_id: UserId,
    ) -> AppResult<Option<BoardMembership>>;

    /// Updates a member's legacy role, returning the previous role if the
    /// membership exists.
    async fn update_membership_role(
        &self,
        board_id: BoardId,
        user_id: UserId,
        role: LegacyRole,
    ) -> AppResult<Option<LegacyRole>>;

    /// Lists memberships for a board.
    async fn list_board_memberships(&self, board_id: BoardId) -> AppResult<Vec<BoardMembership>>;
}

/// Repository port for custom roles and their per-board assignments.
#[async_trait]
pub trait CustomRoleRepository: Send + Sync {
    /// Persists a custom role definition.
    async fn create_custom_role(&self, role: CustomRole) -> AppResult<()>;

    /// Records a custom role assignment; duplicate assignments are a no-op.
    async fn assign_custom_role(&self, assignment: CustomRoleAssignment) -> AppResult<()>;

    /// Removes a custom role assignment, returning whether one existed.
    async fn unassign_custom_role(&self, assignment: CustomRoleAssignment) -> AppResult<bool>;

    /// Returns the union of capability sets from every custom role assigned
    /// to the user on the board.
    async fn assigned_capabilities(
        &self,
        board_id: BoardId,
        user_id: UserId,
    ) -> AppResult<BTreeSet<Capability>>;
}

/// Repository port for board and workspace ownership hops.
///
/// Every lookup is read-only and tolerates a missing parent by returning
/// `None`; the parent may be gone mid-transaction during a cascading delete.
#[async_trait]
pub trait ScopeRepository: Send + Sync {
    /// Returns the workspace owning a board.
    async fn board_workspace_id(&self, board_id: BoardId) -> AppResult<Option<WorkspaceId>>;

    /// Returns the board owning a column.
    async fn column_board_id(&self, column_id: Uuid) -> AppResult<Option<BoardId>>;

    /// Returns the column owning a card.
    async fn card_column_id(&self, card_id: Uuid) -> AppResult<Option<Uuid>>;
}

/// Paging for audit log reads.
#[derive(Debug, Clone, Copy)]
pub struct AuditQuery {
    /// Maximum number of entries to return.
    pub limit: usize,
    /// Number of newest entries to skip.
    pub offset: usize,
}

impl AuditQuery {
    /// Bounds the query to the paging window the service serves; repository
    /// implementations receive the values as-is.
    #[must_use]
    pub fn clamped(self) -> Self {
        Self {
            limit: self.limit.clamp(1, 200),
            offset: self.offset.min(5_000),
        }
    }
}

impl Default for AuditQuery {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

/// Port for the append-only membership audit log.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Persists one audit entry.
    async fn append_entry(&self, entry: MembershipAuditEntry) -> AppResult<()>;

    /// Lists a board's newest entries.
    async fn list_board_entries(
        &self,
        board_id: BoardId,
        query: AuditQuery,
    ) -> AppResult<Vec<MembershipAuditEntry>>;

    /// Deletes entries older than the applicable retention window and returns
    /// how many were removed.
    ///
    /// A per-board retention setting overrides the global one; `None` for
    /// both means entries never expire. Re-running with nothing expired
    /// deletes zero rows.
    async fn sweep_expired(
        &self,
        global_max_age_days: Option<u32>,
        now: DateTime<Utc>,
    ) -> AppResult<u64>;
}

/// Result of one invite redemption attempt.
///
/// Failure shapes are distinct user-facing outcomes, not generic errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InviteRedemption {
    /// Membership was created with the viewer role.
    Joined(BoardMembership),
    /// The user already held a membership; nothing changed.
    AlreadyMember(BoardId),
    /// No token matches the presented value.
    Invalid,
    /// The token's expiry has passed.
    Expired,
    /// A one-time token was already redeemed.
    AlreadyUsed,
}

/// Repository port for invite tokens.
#[async_trait]
pub trait InviteRepository: Send + Sync {
    /// Persists a freshly created invite token.
    async fn create_token(&self, token: InviteToken) -> AppResult<()>;

    /// Atomically validates and redeems a token for a user.
    ///
    /// The implementation performs the whole sequence in one transaction:
    /// existence, used/expired checks, existing-membership no-op, membership
    /// insert with the viewer role, marking one-time tokens used, and the
    /// `added_via_invite` audit entry. Partial application is a bug.
    async fn redeem_token(
        &self,
        token_hash: &str,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> AppResult<InviteRedemption>;
}

/// Port handing committed change envelopes to the distribution layer.
///
/// `publish` must never block or fail the caller: implementations queue the
/// envelope and deal with slow or vanished subscribers on their own time.
pub trait ChangePublisher: Send + Sync {
    /// Queues one envelope for fan-out.
    fn publish(&self, envelope: ChangeEnvelope);
}
