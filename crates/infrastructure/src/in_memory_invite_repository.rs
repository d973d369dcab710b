use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use corkboard_application::{
    AuditRepository, InviteRedemption, InviteRepository, MembershipRepository,
};
use corkboard_core::{AppError, AppResult, UserId};
use corkboard_domain::{
    BoardMembership, InviteLinkType, InviteToken, LegacyRole, MembershipAuditAction,
    MembershipAuditEntry,
};
use tokio::sync::RwLock;

use crate::{InMemoryAuditRepository, InMemoryMembershipRepository};

/// In-memory invite token store for tests and local development.
///
/// Redemption mutates the shared membership and audit stores the same way the
/// Postgres adapter does in one transaction; the token write lock is held for
/// the whole sequence so concurrent redeemers serialize.
pub struct InMemoryInviteRepository {
    tokens: RwLock<HashMap<String, InviteToken>>,
    memberships: Arc<InMemoryMembershipRepository>,
    audit: Arc<InMemoryAuditRepository>,
}

impl InMemoryInviteRepository {
    /// Creates a store writing redeemed memberships and audit entries into
    /// the given shared stores.
    #[must_use]
    pub fn new(
        memberships: Arc<InMemoryMembershipRepository>,
        audit: Arc<InMemoryAuditRepository>,
    ) -> Self {
        Self {
            tokens: RwLock::new(HashMap::new()),
            memberships,
            audit,
        }
    }
}

#[async_trait]
impl InviteRepository for InMemoryInviteRepository {
    async fn create_token(&self, token: InviteToken) -> AppResult<()> {
        let mut tokens = self.tokens.write().await;
        if tokens.contains_key(&token.token_hash) {
            return Err(AppError::Conflict("invite token hash collision".to_owned()));
        }

        tokens.insert(token.token_hash.clone(), token);
        Ok(())
    }

    async fn redeem_token(
        &self,
        token_hash: &str,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> AppResult<InviteRedemption> {
        let mut tokens = self.tokens.write().await;
        let Some(token) = tokens.get_mut(token_hash) else {
            return Ok(InviteRedemption::Invalid);
        };

        if token.is_used() {
            return Ok(InviteRedemption::AlreadyUsed);
        }
        if token.is_expired(now) {
            return Ok(InviteRedemption::Expired);
        }

        let board_id = token.board_id;
        if self
            .memberships
            .find_membership(board_id, user_id)
            .await?
            .is_some()
        {
            return Ok(InviteRedemption::AlreadyMember(board_id));
        }

        let membership = BoardMembership {
            board_id,
            user_id,
            role: LegacyRole::Viewer,
        };
        self.memberships.insert_membership(membership).await?;

        if token.link_type == InviteLinkType::OneTime {
            token.used_at = Some(now);
            token.used_by = Some(user_id);
        }

        self.audit
            .append_entry(MembershipAuditEntry {
                board_id,
                action: MembershipAuditAction::AddedViaInvite,
                target_user_id: user_id,
                actor_user_id: None,
                old_role: None,
                new_role: Some(LegacyRole::Viewer),
                created_at: now,
            })
            .await?;

        Ok(InviteRedemption::Joined(membership))
    }
}
