mod token_crypto;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use corkboard_core::{AppResult, BoardId, Principal, UserId};
use corkboard_domain::{Capability, ChangeOp, InviteLinkType, InviteToken};
use serde_json::json;

use token_crypto::{generate_token, hash_token};

use crate::{ChangeEventEmitter, InviteRedemption, InviteRepository, PermissionService};

/// Freshly issued invite link.
///
/// `raw_token` is returned exactly once; only its hash is persisted.
#[derive(Debug, Clone)]
pub struct CreatedInvite {
    /// Unguessable token value to embed in the invite URL.
    pub raw_token: String,
    /// Persisted token record.
    pub token: InviteToken,
}

/// Application service for invite link issuance and redemption.
#[derive(Clone)]
pub struct InviteService {
    permissions: PermissionService,
    invites: Arc<dyn InviteRepository>,
    emitter: ChangeEventEmitter,
}

impl InviteService {
    /// Creates an invite service from its collaborators.
    #[must_use]
    pub fn new(
        permissions: PermissionService,
        invites: Arc<dyn InviteRepository>,
        emitter: ChangeEventEmitter,
    ) -> Self {
        Self {
            permissions,
            invites,
            emitter,
        }
    }

    /// Issues an invite link for a board.
    pub async fn create_invite(
        &self,
        actor: Principal,
        board_id: BoardId,
        link_type: InviteLinkType,
        expires_at: Option<DateTime<Utc>>,
    ) -> AppResult<CreatedInvite> {
        self.permissions
            .require(actor, Capability::BoardInvitesManage, Some(board_id))
            .await?;

        let (raw_token, token_hash) = generate_token()?;
        let token = InviteToken::new(token_hash, board_id, actor.user_id(), link_type, expires_at)?;
        self.invites.create_token(token.clone()).await?;

        Ok(CreatedInvite { raw_token, token })
    }

    /// Validates and redeems an invite token for a user.
    ///
    /// The repository performs the whole redemption atomically; this service
    /// maps the outcome and emits the membership change event after the
    /// transaction committed. Failure shapes are returned as distinct
    /// outcomes rather than errors.
    pub async fn redeem(&self, user_id: UserId, raw_token: &str) -> AppResult<InviteRedemption> {
        let token_hash = hash_token(raw_token);
        let outcome = self
            .invites
            .redeem_token(&token_hash, user_id, Utc::now())
            .await?;

        if let InviteRedemption::Joined(membership) = &outcome {
            self.emitter
                .emit(
                    "board_members",
                    ChangeOp::Insert,
                    Some(json!({
                        "board_id": membership.board_id.as_uuid().to_string(),
                        "user_id": membership.user_id.as_uuid().to_string(),
                        "role": membership.role.as_str(),
                    })),
                    None,
                )
                .await;
        }

        Ok(outcome)
    }
}
