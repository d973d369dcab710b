use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use corkboard_application::{InviteRedemption, InviteRepository};
use corkboard_core::{AppError, AppResult, BoardId, UserId};
use corkboard_domain::{
    BoardMembership, InviteLinkType, InviteToken, LegacyRole, MembershipAuditAction,
};

/// PostgreSQL-backed invite token repository.
///
/// Redemption runs in a single transaction with the token row locked, so
/// two concurrent redeemers of a one-time token serialize and exactly one
/// observes the unused state.
#[derive(Clone)]
pub struct PostgresInviteRepository {
    pool: PgPool,
}

impl PostgresInviteRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct TokenRow {
    board_id: uuid::Uuid,
    link_type: String,
    expires_at: Option<DateTime<Utc>>,
    used_at: Option<DateTime<Utc>>,
}

#[async_trait]
impl InviteRepository for PostgresInviteRepository {
    async fn create_token(&self, token: InviteToken) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO invite_tokens
                (token_hash, board_id, created_by, link_type, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(token.token_hash.as_str())
        .bind(token.board_id.as_uuid())
        .bind(token.created_by.as_uuid())
        .bind(token.link_type.as_str())
        .bind(token.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to create invite token: {error}")))?;

        Ok(())
    }

    async fn redeem_token(
        &self,
        token_hash: &str,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> AppResult<InviteRedemption> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to begin transaction: {error}"))
        })?;

        let token = sqlx::query_as::<_, TokenRow>(
            r#"
            SELECT board_id, link_type, expires_at, used_at
            FROM invite_tokens
            WHERE token_hash = $1
            FOR UPDATE
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load invite token: {error}")))?;

        let Some(token) = token else {
            return Ok(InviteRedemption::Invalid);
        };
        if token.used_at.is_some() {
            return Ok(InviteRedemption::AlreadyUsed);
        }
        if token.expires_at.is_some_and(|expires_at| expires_at <= now) {
            return Ok(InviteRedemption::Expired);
        }

        let board_id = BoardId::from_uuid(token.board_id);
        let already_member = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM board_members
            WHERE board_id = $1 AND user_id = $2
            "#,
        )
        .bind(board_id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_one(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to check membership: {error}")))?;

        if already_member > 0 {
            return Ok(InviteRedemption::AlreadyMember(board_id));
        }

        let membership = BoardMembership {
            board_id,
            user_id,
            role: LegacyRole::Viewer,
        };
        sqlx::query(
            r#"
            INSERT INTO board_members (board_id, user_id, role)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(board_id.as_uuid())
        .bind(user_id.as_uuid())
        .bind(membership.role.as_str())
        .execute(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to insert membership: {error}")))?;

        if token.link_type == InviteLinkType::OneTime.as_str() {
            sqlx::query(
                r#"
                UPDATE invite_tokens
                SET used_at = $2, used_by = $3
                WHERE token_hash = $1
                "#,
            )
            .bind(token_hash)
            .bind(now)
            .bind(user_id.as_uuid())
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to mark invite token used: {error}"))
            })?;
        }

        sqlx::query(
            r#"
            INSERT INTO membership_audit_entries
                (board_id, action, target_user_id, actor_user_id, old_role, new_role, created_at)
            VALUES ($1, $2, $3, NULL, NULL, $4, $5)
            "#,
        )
        .bind(board_id.as_uuid())
        .bind(MembershipAuditAction::AddedViaInvite.as_str())
        .bind(user_id.as_uuid())
        .bind(membership.role.as_str())
        .bind(now)
        .execute(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to append audit entry: {error}")))?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        Ok(InviteRedemption::Joined(membership))
    }
}
