use std::str::FromStr;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

use corkboard_application::MembershipRepository;
use corkboard_core::{AppError, AppResult, BoardId, UserId};
use corkboard_domain::{BoardMembership, LegacyRole};

/// PostgreSQL-backed repository for legacy board memberships.
#[derive(Clone)]
pub struct PostgresMembershipRepository {
    pool: PgPool,
}

impl PostgresMembershipRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct MembershipRow {
    board_id: uuid::Uuid,
    user_id: uuid::Uuid,
    role: String,
}

impl MembershipRow {
    fn into_membership(self) -> AppResult<BoardMembership> {
        Ok(BoardMembership {
            board_id: BoardId::from_uuid(self.board_id),
            user_id: UserId::from_uuid(self.user_id),
            role: LegacyRole::from_str(self.role.as_str())?,
        })
    }
}

#[async_trait]
impl MembershipRepository for PostgresMembershipRepository {
    async fn find_membership(
        &self,
        board_id: BoardId,
        user_id: UserId,
    ) -> AppResult<Option<BoardMembership>> {
        let row = sqlx::query_as::<_, MembershipRow>(
            r#"
            SELECT board_id, user_id, role
            FROM board_members
            WHERE board_id = $1 AND user_id = $2
            "#,
        )
        .bind(board_id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find membership: {error}")))?;

        row.map(MembershipRow::into_membership).transpose()
    }

    async fn insert_membership(&self, membership: BoardMembership) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO board_members (board_id, user_id, role)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(membership.board_id.as_uuid())
        .bind(membership.user_id.as_uuid())
        .bind(membership.role.as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| match error {
            sqlx::Error::Database(db_error) if db_error.is_unique_violation() => {
                AppError::Conflict(format!(
                    "user {} is already a member of board {}",
                    membership.user_id, membership.board_id
                ))
            }
            other => AppError::Internal(format!("failed to insert membership: {other}")),
        })?;

        Ok(())
    }

    async fn delete_membership(
        &self,
        board_id: BoardId,
        user_id: UserId,
    ) -> AppResult<Option<BoardMembership>> {
        let row = sqlx::query_as::<_, MembershipRow>(
            r#"
            DELETE FROM board_members
            WHERE board_id = $1 AND user_id = $2
            RETURNING board_id, user_id, role
            "#,
        )
        .bind(board_id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to delete membership: {error}")))?;

        row.map(MembershipRow::into_membership).transpose()
    }

    async fn update_membership_role(
        &self,
        board_id: BoardId,
        user_id: UserId,
        role: LegacyRole,
    ) -> AppResult<Option<LegacyRole>> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to begin transaction: {error}"))
        })?;

        let previous = sqlx::query_scalar::<_, String>(
            r#"
            SELECT role
            FROM board_members
            WHERE board_id = $1 AND user_id = $2
            FOR UPDATE
            "#,
        )
        .bind(board_id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_optional(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to read membership role: {error}")))?;

        let Some(previous) = previous else {
            return Ok(None);
        };

        sqlx::query(
            r#"
            UPDATE board_members
            SET role = $3
            WHERE board_id = $1 AND user_id = $2
            "#,
        )
        .bind(board_id.as_uuid())
        .bind(user_id.as_uuid())
        .bind(role.as_str())
        .execute(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to update membership role: {error}")))?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        Ok(Some(LegacyRole::from_str(previous.as_str())?))
    }

    async fn list_board_memberships(&self, board_id: BoardId) -> AppResult<Vec<BoardMembership>> {
        let rows = sqlx::query_as::<_, MembershipRow>(
            r#"
            SELECT board_id, user_id, role
            FROM board_members
            WHERE board_id = $1
            ORDER BY user_id
            "#,
        )
        .bind(board_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list memberships: {error}")))?;

        rows.into_iter().map(MembershipRow::into_membership).collect()
    }
}
