use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use corkboard_application::ScopeRepository;
use corkboard_core::{AppError, AppResult, BoardId, WorkspaceId};

/// PostgreSQL-backed ownership lookups for scope resolution.
///
/// Each hop is a single primary-key read; a missing parent maps to `None`
/// so resolution can tolerate rows observed mid-cascade.
#[derive(Clone)]
pub struct PostgresScopeRepository {
    pool: PgPool,
}

impl PostgresScopeRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScopeRepository for PostgresScopeRepository {
    async fn board_workspace_id(&self, board_id: BoardId) -> AppResult<Option<WorkspaceId>> {
        let workspace_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT workspace_id
            FROM boards
            WHERE id = $1
            "#,
        )
        .bind(board_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to resolve board workspace: {error}"))
        })?;

        Ok(workspace_id.map(WorkspaceId::from_uuid))
    }

    async fn column_board_id(&self, column_id: Uuid) -> AppResult<Option<BoardId>> {
        let board_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT board_id
            FROM columns
            WHERE id = $1
            "#,
        )
        .bind(column_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to resolve column board: {error}")))?;

        Ok(board_id.map(BoardId::from_uuid))
    }

    async fn card_column_id(&self, card_id: Uuid) -> AppResult<Option<Uuid>> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT column_id
            FROM cards
            WHERE id = $1
            "#,
        )
        .bind(card_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to resolve card column: {error}")))
    }
}
