use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use corkboard_application::{AuditQuery, AuditRepository};
use corkboard_core::{AppError, AppResult, BoardId, UserId};
use corkboard_domain::{LegacyRole, MembershipAuditAction, MembershipAuditEntry};

/// PostgreSQL-backed append-only membership audit log.
#[derive(Clone)]
pub struct PostgresAuditRepository {
    pool: PgPool,
}

impl PostgresAuditRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct AuditRow {
    board_id: uuid::Uuid,
    action: String,
    target_user_id: uuid::Uuid,
    actor_user_id: Option<uuid::Uuid>,
    old_role: Option<String>,
    new_role: Option<String>,
    created_at: DateTime<Utc>,
}

impl AuditRow {
    fn into_entry(self) -> AppResult<MembershipAuditEntry> {
        Ok(MembershipAuditEntry {
            board_id: BoardId::from_uuid(self.board_id),
            action: MembershipAuditAction::from_str(self.action.as_str())?,
            target_user_id: UserId::from_uuid(self.target_user_id),
            actor_user_id: self.actor_user_id.map(UserId::from_uuid),
            old_role: self
                .old_role
                .as_deref()
                .map(LegacyRole::from_str)
                .transpose()?,
            new_role: self
                .new_role
                .as_deref()
                .map(LegacyRole::from_str)
                .transpose()?,
            created_at: self.created_at,
        })
    }
}

#[async_trait]
impl AuditRepository for PostgresAuditRepository {
    async fn append_entry(&self, entry: MembershipAuditEntry) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO membership_audit_entries
                (board_id, action, target_user_id, actor_user_id, old_role, new_role, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(entry.board_id.as_uuid())
        .bind(entry.action.as_str())
        .bind(entry.target_user_id.as_uuid())
        .bind(entry.actor_user_id.map(|user_id| user_id.as_uuid()))
        .bind(entry.old_role.map(|role| role.as_str()))
        .bind(entry.new_role.map(|role| role.as_str()))
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to append audit entry: {error}")))?;

        Ok(())
    }

    async fn list_board_entries(
        &self,
        board_id: BoardId,
        query: AuditQuery,
    ) -> AppResult<Vec<MembershipAuditEntry>> {
        let rows = sqlx::query_as::<_, AuditRow>(
            r#"
            SELECT board_id, action, target_user_id, actor_user_id, old_role, new_role, created_at
            FROM membership_audit_entries
            WHERE board_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            OFFSET $3
            "#,
        )
        .bind(board_id.as_uuid())
        .bind(query.limit as i64)
        .bind(query.offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list audit entries: {error}")))?;

        rows.into_iter().map(AuditRow::into_entry).collect()
    }

    async fn sweep_expired(
        &self,
        global_max_age_days: Option<u32>,
        now: DateTime<Utc>,
    ) -> AppResult<u64> {
        // 0 means "never expire" both globally and per board.
        let global_days = i32::try_from(global_max_age_days.unwrap_or(0))
            .map_err(|_| AppError::Validation("retention window out of range".to_owned()))?;

        let scoped = sqlx::query(
            r#"
            DELETE FROM membership_audit_entries e
            USING boards b
            WHERE b.id = e.board_id
              AND COALESCE(b.audit_retention_days, $1) > 0
              AND e.created_at <
                  $2::timestamptz - make_interval(days => COALESCE(b.audit_retention_days, $1))
            "#,
        )
        .bind(global_days)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to sweep audit entries: {error}")))?;

        // Entries that outlived their board fall back to the global window.
        let orphaned = sqlx::query(
            r#"
            DELETE FROM membership_audit_entries e
            WHERE NOT EXISTS (SELECT 1 FROM boards b WHERE b.id = e.board_id)
              AND $1 > 0
              AND e.created_at < $2::timestamptz - make_interval(days => $1)
            "#,
        )
        .bind(global_days)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to sweep orphaned audit entries: {error}"))
        })?;

        Ok(scoped.rows_affected() + orphaned.rows_affected())
    }
}
