use std::collections::BTreeSet;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::warn;

use corkboard_application::CustomRoleRepository;
use corkboard_core::{AppError, AppResult, BoardId, UserId};
use corkboard_domain::{Capability, CustomRole, CustomRoleAssignment};

/// PostgreSQL-backed repository for custom roles and assignments.
#[derive(Clone)]
pub struct PostgresCustomRoleRepository {
    pool: PgPool,
}

impl PostgresCustomRoleRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CustomRoleRepository for PostgresCustomRoleRepository {
    async fn create_custom_role(&self, role: CustomRole) -> AppResult<()> {
        let capabilities: Vec<String> = role
            .capabilities
            .iter()
            .map(|capability| capability.as_str().to_owned())
            .collect();

        sqlx::query(
            r#"
            INSERT INTO custom_roles (id, name, is_system, capabilities)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(role.id.as_uuid())
        .bind(role.name.as_str())
        .bind(role.is_system)
        .bind(capabilities)
        .execute(&self.pool)
        .await
        .map_err(|error| match error {
            sqlx::Error::Database(db_error) if db_error.is_unique_violation() => {
                AppError::Conflict(format!("custom role {} already exists", role.id))
            }
            other => AppError::Internal(format!("failed to create custom role: {other}")),
        })?;

        Ok(())
    }

    async fn assign_custom_role(&self, assignment: CustomRoleAssignment) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO custom_role_assignments (board_id, user_id, custom_role_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (board_id, user_id, custom_role_id) DO NOTHING
            "#,
        )
        .bind(assignment.board_id.as_uuid())
        .bind(assignment.user_id.as_uuid())
        .bind(assignment.custom_role_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|error| match error {
            sqlx::Error::Database(db_error) if db_error.is_foreign_key_violation() => {
                AppError::NotFound(format!(
                    "custom role {} does not exist",
                    assignment.custom_role_id
                ))
            }
            other => AppError::Internal(format!("failed to assign custom role: {other}")),
        })?;

        Ok(())
    }

    async fn unassign_custom_role(&self, assignment: CustomRoleAssignment) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM custom_role_assignments
            WHERE board_id = $1 AND user_id = $2 AND custom_role_id = $3
            "#,
        )
        .bind(assignment.board_id.as_uuid())
        .bind(assignment.user_id.as_uuid())
        .bind(assignment.custom_role_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to unassign custom role: {error}")))?;

        Ok(result.rows_affected() > 0)
    }

    async fn assigned_capabilities(
        &self,
        board_id: BoardId,
        user_id: UserId,
    ) -> AppResult<BTreeSet<Capability>> {
        let bundles = sqlx::query_scalar::<_, Vec<String>>(
            r#"
            SELECT r.capabilities
            FROM custom_role_assignments a
            JOIN custom_roles r ON r.id = a.custom_role_id
            WHERE a.board_id = $1 AND a.user_id = $2
            "#,
        )
        .bind(board_id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to load assigned capabilities: {error}"))
        })?;

        let mut capabilities = BTreeSet::new();
        for key in bundles.into_iter().flatten() {
            match Capability::from_str(key.as_str()) {
                Ok(capability) => {
                    capabilities.insert(capability);
                }
                // Stored keys outlive the vocabulary; an unknown key grants
                // nothing rather than failing every resolution on the board.
                Err(_) => warn!(key, "ignoring unknown capability key in custom role"),
            }
        }

        Ok(capabilities)
    }
}
