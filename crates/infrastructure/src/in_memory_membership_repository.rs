use std::collections::HashMap;

use async_trait::async_trait;
use corkboard_application::MembershipRepository;
use corkboard_core::{AppError, AppResult, BoardId, UserId};
use corkboard_domain::{BoardMembership, LegacyRole};
use tokio::sync::RwLock;

/// In-memory membership store for tests and local development.
#[derive(Default)]
pub struct InMemoryMembershipRepository {
    rows: RwLock<HashMap<(BoardId, UserId), LegacyRole>>,
}

impl InMemoryMembershipRepository {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MembershipRepository for InMemoryMembershipRepository {
    async fn find_membership(
        &self,
        board_id: BoardId,
        user_id: UserId,
    ) -> AppResult<Option<BoardMembership>> {
        Ok(self
            .rows
            .read()
            .await
            .get(&(board_id, user_id))
            .map(|role| BoardMembership {
                board_id,
                user_id,
                role: *role,
            }))
    }

    async fn insert_membership(&self, membership: BoardMembership) -> AppResult<()> {
        let mut rows = self.rows.write().await;
        let key = (membership.board_id, membership.user_id);
        if rows.contains_key(&key) {
            return Err(AppError::Conflict(format!(
                "user {} is already a member of board {}",
                membership.user_id, membership.board_id
            )));
        }

        rows.insert(key, membership.role);
        Ok(())
    }

    async fn delete_membership(
        &self,
        board_id: BoardId,
        user_id: UserId,
    ) -> AppResult<Option<BoardMembership>> {
        Ok(self
            .rows
            .write()
            .await
            .remove(&(board_id, user_id))
            .map(|role| BoardMembership {
                board_id,
                user_id,
                role,
            }))
    }

    async fn update_membership_role(
        &self,
        board_id: BoardId,
        user_id: UserId,
        role: LegacyRole,
    ) -> AppResult<Option<LegacyRole>> {
        let mut rows = self.rows.write().await;
        match rows.get_mut(&(board_id, user_id)) {
            Some(current) => {
                let previous = *current;
                *current = role;
                Ok(Some(previous))
            }
            None => Ok(None),
        }
    }

    async fn list_board_memberships(&self, board_id: BoardId) -> AppResult<Vec<BoardMembership>> {
        let mut memberships: Vec<BoardMembership> = self
            .rows
            .read()
            .await
            .iter()
            .filter(|((row_board_id, _), _)| *row_board_id == board_id)
            .map(|((row_board_id, user_id), role)| BoardMembership {
                board_id: *row_board_id,
                user_id: *user_id,
                role: *role,
            })
            .collect();
        memberships.sort_by_key(|membership| membership.user_id);
        Ok(memberships)
    }
}

#[cfg(test)]
mod tests {
    use corkboard_application::MembershipRepository;
    use corkboard_core::{BoardId, UserId};
    use corkboard_domain::{BoardMembership, LegacyRole};

    use super::InMemoryMembershipRepository;

    #[tokio::test]
    async fn duplicate_insert_is_a_conflict() {
        let repo = InMemoryMembershipRepository::new();
        let membership = BoardMembership {
            board_id: BoardId::new(),
            user_id: UserId::new(),
            role: LegacyRole::Viewer,
        };

        assert!(repo.insert_membership(membership).await.is_ok());
        assert!(repo.insert_membership(membership).await.is_err());
    }

    #[tokio::test]
    async fn role_update_returns_previous_role() {
        let repo = InMemoryMembershipRepository::new();
        let board_id = BoardId::new();
        let user_id = UserId::new();
        let insert = repo
            .insert_membership(BoardMembership {
                board_id,
                user_id,
                role: LegacyRole::Viewer,
            })
            .await;
        assert!(insert.is_ok());

        let previous = repo
            .update_membership_role(board_id, user_id, LegacyRole::Manager)
            .await;
        assert!(matches!(previous, Ok(Some(LegacyRole::Viewer))));

        let found = repo.find_membership(board_id, user_id).await;
        assert!(matches!(
            found,
            Ok(Some(BoardMembership {
                role: LegacyRole::Manager,
                ..
            }))
        ));
    }

    #[tokio::test]
    async fn delete_returns_the_removed_row_once() {
        let repo = InMemoryMembershipRepository::new();
        let board_id = BoardId::new();
        let user_id = UserId::new();
        let insert = repo
            .insert_membership(BoardMembership {
                board_id,
                user_id,
                role: LegacyRole::Admin,
            })
            .await;
        assert!(insert.is_ok());

        let removed = repo.delete_membership(board_id, user_id).await;
        assert!(matches!(removed, Ok(Some(_))));
        let removed_again = repo.delete_membership(board_id, user_id).await;
        assert!(matches!(removed_again, Ok(None)));
    }
}
