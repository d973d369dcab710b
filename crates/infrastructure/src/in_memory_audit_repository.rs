use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use corkboard_application::{AuditQuery, AuditRepository};
use corkboard_core::{AppResult, BoardId};
use corkboard_domain::MembershipAuditEntry;
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    entries: Vec<MembershipAuditEntry>,
    /// Per-board retention override in days; `0` disables expiry for the
    /// board, an absent entry inherits the global window.
    retention_overrides: HashMap<BoardId, u32>,
}

/// In-memory audit log for tests and local development.
#[derive(Default)]
pub struct InMemoryAuditRepository {
    state: RwLock<State>,
}

impl InMemoryAuditRepository {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a board's retention override in days.
    pub async fn set_board_retention(&self, board_id: BoardId, days: u32) {
        self.state.write().await.retention_overrides.insert(board_id, days);
    }
}

fn retention_days(state: &State, board_id: BoardId, global: Option<u32>) -> Option<u32> {
    match state.retention_overrides.get(&board_id) {
        Some(0) => None,
        Some(days) => Some(*days),
        None => global.filter(|days| *days > 0),
    }
}

#[async_trait]
impl AuditRepository for InMemoryAuditRepository {
    async fn append_entry(&self, entry: MembershipAuditEntry) -> AppResult<()> {
        self.state.write().await.entries.push(entry);
        Ok(())
    }

    async fn list_board_entries(
        &self,
        board_id: BoardId,
        query: AuditQuery,
    ) -> AppResult<Vec<MembershipAuditEntry>> {
        let state = self.state.read().await;
        let mut entries: Vec<MembershipAuditEntry> = state
            .entries
            .iter()
            .filter(|entry| entry.board_id == board_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(entries
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect())
    }

    async fn sweep_expired(
        &self,
        global_max_age_days: Option<u32>,
        now: DateTime<Utc>,
    ) -> AppResult<u64> {
        let mut state = self.state.write().await;
        let before = state.entries.len();

        let retained: Vec<MembershipAuditEntry> = state
            .entries
            .iter()
            .filter(|entry| {
                match retention_days(&state, entry.board_id, global_max_age_days) {
                    Some(days) => entry.created_at > now - Duration::days(i64::from(days)),
                    None => true,
                }
            })
            .cloned()
            .collect();
        state.entries = retained;

        Ok((before - state.entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use corkboard_application::{AuditQuery, AuditRepository};
    use corkboard_core::{BoardId, UserId};
    use corkboard_domain::{MembershipAuditAction, MembershipAuditEntry};

    use super::InMemoryAuditRepository;

    fn entry(board_id: BoardId, age_days: i64) -> MembershipAuditEntry {
        MembershipAuditEntry {
            board_id,
            action: MembershipAuditAction::Added,
            target_user_id: UserId::new(),
            actor_user_id: Some(UserId::new()),
            old_role: None,
            new_role: None,
            created_at: Utc::now() - Duration::days(age_days),
        }
    }

    #[tokio::test]
    async fn listing_is_newest_first_and_paged() {
        let repo = InMemoryAuditRepository::new();
        let board_id = BoardId::new();
        for age in [30, 10, 20] {
            assert!(repo.append_entry(entry(board_id, age)).await.is_ok());
        }

        let page = repo
            .list_board_entries(board_id, AuditQuery { limit: 2, offset: 0 })
            .await
            .unwrap_or_default();
        assert_eq!(page.len(), 2);
        assert!(page[0].created_at > page[1].created_at);

        let rest = repo
            .list_board_entries(board_id, AuditQuery { limit: 2, offset: 2 })
            .await
            .unwrap_or_default();
        assert_eq!(rest.len(), 1);
    }

    #[tokio::test]
    async fn sweep_honors_board_override_and_is_idempotent() {
        let repo = InMemoryAuditRepository::new();
        let strict_board = BoardId::new();
        let keep_forever_board = BoardId::new();
        let default_board = BoardId::new();
        repo.set_board_retention(strict_board, 7).await;
        repo.set_board_retention(keep_forever_board, 0).await;

        for board_id in [strict_board, keep_forever_board, default_board] {
            assert!(repo.append_entry(entry(board_id, 30)).await.is_ok());
        }

        // Global window of 90 days: only the strict board's entry expires.
        let deleted = repo.sweep_expired(Some(90), Utc::now()).await;
        assert!(matches!(deleted, Ok(1)));
        let deleted_again = repo.sweep_expired(Some(90), Utc::now()).await;
        assert!(matches!(deleted_again, Ok(0)));
    }

    #[tokio::test]
    async fn no_global_window_means_entries_never_expire_by_default() {
        let repo = InMemoryAuditRepository::new();
        let board_id = BoardId::new();
        assert!(repo.append_entry(entry(board_id, 3650)).await.is_ok());

        let deleted = repo.sweep_expired(None, Utc::now()).await;
        assert!(matches!(deleted, Ok(0)));
    }
}
