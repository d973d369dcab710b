use std::collections::HashMap;

use async_trait::async_trait;
use corkboard_application::ScopeRepository;
use corkboard_core::{AppResult, BoardId, WorkspaceId};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct State {
    boards: HashMap<BoardId, WorkspaceId>,
    columns: HashMap<Uuid, BoardId>,
    cards: HashMap<Uuid, Uuid>,
}

/// In-memory ownership graph for tests and local development.
///
/// Rows are seeded through the `insert_*` helpers; there is no cascade, a
/// deleted parent simply leaves dangling children whose lookups return `None`.
#[derive(Default)]
pub struct InMemoryScopeRepository {
    state: RwLock<State>,
}

impl InMemoryScopeRepository {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a board and its owning workspace.
    pub async fn insert_board(&self, board_id: BoardId, workspace_id: WorkspaceId) {
        self.state.write().await.boards.insert(board_id, workspace_id);
    }

    /// Records a column and its owning board.
    pub async fn insert_column(&self, column_id: Uuid, board_id: BoardId) {
        self.state.write().await.columns.insert(column_id, board_id);
    }

    /// Records a card and its owning column.
    pub async fn insert_card(&self, card_id: Uuid, column_id: Uuid) {
        self.state.write().await.cards.insert(card_id, column_id);
    }
}

#[async_trait]
impl ScopeRepository for InMemoryScopeRepository {
    async fn board_workspace_id(&self, board_id: BoardId) -> AppResult<Option<WorkspaceId>> {
        Ok(self.state.read().await.boards.get(&board_id).copied())
    }

    async fn column_board_id(&self, column_id: Uuid) -> AppResult<Option<BoardId>> {
        Ok(self.state.read().await.columns.get(&column_id).copied())
    }

    async fn card_column_id(&self, card_id: Uuid) -> AppResult<Option<Uuid>> {
        Ok(self.state.read().await.cards.get(&card_id).copied())
    }
}

#[cfg(test)]
mod tests {
    use corkboard_application::ScopeRepository;
    use corkboard_core::{BoardId, WorkspaceId};
    use uuid::Uuid;

    use super::InMemoryScopeRepository;

    #[tokio::test]
    async fn card_chain_walks_up_to_the_board() {
        let repo = InMemoryScopeRepository::new();
        let workspace_id = WorkspaceId::new();
        let board_id = BoardId::new();
        let column_id = Uuid::new_v4();
        let card_id = Uuid::new_v4();

        repo.insert_board(board_id, workspace_id).await;
        repo.insert_column(column_id, board_id).await;
        repo.insert_card(card_id, column_id).await;

        let column = repo.card_column_id(card_id).await;
        assert!(matches!(column, Ok(Some(id)) if id == column_id));
        let board = repo.column_board_id(column_id).await;
        assert!(matches!(board, Ok(Some(id)) if id == board_id));
        let workspace = repo.board_workspace_id(board_id).await;
        assert!(matches!(workspace, Ok(Some(id)) if id == workspace_id));
    }

    #[tokio::test]
    async fn missing_parent_is_none_not_an_error() {
        let repo = InMemoryScopeRepository::new();
        let lookup = repo.column_board_id(Uuid::new_v4()).await;
        assert!(matches!(lookup, Ok(None)));
    }
}
