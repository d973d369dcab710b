use std::sync::Arc;

use corkboard_core::{AppResult, BoardId, WorkspaceId};
use serde_json::Value;
use uuid::Uuid;

use crate::ScopeRepository;

/// Determines the owning board and workspace for a raw table row.
///
/// The schema is shallow and fixed, so resolution is a per-table lookup
/// rather than a generic graph walk. Rows are accepted in both the storage
/// spelling (`board_id`) and the model spelling (`boardId`) of every field.
#[derive(Clone)]
pub struct ScopeResolver {
    repository: Arc<dyn ScopeRepository>,
}

impl ScopeResolver {
    /// Creates a resolver over a scope repository.
    #[must_use]
    pub fn new(repository: Arc<dyn ScopeRepository>) -> Self {
        Self { repository }
    }

    /// Resolves the board owning a row, if any.
    ///
    /// A row already carrying a board id short-circuits the lookup. A missing
    /// parent yields `None`; the parent may have been deleted in the same
    /// transaction.
    pub async fn resolve_board_id(&self, table: &str, row: &Value) -> AppResult<Option<BoardId>> {
        if let Some(board_id) = uuid_field(row, "board_id") {
            return Ok(Some(BoardId::from_uuid(board_id)));
        }

        match table {
            "boards" => Ok(uuid_field(row, "id").map(BoardId::from_uuid)),
            "cards" => {
                let Some(column_id) = uuid_field(row, "column_id") else {
                    return Ok(None);
                };
                self.repository.column_board_id(column_id).await
            }
            table if table.starts_with("card_") => {
                let Some(card_id) = uuid_field(row, "card_id") else {
                    return Ok(None);
                };
                let Some(column_id) = self.repository.card_column_id(card_id).await? else {
                    return Ok(None);
                };
                self.repository.column_board_id(column_id).await
            }
            _ => Ok(None),
        }
    }

    /// Resolves the workspace owning a row, if any.
    pub async fn resolve_workspace_id(
        &self,
        table: &str,
        row: &Value,
    ) -> AppResult<Option<WorkspaceId>> {
        if let Some(workspace_id) = uuid_field(row, "workspace_id") {
            return Ok(Some(WorkspaceId::from_uuid(workspace_id)));
        }

        if table == "workspaces" {
            return Ok(uuid_field(row, "id").map(WorkspaceId::from_uuid));
        }

        let Some(board_id) = self.resolve_board_id(table, row).await? else {
            return Ok(None);
        };

        self.repository.board_workspace_id(board_id).await
    }
}

/// Reads a UUID field accepting both snake_case and camelCase spellings.
fn uuid_field(row: &Value, snake_name: &str) -> Option<Uuid> {
    let value = row
        .get(snake_name)
        .or_else(|| row.get(camel_case(snake_name)))?;

    value.as_str().and_then(|text| Uuid::parse_str(text).ok())
}

fn camel_case(snake_name: &str) -> String {
    let mut result = String::with_capacity(snake_name.len());
    let mut upper_next = false;

    for character in snake_name.chars() {
        if character == '_' {
            upper_next = true;
        } else if upper_next {
            result.extend(character.to_uppercase());
            upper_next = false;
        } else {
            result.push(character);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use corkboard_core::{AppResult, BoardId, WorkspaceId};
    use serde_json::json;
    use uuid::Uuid;

    use crate::ScopeRepository;

    use super::ScopeResolver;

    struct FakeScopeRepository {
        board_id: BoardId,
        workspace_id: WorkspaceId,
        column_id: Uuid,
        card_id: Uuid,
        lookups: AtomicUsize,
    }

    impl FakeScopeRepository {
        fn new() -> Self {
            Self {
                board_id: BoardId::new(),
                workspace_id: WorkspaceId::new(),
                column_id: Uuid::new_v4(),
                card_id: Uuid::new_v4(),
                lookups: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ScopeRepository for FakeScopeRepository {
        async fn board_workspace_id(&self, board_id: BoardId) -> AppResult<Option<WorkspaceId>> {
            self.lookups.fetch_add(1, Ordering::Relaxed);
            Ok((board_id == self.board_id).then_some(self.workspace_id))
        }

        async fn column_board_id(&self, column_id: Uuid) -> AppResult<Option<BoardId>> {
            self.lookups.fetch_add(1, Ordering::Relaxed);
            Ok((column_id == self.column_id).then_some(self.board_id))
        }

        async fn card_column_id(&self, card_id: Uuid) -> AppResult<Option<Uuid>> {
            self.lookups.fetch_add(1, Ordering::Relaxed);
            Ok((card_id == self.card_id).then_some(self.column_id))
        }
    }

    #[tokio::test]
    async fn board_row_resolves_to_its_own_id() {
        let repository = Arc::new(FakeScopeRepository::new());
        let resolver = ScopeResolver::new(repository.clone());

        let board_uuid = repository.board_id.as_uuid();
        let row = json!({"id": board_uuid.to_string(), "workspace_id": repository.workspace_id.as_uuid().to_string()});

        let board = resolver.resolve_board_id("boards", &row).await;
        assert!(board.is_ok());
        assert_eq!(board.unwrap_or(None), Some(repository.board_id));

        let workspace = resolver.resolve_workspace_id("boards", &row).await;
        assert!(workspace.is_ok());
        assert_eq!(workspace.unwrap_or(None), Some(repository.workspace_id));
    }

    #[tokio::test]
    async fn camel_case_model_rows_are_accepted() {
        let repository = Arc::new(FakeScopeRepository::new());
        let resolver = ScopeResolver::new(repository.clone());

        let row = json!({"cardId": repository.card_id.to_string()});
        let board = resolver.resolve_board_id("card_comments", &row).await;
        assert!(board.is_ok());
        assert_eq!(board.unwrap_or(None), Some(repository.board_id));
    }

    #[tokio::test]
    async fn explicit_board_id_short_circuits_the_hops() {
        let repository = Arc::new(FakeScopeRepository::new());
        let resolver = ScopeResolver::new(repository.clone());

        let row = json!({
            "card_id": repository.card_id.to_string(),
            "board_id": repository.board_id.as_uuid().to_string(),
        });
        let board = resolver.resolve_board_id("card_comments", &row).await;
        assert!(board.is_ok());
        assert_eq!(board.unwrap_or(None), Some(repository.board_id));
        assert_eq!(repository.lookups.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn card_column_and_board_rows_share_one_workspace() {
        let repository = Arc::new(FakeScopeRepository::new());
        let resolver = ScopeResolver::new(repository.clone());

        let card_row = json!({"id": repository.card_id.to_string(), "column_id": repository.column_id.to_string()});
        let column_row = json!({"id": repository.column_id.to_string(), "board_id": repository.board_id.as_uuid().to_string()});
        let board_row = json!({"id": repository.board_id.as_uuid().to_string()});

        let from_card = resolver.resolve_workspace_id("cards", &card_row).await;
        let from_column = resolver.resolve_workspace_id("columns", &column_row).await;
        let from_board = resolver.resolve_workspace_id("boards", &board_row).await;

        assert!(from_card.is_ok() && from_column.is_ok() && from_board.is_ok());
        assert_eq!(from_card.unwrap_or(None), Some(repository.workspace_id));
        assert_eq!(from_column.unwrap_or(None), Some(repository.workspace_id));
        assert_eq!(from_board.unwrap_or(None), Some(repository.workspace_id));
    }

    #[tokio::test]
    async fn missing_parent_yields_none_not_an_error() {
        let repository = Arc::new(FakeScopeRepository::new());
        let resolver = ScopeResolver::new(repository);

        let orphan_row = json!({"card_id": Uuid::new_v4().to_string()});
        let board = resolver.resolve_board_id("card_subtasks", &orphan_row).await;
        assert!(board.is_ok());
        assert_eq!(board.unwrap_or(Some(BoardId::new())), None);
    }

    #[tokio::test]
    async fn workspace_tables_carry_no_board() {
        let repository = Arc::new(FakeScopeRepository::new());
        let resolver = ScopeResolver::new(repository.clone());

        let row = json!({"id": repository.workspace_id.as_uuid().to_string()});
        let board = resolver.resolve_board_id("workspaces", &row).await;
        assert!(board.is_ok());
        assert_eq!(board.unwrap_or(Some(BoardId::new())), None);

        let workspace = resolver.resolve_workspace_id("workspaces", &row).await;
        assert!(workspace.is_ok());
        assert_eq!(workspace.unwrap_or(None), Some(repository.workspace_id));
    }
}
