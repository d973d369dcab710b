use std::sync::Arc;

use corkboard_domain::{ChangeEnvelope, ChangeOp};
use serde_json::Value;
use tracing::warn;

use crate::{ChangePublisher, ScopeResolver};

/// Wraps committed data-layer mutations into scoped change envelopes.
///
/// Emission is strictly best-effort: scope resolution or publish problems are
/// logged and swallowed, because data-layer correctness must never depend on
/// realtime fan-out succeeding.
#[derive(Clone)]
pub struct ChangeEventEmitter {
    scope_resolver: ScopeResolver,
    publisher: Arc<dyn ChangePublisher>,
}

impl ChangeEventEmitter {
    /// Creates an emitter over a scope resolver and a publisher.
    #[must_use]
    pub fn new(scope_resolver: ScopeResolver, publisher: Arc<dyn ChangePublisher>) -> Self {
        Self {
            scope_resolver,
            publisher,
        }
    }

    /// Emits a change event for one committed mutation.
    ///
    /// Scope is resolved from the new row for inserts and updates and from
    /// the old row for deletes, so a card moved across boards lands in the
    /// destination board's channel while a delete resolves against the state
    /// that existed.
    pub async fn emit(
        &self,
        table: &str,
        op: ChangeOp,
        new_row: Option<Value>,
        old_row: Option<Value>,
    ) {
        let scope_row = match op {
            ChangeOp::Insert | ChangeOp::Update => new_row.as_ref(),
            ChangeOp::Delete => old_row.as_ref(),
        };

        let Some(scope_row) = scope_row else {
            warn!(table, op = op.as_str(), "change event carries no row for its operation; dropped");
            return;
        };

        let board_id = match self.scope_resolver.resolve_board_id(table, scope_row).await {
            Ok(board_id) => board_id,
            Err(error) => {
                warn!(table, op = op.as_str(), error = %error, "board scope resolution failed; event dropped");
                return;
            }
        };

        let workspace_id = match self
            .scope_resolver
            .resolve_workspace_id(table, scope_row)
            .await
        {
            Ok(workspace_id) => workspace_id,
            Err(error) => {
                warn!(table, op = op.as_str(), error = %error, "workspace scope resolution failed; event dropped");
                return;
            }
        };

        if board_id.is_none() && workspace_id.is_none() && !is_membership_table(table) {
            warn!(table, op = op.as_str(), "row has no discoverable scope; event dropped");
            return;
        }

        self.publisher.publish(ChangeEnvelope {
            table: table.to_owned(),
            op,
            board_id,
            workspace_id,
            new: new_row,
            old: old_row,
        });
    }
}

/// Tables whose rows are about a specific user and additionally route to that
/// user's self-scoped subscriptions.
#[must_use]
pub(crate) fn is_membership_table(table: &str) -> bool {
    matches!(table, "board_members" | "workspace_members")
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use corkboard_core::{AppResult, BoardId, WorkspaceId};
    use corkboard_domain::{ChangeEnvelope, ChangeOp};
    use serde_json::json;
    use uuid::Uuid;

    use crate::{ChangePublisher, ScopeRepository, ScopeResolver};

    use super::ChangeEventEmitter;

    #[derive(Default)]
    struct CapturingPublisher {
        envelopes: Mutex<Vec<ChangeEnvelope>>,
    }

    impl ChangePublisher for CapturingPublisher {
        fn publish(&self, envelope: ChangeEnvelope) {
            if let Ok(mut envelopes) = self.envelopes.lock() {
                envelopes.push(envelope);
            }
        }
    }

    struct TwoBoardScopeRepository {
        source_column: Uuid,
        source_board: BoardId,
        destination_column: Uuid,
        destination_board: BoardId,
        workspace: WorkspaceId,
    }

    #[async_trait]
    impl ScopeRepository for TwoBoardScopeRepository {
        async fn board_workspace_id(&self, _board_id: BoardId) -> AppResult<Option<WorkspaceId>> {
            Ok(Some(self.workspace))
        }

        async fn column_board_id(&self, column_id: Uuid) -> AppResult<Option<BoardId>> {
            if column_id == self.source_column {
                Ok(Some(self.source_board))
            } else if column_id == self.destination_column {
                Ok(Some(self.destination_board))
            } else {
                Ok(None)
            }
        }

        async fn card_column_id(&self, _card_id: Uuid) -> AppResult<Option<Uuid>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn cross_board_card_move_publishes_one_envelope_in_the_destination() {
        let repository = Arc::new(TwoBoardScopeRepository {
            source_column: Uuid::new_v4(),
            source_board: BoardId::new(),
            destination_column: Uuid::new_v4(),
            destination_board: BoardId::new(),
            workspace: WorkspaceId::new(),
        });
        let publisher = Arc::new(CapturingPublisher::default());
        let emitter = ChangeEventEmitter::new(
            ScopeResolver::new(repository.clone()),
            publisher.clone(),
        );

        let card_id = Uuid::new_v4().to_string();
        let old_row = json!({"id": card_id, "column_id": repository.source_column.to_string()});
        let new_row = json!({"id": card_id, "column_id": repository.destination_column.to_string()});

        emitter
            .emit("cards", ChangeOp::Update, Some(new_row), Some(old_row))
            .await;

        let envelopes = publisher.envelopes.lock().unwrap_or_else(|p| p.into_inner());
        assert_eq!(envelopes.len(), 1);
        assert_eq!(envelopes[0].board_id, Some(repository.destination_board));
    }

    #[tokio::test]
    async fn delete_resolves_scope_from_the_old_row() {
        let repository = Arc::new(TwoBoardScopeRepository {
            source_column: Uuid::new_v4(),
            source_board: BoardId::new(),
            destination_column: Uuid::new_v4(),
            destination_board: BoardId::new(),
            workspace: WorkspaceId::new(),
        });
        let publisher = Arc::new(CapturingPublisher::default());
        let emitter = ChangeEventEmitter::new(
            ScopeResolver::new(repository.clone()),
            publisher.clone(),
        );

        let old_row = json!({"id": Uuid::new_v4().to_string(), "column_id": repository.source_column.to_string()});
        emitter.emit("cards", ChangeOp::Delete, None, Some(old_row)).await;

        let envelopes = publisher.envelopes.lock().unwrap_or_else(|p| p.into_inner());
        assert_eq!(envelopes.len(), 1);
        assert_eq!(envelopes[0].board_id, Some(repository.source_board));
        assert!(envelopes[0].new.is_none());
    }

    #[tokio::test]
    async fn unresolvable_scope_drops_the_event_silently() {
        let repository = Arc::new(TwoBoardScopeRepository {
            source_column: Uuid::new_v4(),
            source_board: BoardId::new(),
            destination_column: Uuid::new_v4(),
            destination_board: BoardId::new(),
            workspace: WorkspaceId::new(),
        });
        let publisher = Arc::new(CapturingPublisher::default());
        let emitter = ChangeEventEmitter::new(ScopeResolver::new(repository), publisher.clone());

        let orphan = json!({"id": Uuid::new_v4().to_string(), "column_id": Uuid::new_v4().to_string()});
        emitter.emit("cards", ChangeOp::Insert, Some(orphan), None).await;

        let envelopes = publisher.envelopes.lock().unwrap_or_else(|p| p.into_inner());
        assert!(envelopes.is_empty());
    }
}
