use corkboard_core::{BoardId, UserId, WorkspaceId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of committed mutation a change event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeOp {
    /// Row inserted; only the new row is present.
    Insert,
    /// Row updated; both old and new rows are present.
    Update,
    /// Row deleted; only the old row is present.
    Delete,
}

impl ChangeOp {
    /// Returns a stable wire value for this operation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

/// Normalized change-event payload handed to the distribution layer.
///
/// Rows are raw data-layer values because the emitter accepts mutations on
/// arbitrary tables; scope ids are attached during emission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEnvelope {
    /// Mutated table name.
    pub table: String,
    /// Mutation kind.
    pub op: ChangeOp,
    /// Owning board, when resolvable.
    pub board_id: Option<BoardId>,
    /// Owning workspace, when resolvable.
    pub workspace_id: Option<WorkspaceId>,
    /// Row state after the mutation.
    pub new: Option<Value>,
    /// Row state before the mutation.
    pub old: Option<Value>,
}

/// Scope of one live subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum SubscriptionScope {
    /// All events on one board.
    Board(BoardId),
    /// Board-level events across one workspace.
    Workspace(WorkspaceId),
    /// Events about the connected user, delivered regardless of board access.
    User(UserId),
}
