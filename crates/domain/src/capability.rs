use std::str::FromStr;

use corkboard_core::AppError;
use serde::{Deserialize, Serialize};

/// Capabilities enforced by permission resolution.
///
/// The vocabulary is closed and partitioned into two namespaces: `app.*`
/// capabilities are global and only ever granted to global admins, everything
/// else is evaluated against a board in context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Allows managing application-wide settings.
    AppSettingsManage,
    /// Allows managing application-wide user accounts.
    AppUsersManage,
    /// Allows viewing a board and its cards.
    BoardView,
    /// Allows editing board name and description.
    BoardEdit,
    /// Allows deleting a board.
    BoardDelete,
    /// Allows changing destructive board settings.
    BoardSettingsManage,
    /// Allows viewing the board member list.
    BoardMembersView,
    /// Allows adding, removing, and re-roling board members.
    BoardMembersManage,
    /// Allows creating and revoking board invite links.
    BoardInvitesManage,
    /// Allows creating, reordering, and deleting columns.
    ColumnManage,
    /// Allows creating cards.
    CardCreate,
    /// Allows editing card contents.
    CardEdit,
    /// Allows moving cards between columns.
    CardMove,
    /// Allows deleting cards.
    CardDelete,
    /// Allows writing card comments.
    CommentWrite,
    /// Allows managing board labels.
    LabelManage,
    /// Allows viewing card attachments.
    AttachmentView,
    /// Allows downloading card attachments.
    AttachmentDownload,
    /// Allows adding and removing card attachments.
    AttachmentManage,
    /// Allows viewing card subtasks.
    SubtaskView,
    /// Allows managing card subtasks.
    SubtaskManage,
}

impl Capability {
    /// Returns a stable storage value for this capability.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AppSettingsManage => "app.settings.manage",
            Self::AppUsersManage => "app.users.manage",
            Self::BoardView => "board.view",
            Self::BoardEdit => "board.edit",
            Self::BoardDelete => "board.delete",
            Self::BoardSettingsManage => "board.settings.manage",
            Self::BoardMembersView => "board.members.view",
            Self::BoardMembersManage => "board.members.manage",
            Self::BoardInvitesManage => "board.invites.manage",
            Self::ColumnManage => "column.manage",
            Self::CardCreate => "card.create",
            Self::CardEdit => "card.edit",
            Self::CardMove => "card.move",
            Self::CardDelete => "card.delete",
            Self::CommentWrite => "comment.write",
            Self::LabelManage => "label.manage",
            Self::AttachmentView => "attachment.view",
            Self::AttachmentDownload => "attachment.download",
            Self::AttachmentManage => "attachment.manage",
            Self::SubtaskView => "subtask.view",
            Self::SubtaskManage => "subtask.manage",
        }
    }

    /// Returns the full closed vocabulary.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[Capability] = &[
            Capability::AppSettingsManage,
            Capability::AppUsersManage,
            Capability::BoardView,
            Capability::BoardEdit,
            Capability::BoardDelete,
            Capability::BoardSettingsManage,
            Capability::BoardMembersView,
            Capability::BoardMembersManage,
            Capability::BoardInvitesManage,
            Capability::ColumnManage,
            Capability::CardCreate,
            Capability::CardEdit,
            Capability::CardMove,
            Capability::CardDelete,
            Capability::CommentWrite,
            Capability::LabelManage,
            Capability::AttachmentView,
            Capability::AttachmentDownload,
            Capability::AttachmentManage,
            Capability::SubtaskView,
            Capability::SubtaskManage,
        ];

        ALL
    }

    /// Returns whether the capability belongs to the global `app.*` namespace.
    #[must_use]
    pub fn is_app_scoped(&self) -> bool {
        matches!(self, Self::AppSettingsManage | Self::AppUsersManage)
    }

    /// Returns every capability evaluated against a board in context.
    pub fn board_scoped() -> impl Iterator<Item = Self> {
        Self::all()
            .iter()
            .copied()
            .filter(|capability| !capability.is_app_scoped())
    }
}

impl FromStr for Capability {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .find(|capability| capability.as_str() == value)
            .copied()
            .ok_or_else(|| AppError::Validation(format!("unknown capability value '{value}'")))
    }
}
