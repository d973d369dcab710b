use std::str::FromStr;

use chrono::{DateTime, Utc};
use corkboard_core::{AppError, AppResult, BoardId, UserId};
use serde::{Deserialize, Serialize};

/// Lifetime semantics of an invite link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InviteLinkType {
    /// Redeemable exactly once; transitions unused to used.
    OneTime,
    /// Redeemable any number of times; never marked used.
    Recurring,
}

impl InviteLinkType {
    /// Returns a stable storage value for this link type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneTime => "one_time",
            Self::Recurring => "recurring",
        }
    }
}

impl FromStr for InviteLinkType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "one_time" => Ok(Self::OneTime),
            "recurring" => Ok(Self::Recurring),
            _ => Err(AppError::Validation(format!(
                "unknown invite link type '{value}'"
            ))),
        }
    }
}

/// Persisted invite token state.
///
/// Only the SHA-256 hash of the raw token is stored; the raw value is handed
/// to the creator once and never kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteToken {
    /// SHA-256 hash of the unguessable raw token.
    pub token_hash: String,
    /// Board the invite grants membership on.
    pub board_id: BoardId,
    /// User who created the invite.
    pub created_by: UserId,
    /// One-time or recurring semantics.
    pub link_type: InviteLinkType,
    /// Expiry instant; `None` is allowed only for recurring links.
    pub expires_at: Option<DateTime<Utc>>,
    /// When a one-time token was redeemed.
    pub used_at: Option<DateTime<Utc>>,
    /// Who redeemed a one-time token.
    pub used_by: Option<UserId>,
}

impl InviteToken {
    /// Creates an unused invite token record.
    pub fn new(
        token_hash: impl Into<String>,
        board_id: BoardId,
        created_by: UserId,
        link_type: InviteLinkType,
        expires_at: Option<DateTime<Utc>>,
    ) -> AppResult<Self> {
        if link_type == InviteLinkType::OneTime && expires_at.is_none() {
            return Err(AppError::Validation(
                "one-time invite links require an expiry".to_owned(),
            ));
        }

        Ok(Self {
            token_hash: token_hash.into(),
            board_id,
            created_by,
            link_type,
            expires_at,
            used_at: None,
            used_by: None,
        })
    }

    /// Returns whether the token is expired at the given instant.
    ///
    /// Expiry is evaluated only when set.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    /// Returns whether a one-time token has already been redeemed.
    #[must_use]
    pub fn is_used(&self) -> bool {
        self.used_at.is_some()
    }
}
