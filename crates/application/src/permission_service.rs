use std::collections::BTreeSet;
use std::sync::Arc;

use corkboard_core::{AppError, AppResult, BoardId, Principal};
use corkboard_domain::Capability;

use crate::{CustomRoleRepository, MembershipRepository};

/// Resolves a principal's effective capabilities from all grant sources.
///
/// Resolution is deterministic and read-only; tiers are consulted in a fixed
/// order and the first matching tier wins. Unknown boards and missing
/// memberships resolve to denial, never to an error.
#[derive(Clone)]
pub struct PermissionService {
    memberships: Arc<dyn MembershipRepository>,
    custom_roles: Arc<dyn CustomRoleRepository>,
}

impl PermissionService {
    /// Creates a permission service from repository implementations.
    #[must_use]
    pub fn new(
        memberships: Arc<dyn MembershipRepository>,
        custom_roles: Arc<dyn CustomRoleRepository>,
    ) -> Self {
        Self {
            memberships,
            custom_roles,
        }
    }

    /// Returns whether the principal holds the capability.
    ///
    /// Tier order: global admin override, `app.*` namespace gate, board
    /// context gate, custom role assignment union, legacy role table.
    pub async fn resolve(
        &self,
        principal: Principal,
        capability: Capability,
        board_id: Option<BoardId>,
    ) -> AppResult<bool> {
        if principal.is_global_admin() {
            return Ok(true);
        }

        if capability.is_app_scoped() {
            return Ok(false);
        }

        let Some(board_id) = board_id else {
            return Ok(false);
        };

        let assigned = self
            .custom_roles
            .assigned_capabilities(board_id, principal.user_id())
            .await?;
        if assigned.contains(&capability) {
            return Ok(true);
        }

        let membership = self
            .memberships
            .find_membership(board_id, principal.user_id())
            .await?;

        Ok(membership.is_some_and(|membership| membership.role.grants(capability)))
    }

    /// Returns the full capability set granted to the principal.
    ///
    /// Evaluates the custom-role and legacy tiers once and unions them; the
    /// result is identical to calling [`Self::resolve`] for every key in the
    /// closed vocabulary.
    pub async fn resolve_all(
        &self,
        principal: Principal,
        board_id: Option<BoardId>,
    ) -> AppResult<BTreeSet<Capability>> {
        if principal.is_global_admin() {
            return Ok(Capability::all().iter().copied().collect());
        }

        let Some(board_id) = board_id else {
            return Ok(BTreeSet::new());
        };

        let mut granted = self
            .custom_roles
            .assigned_capabilities(board_id, principal.user_id())
            .await?;

        if let Some(membership) = self
            .memberships
            .find_membership(board_id, principal.user_id())
            .await?
        {
            granted.extend(membership.role.capabilities());
        }

        granted.retain(|capability| !capability.is_app_scoped());

        Ok(granted)
    }

    /// Ensures the principal holds the capability, failing with an
    /// authorization error otherwise.
    pub async fn require(
        &self,
        principal: Principal,
        capability: Capability,
        board_id: Option<BoardId>,
    ) -> AppResult<()> {
        if self.resolve(principal, capability, board_id).await? {
            return Ok(());
        }

        Err(AppError::Forbidden(format!(
            "user '{}' is missing capability '{}'{}",
            principal.user_id(),
            capability.as_str(),
            board_id
                .map(|board_id| format!(" on board '{board_id}'"))
                .unwrap_or_default()
        )))
    }
}
