use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use corkboard_application::CustomRoleRepository;
use corkboard_core::{AppError, AppResult, BoardId, CustomRoleId, UserId};
use corkboard_domain::{Capability, CustomRole, CustomRoleAssignment};
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    roles: HashMap<CustomRoleId, CustomRole>,
    assignments: Vec<CustomRoleAssignment>,
}

/// In-memory custom role store for tests and local development.
#[derive(Default)]
pub struct InMemoryCustomRoleRepository {
    state: RwLock<State>,
}

impl InMemoryCustomRoleRepository {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CustomRoleRepository for InMemoryCustomRoleRepository {
    async fn create_custom_role(&self, role: CustomRole) -> AppResult<()> {
        let mut state = self.state.write().await;
        if state.roles.contains_key(&role.id) {
            return Err(AppError::Conflict(format!(
                "custom role {} already exists",
                role.id
            )));
        }

        state.roles.insert(role.id, role);
        Ok(())
    }

    async fn assign_custom_role(&self, assignment: CustomRoleAssignment) -> AppResult<()> {
        let mut state = self.state.write().await;
        if !state.roles.contains_key(&assignment.custom_role_id) {
            return Err(AppError::NotFound(format!(
                "custom role {} does not exist",
                assignment.custom_role_id
            )));
        }

        if !state.assignments.contains(&assignment) {
            state.assignments.push(assignment);
        }
        Ok(())
    }

    async fn unassign_custom_role(&self, assignment: CustomRoleAssignment) -> AppResult<bool> {
        let mut state = self.state.write().await;
        let before = state.assignments.len();
        state.assignments.retain(|existing| *existing != assignment);
        Ok(state.assignments.len() < before)
    }

    async fn assigned_capabilities(
        &self,
        board_id: BoardId,
        user_id: UserId,
    ) -> AppResult<BTreeSet<Capability>> {
        let state = self.state.read().await;
        let mut capabilities = BTreeSet::new();
        for assignment in state
            .assignments
            .iter()
            .filter(|assignment| assignment.board_id == board_id && assignment.user_id == user_id)
        {
            if let Some(role) = state.roles.get(&assignment.custom_role_id) {
                capabilities.extend(role.capabilities.iter().copied());
            }
        }

        Ok(capabilities)
    }
}
