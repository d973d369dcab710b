use std::sync::Arc;

use chrono::Utc;
use corkboard_core::{AppResult, BoardId, Principal};
use corkboard_domain::{Capability, MembershipAuditEntry};
use tracing::info;

use crate::{AuditQuery, AuditRepository, PermissionService};

/// Application service for reading and pruning the membership audit log.
///
/// The log is append-only; this service never writes entries (mutating
/// services append their own) and the retention sweep is the only deleter.
#[derive(Clone)]
pub struct AuditService {
    permissions: PermissionService,
    audit: Arc<dyn AuditRepository>,
}

impl AuditService {
    /// Creates an audit service from its collaborators.
    #[must_use]
    pub fn new(permissions: PermissionService, audit: Arc<dyn AuditRepository>) -> Self {
        Self { permissions, audit }
    }

    /// Lists a board's newest audit entries.
    ///
    /// Paging is clamped here so every repository implementation serves the
    /// same window.
    pub async fn list_board_entries(
        &self,
        actor: Principal,
        board_id: BoardId,
        query: AuditQuery,
    ) -> AppResult<Vec<MembershipAuditEntry>> {
        self.permissions
            .require(actor, Capability::BoardMembersView, Some(board_id))
            .await?;

        self.audit.list_board_entries(board_id, query.clamped()).await
    }

    /// Deletes entries past their retention window.
    ///
    /// Runs on an independent schedule, takes no hot-path locks, and is
    /// idempotent: re-running with nothing expired deletes zero rows.
    /// `None` means entries never expire globally; per-board settings
    /// override the global window either way.
    pub async fn sweep_expired(&self, global_max_age_days: Option<u32>) -> AppResult<u64> {
        let deleted = self
            .audit
            .sweep_expired(global_max_age_days, Utc::now())
            .await?;

        if deleted > 0 {
            info!(deleted, "audit retention sweep removed expired entries");
        }

        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use corkboard_core::{AppResult, BoardId, Principal, UserId};
    use corkboard_domain::{
        BoardMembership, Capability, CustomRole, CustomRoleAssignment, LegacyRole,
        MembershipAuditEntry,
    };

    use crate::{
        AuditQuery, AuditRepository, CustomRoleRepository, MembershipRepository, PermissionService,
    };

    use super::AuditService;

    struct NoMemberships;

    #[async_trait]
    impl MembershipRepository for NoMemberships {
        async fn find_membership(
            &self,
            _board_id: BoardId,
            _user_id: UserId,
        ) -> AppResult<Option<BoardMembership>> {
            Ok(None)
        }

        async fn insert_membership(&self, _membership: BoardMembership) -> AppResult<()> {
            Ok(())
        }

        async fn delete_membership(
            &self,
            _board_id: BoardId,
            _user_id: UserId,
        ) -> AppResult<Option<BoardMembership>> {
            Ok(None)
        }

        async fn update_membership_role(
            &self,
            _board_id: BoardId,
            _user_id: UserId,
            _role: LegacyRole,
        ) -> AppResult<Option<LegacyRole>> {
            Ok(None)
        }

        async fn list_board_memberships(
            &self,
            _board_id: BoardId,
        ) -> AppResult<Vec<BoardMembership>> {
            Ok(Vec::new())
        }
    }

    struct NoCustomRoles;

    #[async_trait]
    impl CustomRoleRepository for NoCustomRoles {
        async fn create_custom_role(&self, _role: CustomRole) -> AppResult<()> {
            Ok(())
        }

        async fn assign_custom_role(&self, _assignment: CustomRoleAssignment) -> AppResult<()> {
            Ok(())
        }

        async fn unassign_custom_role(
            &self,
            _assignment: CustomRoleAssignment,
        ) -> AppResult<bool> {
            Ok(false)
        }

        async fn assigned_capabilities(
            &self,
            _board_id: BoardId,
            _user_id: UserId,
        ) -> AppResult<BTreeSet<Capability>> {
            Ok(BTreeSet::new())
        }
    }

    #[derive(Default)]
    struct RecordingAuditRepository {
        queries: Mutex<Vec<AuditQuery>>,
    }

    #[async_trait]
    impl AuditRepository for RecordingAuditRepository {
        async fn append_entry(&self, _entry: MembershipAuditEntry) -> AppResult<()> {
            Ok(())
        }

        async fn list_board_entries(
            &self,
            _board_id: BoardId,
            query: AuditQuery,
        ) -> AppResult<Vec<MembershipAuditEntry>> {
            if let Ok(mut queries) = self.queries.lock() {
                queries.push(query);
            }
            Ok(Vec::new())
        }

        async fn sweep_expired(
            &self,
            _global_max_age_days: Option<u32>,
            _now: DateTime<Utc>,
        ) -> AppResult<u64> {
            Ok(0)
        }
    }

    fn service() -> (AuditService, Arc<RecordingAuditRepository>) {
        let audit = Arc::new(RecordingAuditRepository::default());
        let permissions =
            PermissionService::new(Arc::new(NoMemberships), Arc::new(NoCustomRoles));

        (AuditService::new(permissions, audit.clone()), audit)
    }

    #[tokio::test]
    async fn out_of_range_paging_is_clamped_before_the_repository() {
        let (service, audit) = service();
        let admin = Principal::new(UserId::new(), true);
        let board_id = BoardId::new();

        for (limit, offset) in [(0, 0), (10_000, 1_000_000)] {
            let listed = service
                .list_board_entries(admin, board_id, AuditQuery { limit, offset })
                .await;
            assert!(listed.is_ok());
        }

        let queries = audit.queries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        assert_eq!(queries.len(), 2);
        assert_eq!((queries[0].limit, queries[0].offset), (1, 0));
        assert_eq!((queries[1].limit, queries[1].offset), (200, 5_000));
    }

    #[tokio::test]
    async fn default_paging_passes_through_unchanged() {
        let (service, audit) = service();
        let admin = Principal::new(UserId::new(), true);

        let listed = service
            .list_board_entries(admin, BoardId::new(), AuditQuery::default())
            .await;
        assert!(listed.is_ok());

        let queries = audit.queries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        assert_eq!((queries[0].limit, queries[0].offset), (50, 0));
    }
}
