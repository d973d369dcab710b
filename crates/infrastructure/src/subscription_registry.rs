use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

use corkboard_application::PermissionService;
use corkboard_core::{BoardId, Principal, SubscriptionId, UserId};
use corkboard_domain::{Capability, ChangeEnvelope, ChangeOp, SubscriptionScope};
use tokio::sync::RwLock;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// One registered live subscriber.
struct Subscriber {
    principal: Principal,
    /// Cached authorization fact established at subscribe time and
    /// invalidated when a membership or custom role grant vanishes.
    /// Snapshots taken for an in-flight broadcast share this flag, so a
    /// revocation also stops deliveries that were snapshotted before it
    /// happened.
    authorized: Arc<AtomicBool>,
    sender: mpsc::UnboundedSender<ChangeEnvelope>,
}

/// Receiving end of one live subscription.
///
/// Dropping the handle closes the channel; the registry prunes the dead
/// registration on the next delivery that touches its scope. Reconnection
/// always creates a new handle, there is no replay or resumption.
pub struct SubscriptionHandle {
    subscription_id: SubscriptionId,
    scope: SubscriptionScope,
    receiver: mpsc::UnboundedReceiver<ChangeEnvelope>,
}

impl SubscriptionHandle {
    /// Returns the registration id, used for explicit unsubscription.
    #[must_use]
    pub fn subscription_id(&self) -> SubscriptionId {
        self.subscription_id
    }

    /// Returns the subscribed scope.
    #[must_use]
    pub fn scope(&self) -> SubscriptionScope {
        self.scope
    }

    /// Receives the next envelope, or `None` once the subscription closed.
    pub async fn recv(&mut self) -> Option<ChangeEnvelope> {
        self.receiver.recv().await
    }

    /// Receives an already-delivered envelope without waiting.
    pub fn try_recv(&mut self) -> Option<ChangeEnvelope> {
        self.receiver.try_recv().ok()
    }

    /// Polls for the next envelope, for stream adapters.
    pub fn poll_recv(&mut self, cx: &mut Context<'_>) -> Poll<Option<ChangeEnvelope>> {
        self.receiver.poll_recv(cx)
    }
}

/// Live subscriber registry keyed by scope.
///
/// The registry is the only shared mutable structure in the distribution
/// layer. Deliveries snapshot the matching registrations under a read lock
/// and push outside it, so a broadcast never blocks new registrations and
/// concurrent removal never invalidates an iteration.
#[derive(Default)]
pub struct SubscriptionRegistry {
    subscribers: RwLock<HashMap<SubscriptionScope, HashMap<SubscriptionId, Subscriber>>>,
    permissions: Option<PermissionService>,
}

impl SubscriptionRegistry {
    /// Creates an empty registry.
    ///
    /// Without a permission service, a custom role removal revokes the
    /// affected user's board registrations outright.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry that re-resolves `board.view` before dropping a
    /// registration whose custom role grant vanished; a subscriber who still
    /// holds access through another tier keeps receiving.
    #[must_use]
    pub fn with_permission_recheck(permissions: PermissionService) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            permissions: Some(permissions),
        }
    }

    /// Registers a live subscription for a principal on a scope.
    ///
    /// Callers are expected to have verified view access for board and
    /// workspace scopes; the registration caches that fact for delivery-time
    /// checks.
    pub async fn subscribe(
        &self,
        principal: Principal,
        scope: SubscriptionScope,
    ) -> SubscriptionHandle {
        let subscription_id = SubscriptionId::new();
        let (sender, receiver) = mpsc::unbounded_channel();

        self.subscribers.write().await.entry(scope).or_default().insert(
            subscription_id,
            Subscriber {
                principal,
                authorized: Arc::new(AtomicBool::new(true)),
                sender,
            },
        );

        SubscriptionHandle {
            subscription_id,
            scope,
            receiver,
        }
    }

    /// Removes a subscription immediately.
    ///
    /// Safe to race against an in-flight delivery; the closed channel simply
    /// stops accepting envelopes.
    pub async fn unsubscribe(&self, scope: SubscriptionScope, subscription_id: SubscriptionId) {
        let mut subscribers = self.subscribers.write().await;
        if let Some(registrations) = subscribers.get_mut(&scope) {
            registrations.remove(&subscription_id);
            if registrations.is_empty() {
                subscribers.remove(&scope);
            }
        }
    }

    /// Returns how many live registrations a scope currently has.
    pub async fn subscriber_count(&self, scope: SubscriptionScope) -> usize {
        self.subscribers
            .read()
            .await
            .get(&scope)
            .map(HashMap::len)
            .unwrap_or(0)
    }

    /// Routes one envelope to every matching live subscription.
    ///
    /// Membership envelopes reach the affected user's self-scoped
    /// subscription before anything else, and a membership removal revokes
    /// that user's board registrations before the board fan-out runs. This is
    /// what lets a just-removed member observe their own removal and nothing
    /// after it. A custom role assignment removal re-checks the affected
    /// user's board registrations the same way; subscribe-time access is
    /// never trusted past the grant that justified it.
    pub async fn deliver(&self, envelope: ChangeEnvelope) {
        let affected_user = membership_row_user(&envelope);

        if let Some(user_id) = affected_user {
            self.fan_out(SubscriptionScope::User(user_id), &envelope).await;

            if envelope.op == ChangeOp::Delete
                && let Some(board_id) = envelope.board_id
            {
                self.revoke_board_access(board_id, user_id).await;
            }
        }

        if envelope.table == "custom_role_assignments"
            && envelope.op == ChangeOp::Delete
            && let Some(board_id) = envelope.board_id
            && let Some(user_id) = row_user(&envelope)
        {
            self.recheck_board_access(board_id, user_id).await;
        }

        if let Some(board_id) = envelope.board_id {
            self.fan_out(SubscriptionScope::Board(board_id), &envelope).await;
        }

        if let Some(workspace_id) = envelope.workspace_id {
            self.fan_out(SubscriptionScope::Workspace(workspace_id), &envelope)
                .await;
        }
    }

    async fn fan_out(&self, scope: SubscriptionScope, envelope: &ChangeEnvelope) {
        let snapshot: Vec<(SubscriptionId, Arc<AtomicBool>, mpsc::UnboundedSender<ChangeEnvelope>)> = {
            let subscribers = self.subscribers.read().await;
            let Some(registrations) = subscribers.get(&scope) else {
                return;
            };

            registrations
                .iter()
                .map(|(subscription_id, subscriber)| {
                    (
                        *subscription_id,
                        subscriber.authorized.clone(),
                        subscriber.sender.clone(),
                    )
                })
                .collect()
        };

        let mut dead = Vec::new();
        for (subscription_id, authorized, sender) in snapshot {
            if !authorized.load(Ordering::Acquire) {
                continue;
            }

            if sender.send(envelope.clone()).is_err() {
                dead.push(subscription_id);
            }
        }

        if dead.is_empty() {
            return;
        }

        debug!(count = dead.len(), "pruning subscriptions with closed receivers");
        let mut subscribers = self.subscribers.write().await;
        if let Some(registrations) = subscribers.get_mut(&scope) {
            for subscription_id in dead {
                registrations.remove(&subscription_id);
            }
            if registrations.is_empty() {
                subscribers.remove(&scope);
            }
        }
    }

    /// Re-evaluates a user's board registrations after a custom role
    /// assignment was removed.
    ///
    /// The grant that justified the subscription may be gone while another
    /// tier still allows viewing, so the registration survives only when a
    /// fresh resolution still grants `board.view`. A resolution failure
    /// counts as a denial.
    async fn recheck_board_access(&self, board_id: BoardId, user_id: UserId) {
        let scope = SubscriptionScope::Board(board_id);

        let principal = {
            let subscribers = self.subscribers.read().await;
            subscribers.get(&scope).and_then(|registrations| {
                registrations
                    .values()
                    .find(|subscriber| {
                        subscriber.principal.user_id() == user_id
                            && !subscriber.principal.is_global_admin()
                    })
                    .map(|subscriber| subscriber.principal)
            })
        };
        let Some(principal) = principal else {
            return;
        };

        let still_allowed = match &self.permissions {
            Some(permissions) => permissions
                .resolve(principal, Capability::BoardView, Some(board_id))
                .await
                .unwrap_or(false),
            None => false,
        };

        if !still_allowed {
            self.revoke_board_access(board_id, user_id).await;
        }
    }

    /// Invalidates and removes a user's registrations on a board channel.
    ///
    /// Global admins keep their registrations; their access does not derive
    /// from the grant row that vanished.
    async fn revoke_board_access(&self, board_id: BoardId, user_id: UserId) {
        let scope = SubscriptionScope::Board(board_id);
        let mut subscribers = self.subscribers.write().await;
        let Some(registrations) = subscribers.get_mut(&scope) else {
            return;
        };

        registrations.retain(|_, subscriber| {
            let revoked = subscriber.principal.user_id() == user_id
                && !subscriber.principal.is_global_admin();
            if revoked {
                subscriber.authorized.store(false, Ordering::Release);
            }
            !revoked
        });

        if registrations.is_empty() {
            subscribers.remove(&scope);
        }
    }
}

/// Extracts the affected user from a membership-table envelope.
fn membership_row_user(envelope: &ChangeEnvelope) -> Option<UserId> {
    if !matches!(envelope.table.as_str(), "board_members" | "workspace_members") {
        return None;
    }

    row_user(envelope)
}

/// Extracts the user referenced by an envelope's row payload.
fn row_user(envelope: &ChangeEnvelope) -> Option<UserId> {
    let row = envelope.new.as_ref().or(envelope.old.as_ref())?;
    let value = row.get("user_id").or_else(|| row.get("userId"))?;

    value
        .as_str()
        .and_then(|text| Uuid::parse_str(text).ok())
        .map(UserId::from_uuid)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use corkboard_application::{CustomRoleRepository, MembershipRepository, PermissionService};
    use corkboard_core::{BoardId, CustomRoleId, Principal, UserId, WorkspaceId};
    use corkboard_domain::{
        BoardMembership, Capability, ChangeEnvelope, ChangeOp, CustomRole, CustomRoleAssignment,
        LegacyRole, SubscriptionScope,
    };
    use serde_json::json;

    use super::SubscriptionRegistry;
    use crate::{InMemoryCustomRoleRepository, InMemoryMembershipRepository};

    fn board_envelope(board_id: BoardId, workspace_id: Option<WorkspaceId>) -> ChangeEnvelope {
        ChangeEnvelope {
            table: "cards".to_owned(),
            op: ChangeOp::Insert,
            board_id: Some(board_id),
            workspace_id,
            new: Some(json!({"id": uuid::Uuid::new_v4().to_string()})),
            old: None,
        }
    }

    fn membership_delete(board_id: BoardId, user_id: UserId) -> ChangeEnvelope {
        ChangeEnvelope {
            table: "board_members".to_owned(),
            op: ChangeOp::Delete,
            board_id: Some(board_id),
            workspace_id: None,
            new: None,
            old: Some(json!({
                "board_id": board_id.as_uuid().to_string(),
                "user_id": user_id.as_uuid().to_string(),
                "role": "viewer",
            })),
        }
    }

    #[tokio::test]
    async fn board_events_reach_board_and_workspace_subscribers() {
        let registry = SubscriptionRegistry::new();
        let board_id = BoardId::new();
        let workspace_id = WorkspaceId::new();
        let member = Principal::new(UserId::new(), false);

        let mut board_sub = registry
            .subscribe(member, SubscriptionScope::Board(board_id))
            .await;
        let mut workspace_sub = registry
            .subscribe(member, SubscriptionScope::Workspace(workspace_id))
            .await;
        let mut other_board_sub = registry
            .subscribe(member, SubscriptionScope::Board(BoardId::new()))
            .await;

        registry
            .deliver(board_envelope(board_id, Some(workspace_id)))
            .await;

        assert!(board_sub.try_recv().is_some());
        assert!(workspace_sub.try_recv().is_some());
        assert!(other_board_sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn removed_member_gets_the_notice_and_nothing_after() {
        let registry = SubscriptionRegistry::new();
        let board_id = BoardId::new();
        let removed_user = UserId::new();
        let removed = Principal::new(removed_user, false);
        let bystander = Principal::new(UserId::new(), false);

        let mut removed_board_sub = registry
            .subscribe(removed, SubscriptionScope::Board(board_id))
            .await;
        let mut removed_self_sub = registry
            .subscribe(removed, SubscriptionScope::User(removed_user))
            .await;
        let mut bystander_board_sub = registry
            .subscribe(bystander, SubscriptionScope::Board(board_id))
            .await;

        registry.deliver(membership_delete(board_id, removed_user)).await;
        registry.deliver(board_envelope(board_id, None)).await;

        // Exactly one self-scoped removal notice.
        let notice = removed_self_sub.try_recv();
        assert!(notice.is_some());
        let notice = notice.unwrap_or_else(|| unreachable!());
        assert_eq!(notice.table, "board_members");
        assert_eq!(notice.op, ChangeOp::Delete);
        assert!(removed_self_sub.try_recv().is_none());

        // The board channel went silent for the removed member before the
        // board fan-out of the removal itself.
        assert!(removed_board_sub.try_recv().is_none());

        // Everyone else keeps receiving.
        assert!(bystander_board_sub.try_recv().is_some());
        assert!(bystander_board_sub.try_recv().is_some());
        assert_eq!(
            registry
                .subscriber_count(SubscriptionScope::Board(board_id))
                .await,
            1
        );
    }

    fn assignment_delete(assignment: &CustomRoleAssignment) -> ChangeEnvelope {
        ChangeEnvelope {
            table: "custom_role_assignments".to_owned(),
            op: ChangeOp::Delete,
            board_id: Some(assignment.board_id),
            workspace_id: None,
            new: None,
            old: Some(json!({
                "board_id": assignment.board_id.as_uuid().to_string(),
                "user_id": assignment.user_id.as_uuid().to_string(),
                "custom_role_id": assignment.custom_role_id.as_uuid().to_string(),
            })),
        }
    }

    fn rechecking_registry() -> (
        SubscriptionRegistry,
        Arc<InMemoryMembershipRepository>,
        Arc<InMemoryCustomRoleRepository>,
    ) {
        let memberships = Arc::new(InMemoryMembershipRepository::new());
        let custom_roles = Arc::new(InMemoryCustomRoleRepository::new());
        let permissions = PermissionService::new(memberships.clone(), custom_roles.clone());

        (
            SubscriptionRegistry::with_permission_recheck(permissions),
            memberships,
            custom_roles,
        )
    }

    async fn seed_assignment(
        custom_roles: &InMemoryCustomRoleRepository,
        board_id: BoardId,
        user_id: UserId,
    ) -> CustomRoleAssignment {
        let role = CustomRole {
            id: CustomRoleId::new(),
            name: "observer".to_owned(),
            is_system: false,
            capabilities: [Capability::BoardView].into_iter().collect(),
        };
        let assignment = CustomRoleAssignment {
            board_id,
            user_id,
            custom_role_id: role.id,
        };

        assert!(custom_roles.create_custom_role(role).await.is_ok());
        assert!(custom_roles.assign_custom_role(assignment).await.is_ok());
        assignment
    }

    #[tokio::test]
    async fn losing_the_only_custom_role_grant_ends_board_delivery() {
        let (registry, _, custom_roles) = rechecking_registry();
        let board_id = BoardId::new();
        let user_id = UserId::new();
        let assignment = seed_assignment(&custom_roles, board_id, user_id).await;

        let mut board_sub = registry
            .subscribe(Principal::new(user_id, false), SubscriptionScope::Board(board_id))
            .await;

        registry.deliver(board_envelope(board_id, None)).await;
        assert!(board_sub.try_recv().is_some());

        // The admin removed the assignment; the registry sees the change as
        // a delete envelope after the fact.
        assert!(custom_roles.unassign_custom_role(assignment).await.is_ok());
        registry.deliver(assignment_delete(&assignment)).await;
        registry.deliver(board_envelope(board_id, None)).await;

        assert!(board_sub.try_recv().is_none());
        assert_eq!(
            registry
                .subscriber_count(SubscriptionScope::Board(board_id))
                .await,
            0
        );
    }

    #[tokio::test]
    async fn custom_role_removal_keeps_a_member_with_legacy_access() {
        let (registry, memberships, custom_roles) = rechecking_registry();
        let board_id = BoardId::new();
        let user_id = UserId::new();
        let assignment = seed_assignment(&custom_roles, board_id, user_id).await;
        assert!(
            memberships
                .insert_membership(BoardMembership {
                    board_id,
                    user_id,
                    role: LegacyRole::Viewer,
                })
                .await
                .is_ok()
        );

        let mut board_sub = registry
            .subscribe(Principal::new(user_id, false), SubscriptionScope::Board(board_id))
            .await;

        assert!(custom_roles.unassign_custom_role(assignment).await.is_ok());
        registry.deliver(assignment_delete(&assignment)).await;
        registry.deliver(board_envelope(board_id, None)).await;

        // The viewer membership still grants board.view; both the assignment
        // delete and the later event arrive.
        assert!(board_sub.try_recv().is_some());
        assert!(board_sub.try_recv().is_some());
        assert_eq!(
            registry
                .subscriber_count(SubscriptionScope::Board(board_id))
                .await,
            1
        );
    }

    #[tokio::test]
    async fn global_admin_survives_membership_removal() {
        let registry = SubscriptionRegistry::new();
        let board_id = BoardId::new();
        let admin_user = UserId::new();
        let admin = Principal::new(admin_user, true);

        let mut admin_board_sub = registry
            .subscribe(admin, SubscriptionScope::Board(board_id))
            .await;

        registry.deliver(membership_delete(board_id, admin_user)).await;
        registry.deliver(board_envelope(board_id, None)).await;

        // The admin's board registration is untouched; both the removal and
        // the later event arrive.
        assert!(admin_board_sub.try_recv().is_some());
        assert!(admin_board_sub.try_recv().is_some());
    }

    #[tokio::test]
    async fn dropped_handles_are_pruned_without_disturbing_others() {
        let registry = SubscriptionRegistry::new();
        let board_id = BoardId::new();
        let member = Principal::new(UserId::new(), false);

        let gone = registry
            .subscribe(member, SubscriptionScope::Board(board_id))
            .await;
        drop(gone);
        let mut alive = registry
            .subscribe(member, SubscriptionScope::Board(board_id))
            .await;

        registry.deliver(board_envelope(board_id, None)).await;

        assert!(alive.try_recv().is_some());
        assert_eq!(
            registry
                .subscriber_count(SubscriptionScope::Board(board_id))
                .await,
            1
        );
    }

    #[tokio::test]
    async fn unsubscribe_is_immediate_and_idempotent() {
        let registry = SubscriptionRegistry::new();
        let board_id = BoardId::new();
        let member = Principal::new(UserId::new(), false);

        let handle = registry
            .subscribe(member, SubscriptionScope::Board(board_id))
            .await;
        let subscription_id = handle.subscription_id();

        registry
            .unsubscribe(SubscriptionScope::Board(board_id), subscription_id)
            .await;
        registry
            .unsubscribe(SubscriptionScope::Board(board_id), subscription_id)
            .await;

        assert_eq!(
            registry
                .subscriber_count(SubscriptionScope::Board(board_id))
                .await,
            0
        );
    }

    #[tokio::test]
    async fn per_scope_delivery_preserves_publish_order() {
        let registry = SubscriptionRegistry::new();
        let board_id = BoardId::new();
        let member = Principal::new(UserId::new(), false);

        let mut board_sub = registry
            .subscribe(member, SubscriptionScope::Board(board_id))
            .await;

        for op in [ChangeOp::Insert, ChangeOp::Update, ChangeOp::Delete] {
            let mut envelope = board_envelope(board_id, None);
            envelope.op = op;
            if op == ChangeOp::Delete {
                envelope.old = envelope.new.take();
            }
            registry.deliver(envelope).await;
        }

        let ops: Vec<ChangeOp> = std::iter::from_fn(|| board_sub.try_recv())
            .map(|envelope| envelope.op)
            .collect();
        assert_eq!(ops, vec![ChangeOp::Insert, ChangeOp::Update, ChangeOp::Delete]);
    }
}
