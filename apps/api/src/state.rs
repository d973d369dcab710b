use std::sync::Arc;

use corkboard_application::{
    AuditService, ChangeEventEmitter, InviteService, MembershipService, PermissionService,
};
use corkboard_infrastructure::SubscriptionRegistry;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub permission_service: PermissionService,
    pub membership_service: MembershipService,
    pub invite_service: InviteService,
    pub audit_service: AuditService,
    pub change_emitter: ChangeEventEmitter,
    pub registry: Arc<SubscriptionRegistry>,
    pub internal_shared_secret: String,
}
