//! Application services and ports for the Corkboard authorization and
//! realtime-distribution core.

#![forbid(unsafe_code)]

mod audit_service;
mod change_emitter;
mod invite_service;
mod membership_service;
mod permission_service;
mod ports;
mod scope_resolver;

pub use audit_service::AuditService;
pub use change_emitter::ChangeEventEmitter;
pub use invite_service::{CreatedInvite, InviteService};
pub use membership_service::MembershipService;
pub use permission_service::PermissionService;
pub use ports::{
    AuditQuery, AuditRepository, ChangePublisher, CustomRoleRepository, InviteRedemption,
    InviteRepository, MembershipRepository, ScopeRepository,
};
pub use scope_resolver::ScopeResolver;
