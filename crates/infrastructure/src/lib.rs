//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod change_dispatcher;
mod in_memory_audit_repository;
mod in_memory_custom_role_repository;
mod in_memory_invite_repository;
mod in_memory_membership_repository;
mod in_memory_scope_repository;
mod postgres_audit_repository;
mod postgres_custom_role_repository;
mod postgres_invite_repository;
mod postgres_membership_repository;
mod postgres_scope_repository;
mod subscription_registry;

pub use change_dispatcher::ChangeDispatcher;
pub use in_memory_audit_repository::InMemoryAuditRepository;
pub use in_memory_custom_role_repository::InMemoryCustomRoleRepository;
pub use in_memory_invite_repository::InMemoryInviteRepository;
pub use in_memory_membership_repository::InMemoryMembershipRepository;
pub use in_memory_scope_repository::InMemoryScopeRepository;
pub use postgres_audit_repository::PostgresAuditRepository;
pub use postgres_custom_role_repository::PostgresCustomRoleRepository;
pub use postgres_invite_repository::PostgresInviteRepository;
pub use postgres_membership_repository::PostgresMembershipRepository;
pub use postgres_scope_repository::PostgresScopeRepository;
pub use subscription_registry::{SubscriptionHandle, SubscriptionRegistry};
