//! Domain vocabularies and value types for Corkboard.

#![forbid(unsafe_code)]

mod audit;
mod capability;
mod change;
mod invite;
mod membership;
mod role;

pub use audit::{MembershipAuditAction, MembershipAuditEntry};
pub use capability::Capability;
pub use change::{ChangeEnvelope, ChangeOp, SubscriptionScope};
pub use invite::{InviteLinkType, InviteToken};
pub use membership::{BoardMembership, CustomRole, CustomRoleAssignment};
pub use role::LegacyRole;
