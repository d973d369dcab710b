pub mod audit;
pub mod changes;
pub mod events;
pub mod health;
pub mod invites;
pub mod memberships;
pub mod roles;
