pub mod auth;

pub use auth::{require_roles, AuthUser, RoleGuard};
