use std::sync::Arc;

use super::error::ServiceError;
use super::jwt::{is_stale, IdentityClaims, JwtService, TokenError};
use super::store::UserDirectory;
use crate::models::UserRole;

const NOT_AUTHORIZED: &str = "You are not authorized!";

/// Token from an `Authorization` value. The `Bearer` scheme word is matched
/// case-insensitively.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Request-time guard: verifies the bearer token, re-resolves the live user
/// and applies the invalidation and role rules. Never writes.
#[derive(Clone)]
pub struct AccessGate {
    jwt: JwtService,
    users: Arc<dyn UserDirectory>,
}

impl AccessGate {
    pub fn new(jwt: JwtService, users: Arc<dyn UserDirectory>) -> Self {
        Self { jwt, users }
    }

    /// An empty `roles` list admits any authenticated role.
    pub async fn authorize(
        &self,
        authorization: Option<&str>,
        roles: &[UserRole],
    ) -> Result<IdentityClaims, ServiceError> {
        let token = authorization.and_then(bearer_token).ok_or_else(|| {
            tracing::warn!("Access denied: missing bearer token");
            ServiceError::unauthorized(NOT_AUTHORIZED)
        })?;

        let decoded = self.jwt.verify_access(token).map_err(|e| {
            tracing::warn!(reason = %e, "Access denied: token rejected");
            match e {
                TokenError::Expired => ServiceError::unauthorized("Token expired!"),
                TokenError::Invalid => ServiceError::unauthorized("Invalid token!"),
            }
        })?;

        let user = self
            .users
            .find_by_email(&decoded.claims.email)
            .await?
            .ok_or_else(|| ServiceError::not_found("This user is not found!"))?;

        if user.is_deleted {
            return Err(ServiceError::forbidden("This user is deleted!"));
        }

        if is_stale(user.password_changed_at, &decoded) {
            tracing::warn!(user_id = %user.id, "Access denied: token predates password change");
            return Err(ServiceError::unauthorized(NOT_AUTHORIZED));
        }

        if !roles.is_empty() && !roles.contains(&decoded.claims.role) {
            tracing::warn!(
                user_id = %user.id,
                role = %decoded.claims.role,
                "Access denied: role not permitted"
            );
            return Err(ServiceError::unauthorized(NOT_AUTHORIZED));
        }

        Ok(decoded.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("bearer abc"), Some("abc"));
        assert_eq!(bearer_token("BEARER  abc "), Some("abc"));
    }

    #[test]
    fn other_schemes_and_bare_tokens_are_rejected() {
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
    }
}
