use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;

use crate::models::UserRole;
use crate::services::{AccessGate, IdentityClaims};

pub const ANY_ROLE: &[UserRole] = &[];
pub const USER_ONLY: &[UserRole] = &[UserRole::User];
pub const ADMIN_ONLY: &[UserRole] = &[UserRole::Admin];
pub const SUPER_ADMIN_ONLY: &[UserRole] = &[UserRole::SuperAdmin];
pub const ADMINS: &[UserRole] = &[UserRole::Admin, UserRole::SuperAdmin];

/// Middleware state: the gate plus the roles admitted on the wrapped routes.
#[derive(Clone)]
pub struct RoleGuard {
    gate: AccessGate,
    roles: &'static [UserRole],
}

impl RoleGuard {
    pub fn new(gate: AccessGate, roles: &'static [UserRole]) -> Self {
        Self { gate, roles }
    }
}

/// Runs the access gate and attaches the caller's claims to the request.
pub async fn require_roles(
    State(guard): State<RoleGuard>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let authorization = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let claims = guard.gate.authorize(authorization, guard.roles).await?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Claims attached by [`require_roles`].
pub struct AuthUser(pub IdentityClaims);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let claims = parts.extensions.get::<IdentityClaims>().ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!(
                "Identity claims missing from request extensions"
            ))
        })?;

        Ok(AuthUser(claims.clone()))
    }
}
