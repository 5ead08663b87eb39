use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use super::email::{templates, Notifier};
use super::error::ServiceError;
use super::gate::bearer_token;
use super::jwt::{is_stale, IdentityClaims, JwtService, TokenError};
use super::store::{UserDirectory, UserPatch};
use crate::config::PasswordConfig;
use crate::models::{PublicUser, User};
use crate::utils::{hash_password, verify_password, Password, PasswordHashString};

const BLOCKED: &str = "Your account has been blocked. Please contact support for assistance.";

/// Tokens and identity produced by a successful login.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginOutcome {
    pub access_token: String,
    /// Delivered as a cookie by the HTTP layer, never in a body.
    #[serde(skip)]
    pub refresh_token: String,
    #[serde(skip)]
    pub claims: IdentityClaims,
    pub user: PublicUser,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshOutcome {
    pub access_token: String,
}

/// Login, refresh and password lifecycle. Holds no session state: validity
/// is signature, expiry and the password-change timestamp.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserDirectory>,
    notifier: Arc<dyn Notifier>,
    jwt: JwtService,
    password: PasswordConfig,
    reset_link_base: String,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        notifier: Arc<dyn Notifier>,
        jwt: JwtService,
        password: PasswordConfig,
        reset_link_base: String,
    ) -> Self {
        Self {
            users,
            notifier,
            jwt,
            password,
            reset_link_base,
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, ServiceError> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .filter(|u| !u.is_deleted)
            .ok_or_else(|| ServiceError::not_found("User not found"))?;

        if !self.matches(password, &user) {
            tracing::warn!(user_id = %user.id, "Login failed: password mismatch");
            return Err(ServiceError::forbidden("Password do not matched"));
        }

        if user.is_banned {
            tracing::warn!(user_id = %user.id, "Login refused: account banned");
            return Err(ServiceError::forbidden(BLOCKED));
        }

        let claims = IdentityClaims::from(&user);
        let access_token = self.jwt.issue_access(&claims)?;
        let refresh_token = self.jwt.issue_refresh(&claims)?;

        tracing::info!(user_id = %user.id, role = %user.role, "User logged in");

        Ok(LoginOutcome {
            access_token,
            refresh_token,
            claims,
            user: user.public_view(),
        })
    }

    /// Verifies the old password, then stores the new hash together with a
    /// fresh `passwordChangedAt`, revoking every earlier token.
    pub async fn change_password(
        &self,
        identity: &IdentityClaims,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), ServiceError> {
        let user = self
            .users
            .find_by_email(&identity.email)
            .await?
            .filter(|u| !u.is_deleted)
            .ok_or_else(|| ServiceError::not_found("This user is not found!"))?;

        if !self.matches(old_password, &user) {
            tracing::warn!(user_id = %user.id, "Password change refused: old password mismatch");
            return Err(ServiceError::forbidden("Password do not matched"));
        }

        self.store_password(&user, new_password).await?;
        tracing::info!(user_id = %user.id, "Password changed");
        Ok(())
    }

    /// Mints a new access token. A refresh token is never reissued.
    pub async fn refresh_access_token(
        &self,
        refresh_token: Option<&str>,
    ) -> Result<RefreshOutcome, ServiceError> {
        let token = refresh_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ServiceError::unauthorized("Refresh token is missing"))?;

        let decoded = self.jwt.verify_refresh(token).map_err(|e| {
            tracing::warn!(reason = %e, "Refresh refused: token rejected");
            match e {
                TokenError::Expired => ServiceError::unauthorized("Refresh token expired"),
                TokenError::Invalid => ServiceError::unauthorized("Invalid refresh token"),
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
        if user.is_banned {
            return Err(ServiceError::forbidden(BLOCKED));
        }

        if is_stale(user.password_changed_at, &decoded) {
            tracing::warn!(user_id = %user.id, "Refresh refused: token predates password change");
            return Err(ServiceError::unauthorized("You are not authorized!"));
        }

        let claims = IdentityClaims::from(&user);
        let access_token = self.jwt.issue_access(&claims)?;

        Ok(RefreshOutcome { access_token })
    }

    /// Mails a short-lived reset link. Nothing is stored: the token is only
    /// checked by signature, expiry and the password-change guard.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), ServiceError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(ServiceError::bad_request("Email is required"));
        }

        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or_else(|| ServiceError::not_found("This user is not found!"))?;

        if user.is_deleted {
            return Err(ServiceError::forbidden("This user is deleted!"));
        }

        let claims = IdentityClaims::from(&user);
        let token = self.jwt.issue_reset(&claims)?;
        let link = format!("{}?id={}&token={}", self.reset_link_base, user.id, token);

        self.notifier
            .send(&user.email, &templates::reset_link(&link), templates::RESET_SUBJECT)
            .await
            .inspect_err(|e| {
                tracing::error!(user_id = %user.id, error = %e, "Reset link could not be delivered");
            })?;

        tracing::info!(user_id = %user.id, "Password reset link sent");
        Ok(())
    }

    /// `authorization` is the raw `Authorization` header carrying the reset
    /// token as a bearer credential.
    pub async fn redeem_password_reset(
        &self,
        email: &str,
        new_password: &str,
        authorization: Option<&str>,
    ) -> Result<(), ServiceError> {
        let token = authorization
            .and_then(bearer_token)
            .ok_or_else(|| ServiceError::bad_request("Authorization token is missing"))?;

        let decoded = self.jwt.verify_access(token).map_err(|e| {
            tracing::warn!(reason = %e, "Password reset refused: token rejected");
            match e {
                TokenError::Expired => ServiceError::unauthorized("Reset link has expired"),
                TokenError::Invalid => ServiceError::unauthorized("Invalid token!"),
            }
        })?;

        let email = email.trim().to_lowercase();
        if decoded.claims.email != email {
            tracing::warn!(
                token_user = %decoded.claims.id,
                "Password reset refused: token issued for another account"
            );
            return Err(ServiceError::forbidden("You are forbidden!"));
        }

        let user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or_else(|| ServiceError::not_found("This user is not found!"))?;

        if user.is_deleted {
            return Err(ServiceError::forbidden("This user is deleted!"));
        }

        if is_stale(user.password_changed_at, &decoded) {
            return Err(ServiceError::unauthorized("You are not authorized!"));
        }

        self.store_password(&user, new_password).await?;
        tracing::info!(user_id = %user.id, "Password reset completed");
        Ok(())
    }

    fn matches(&self, candidate: &str, user: &User) -> bool {
        verify_password(
            &Password::new(candidate),
            &PasswordHashString::new(user.password.clone()),
        )
    }

    async fn store_password(&self, user: &User, new_password: &str) -> Result<User, ServiceError> {
        let hash = hash_password(&Password::new(new_password), &self.password)?;
        self.users
            .update(&user.id, UserPatch::credentials(hash.into_string(), Utc::now()))
            .await
    }
}
