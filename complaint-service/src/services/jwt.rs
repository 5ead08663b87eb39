use chrono::{DateTime, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::JwtConfig;
use crate::models::{User, UserRole};

/// Identity embedded in every token. Advisory only: callers re-resolve the
/// live user record before trusting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityClaims {
    #[serde(rename = "_id")]
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: UserRole,
    pub phone: String,
}

impl From<&User> for IdentityClaims {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            role: user.role,
            phone: user.phone.clone(),
        }
    }
}

/// Decoded token: the claim set plus its timestamps. `iat` and `exp` are Unix
/// seconds; `iatMs` repeats the issue time in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityToken {
    #[serde(flatten)]
    pub claims: IdentityClaims,
    pub iat: i64,
    pub exp: i64,
    #[serde(rename = "iatMs", default)]
    pub iat_ms: i64,
}

impl IdentityToken {
    /// Millisecond issue time; tokens without `iatMs` fall back to the start
    /// of their issuing second.
    pub fn issued_at_ms(&self) -> i64 {
        if self.iat_ms > 0 {
            self.iat_ms
        } else {
            self.iat.saturating_mul(1000)
        }
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token expired")]
    Expired,
    #[error("Invalid token")]
    Invalid,
}

/// HS256 signing and verification of identity tokens.
pub struct TokenCodec;

impl TokenCodec {
    pub fn sign(
        claims: &IdentityClaims,
        secret: &str,
        ttl_seconds: i64,
    ) -> Result<String, anyhow::Error> {
        Self::sign_at(claims, secret, ttl_seconds, Utc::now())
    }

    pub fn sign_at(
        claims: &IdentityClaims,
        secret: &str,
        ttl_seconds: i64,
        issued_at: DateTime<Utc>,
    ) -> Result<String, anyhow::Error> {
        let iat = issued_at.timestamp();
        let token = IdentityToken {
            claims: claims.clone(),
            iat,
            exp: iat + ttl_seconds,
            iat_ms: issued_at.timestamp_millis(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &token,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .map_err(|e| anyhow::anyhow!("Failed to encode token: {}", e))
    }

    pub fn verify(token: &str, secret: &str) -> Result<IdentityToken, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        decode::<IdentityToken>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid,
        })
    }
}

/// True when the password changed after the token was issued, compared at
/// millisecond resolution. A change within the issuing millisecond counts as
/// later.
pub fn is_stale(password_changed_at: Option<DateTime<Utc>>, token: &IdentityToken) -> bool {
    match password_changed_at {
        Some(changed_at) => changed_at.timestamp_millis() >= token.issued_at_ms(),
        None => false,
    }
}

/// Token issuance with the configured secrets and lifetimes.
#[derive(Clone)]
pub struct JwtService {
    config: JwtConfig,
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Self {
        tracing::info!(
            access_ttl = config.access_ttl_seconds,
            refresh_ttl = config.refresh_ttl_seconds,
            "JWT service initialized with HS256 secrets"
        );
        Self {
            config: config.clone(),
        }
    }

    pub fn issue_access(&self, claims: &IdentityClaims) -> Result<String, anyhow::Error> {
        TokenCodec::sign(claims, &self.config.access_secret, self.config.access_ttl_seconds)
    }

    pub fn issue_refresh(&self, claims: &IdentityClaims) -> Result<String, anyhow::Error> {
        TokenCodec::sign(claims, &self.config.refresh_secret, self.config.refresh_ttl_seconds)
    }

    /// Reset tokens share the access secret but carry their own short lifetime.
    pub fn issue_reset(&self, claims: &IdentityClaims) -> Result<String, anyhow::Error> {
        TokenCodec::sign(claims, &self.config.access_secret, self.config.reset_ttl_seconds)
    }

    pub fn verify_access(&self, token: &str) -> Result<IdentityToken, TokenError> {
        TokenCodec::verify(token, &self.config.access_secret)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<IdentityToken, TokenError> {
        TokenCodec::verify(token, &self.config.refresh_secret)
    }
}
