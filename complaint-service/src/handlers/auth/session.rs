use axum::extract::State;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use service_core::error::AppError;

use crate::{
    dtos::{auth::LoginRequest, ApiResponse},
    services::{LoginOutcome, RefreshOutcome},
    utils::ValidatedJson,
    AppState,
};

pub const REFRESH_COOKIE: &str = "refreshToken";

/// Login with email and password. The refresh token travels only in an
/// HttpOnly cookie.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<(CookieJar, ApiResponse<LoginOutcome>), AppError> {
    let outcome = state.auth.login(&req.email, &req.password).await?;

    let cookie = Cookie::build((REFRESH_COOKIE, outcome.refresh_token.clone()))
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(state.config.is_prod())
        .path("/");

    Ok((
        jar.add(cookie),
        ApiResponse::ok("User logged in successfully", outcome),
    ))
}

/// Mint a new access token from the `refreshToken` cookie.
pub async fn refresh_token(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<ApiResponse<RefreshOutcome>, AppError> {
    let token = jar.get(REFRESH_COOKIE).map(|c| c.value().to_string());
    let outcome = state.auth.refresh_access_token(token.as_deref()).await?;
    Ok(ApiResponse::ok("Access token refreshed successfully", outcome))
}
