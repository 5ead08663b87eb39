use axum::{
    extract::State,
    http::{header, HeaderMap},
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::{
        auth::{ChangePasswordRequest, ForgetPasswordRequest, ResetPasswordRequest},
        ApiResponse,
    },
    middleware::AuthUser,
    utils::ValidatedJson,
    AppState,
};

pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ValidatedJson(req): ValidatedJson<ChangePasswordRequest>,
) -> Result<ApiResponse<()>, AppError> {
    state
        .auth
        .change_password(&claims, &req.old_password, &req.new_password)
        .await?;
    Ok(ApiResponse::ok("Password changed successfully", ()))
}

/// Sends the reset link. Delivery failure fails the request.
pub async fn forget_password(
    State(state): State<AppState>,
    Json(req): Json<ForgetPasswordRequest>,
) -> Result<ApiResponse<()>, AppError> {
    state.auth.request_password_reset(&req.email).await?;
    Ok(ApiResponse::ok("Reset link sent to email successfully", ()))
}

/// The reset token arrives as `Authorization: Bearer <token>`.
pub async fn reset_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<ResetPasswordRequest>,
) -> Result<ApiResponse<()>, AppError> {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    state
        .auth
        .redeem_password_reset(&req.email, &req.new_password, authorization)
        .await?;
    Ok(ApiResponse::ok("Password reset successfully", ()))
}
