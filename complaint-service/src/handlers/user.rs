use axum::extract::{Path, Query, State};
use serde_json::Value;
use service_core::error::AppError;
use std::collections::HashMap;

use crate::{
    dtos::{
        user::{SignupRequest, UpdateProfileRequest, UpdateUserRequest},
        ApiResponse,
    },
    middleware::AuthUser,
    models::UserProfile,
    services::QuerySpec,
    utils::ValidatedJson,
    AppState,
};

pub async fn signup(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<SignupRequest>,
) -> Result<ApiResponse<UserProfile>, AppError> {
    let (profile, password) = req.into_parts();
    let user = state.users.signup(profile, &password).await?;
    Ok(ApiResponse::created("User created successfully", user))
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<ApiResponse<Vec<Value>>, AppError> {
    let result = state
        .users
        .list_users(&QuerySpec::from_params(params))
        .await?;
    Ok(ApiResponse::page("Users fetched successfully", result))
}

pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<ApiResponse<UserProfile>, AppError> {
    let user = state.users.get_me(&claims).await?;
    Ok(ApiResponse::ok("User fetched successfully", user))
}

pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ValidatedJson(req): ValidatedJson<UpdateProfileRequest>,
) -> Result<ApiResponse<UserProfile>, AppError> {
    let user = state.users.update_me(&claims, req.into()).await?;
    Ok(ApiResponse::ok("User updated successfully", user))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiResponse<UserProfile>, AppError> {
    let user = state.users.get_user(&id).await?;
    Ok(ApiResponse::ok("User fetched successfully", user))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidatedJson(req): ValidatedJson<UpdateUserRequest>,
) -> Result<ApiResponse<UserProfile>, AppError> {
    let (patch, password) = req.into_parts();
    let user = state
        .users
        .update_user(&id, patch, password.as_deref())
        .await?;
    Ok(ApiResponse::ok("User updated successfully", user))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiResponse<UserProfile>, AppError> {
    let user = state.users.delete_user(&id).await?;
    Ok(ApiResponse::ok("User deleted successfully", user))
}
