use axum::extract::{Path, Query, State};
use serde_json::Value;
use service_core::error::AppError;
use std::collections::HashMap;

use crate::{
    dtos::{
        complaint::{CommentRequest, CreateComplaintRequest},
        ApiResponse,
    },
    middleware::AuthUser,
    services::{AdminDashboard, CitizenDashboard, QuerySpec, SuperAdminDashboard},
    utils::ValidatedJson,
    AppState,
};

pub async fn create_complaint(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ValidatedJson(req): ValidatedJson<CreateComplaintRequest>,
) -> Result<ApiResponse<Value>, AppError> {
    let complaint = state.complaints.create(&claims, req.into()).await?;
    Ok(ApiResponse::created("Complaint submitted successfully", complaint))
}

pub async fn list_complaints(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Query(params): Query<HashMap<String, String>>,
) -> Result<ApiResponse<Vec<Value>>, AppError> {
    let result = state
        .complaints
        .list(&claims, &QuerySpec::from_params(params))
        .await?;
    Ok(ApiResponse::page("Complaints retrieved successfully", result))
}

pub async fn list_public_complaints(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<ApiResponse<Vec<Value>>, AppError> {
    let result = state
        .complaints
        .list_public(&QuerySpec::from_params(params))
        .await?;
    Ok(ApiResponse::page("Public complaints retrieved successfully", result))
}

pub async fn resolve_complaint(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(id): Path<String>,
) -> Result<ApiResponse<Value>, AppError> {
    let complaint = state.complaints.resolve(&claims, &id).await?;
    Ok(ApiResponse::ok("Complaint resolved successfully", complaint))
}

pub async fn vote_complaint(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(id): Path<String>,
) -> Result<ApiResponse<Value>, AppError> {
    let complaint = state.complaints.vote(&id, &claims.id).await?;
    Ok(ApiResponse::ok("Vote added successfully", complaint))
}

pub async fn comment_complaint(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(id): Path<String>,
    axum::Json(req): axum::Json<CommentRequest>,
) -> Result<ApiResponse<Value>, AppError> {
    let complaint = state.complaints.comment(&id, &claims.id, &req.text).await?;
    Ok(ApiResponse::ok("Comment added successfully", complaint))
}

pub async fn citizen_dashboard(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<ApiResponse<CitizenDashboard>, AppError> {
    let dashboard = state.complaints.citizen_dashboard(&claims).await?;
    Ok(ApiResponse::ok("Citizen dashboard data", dashboard))
}

pub async fn admin_dashboard(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<ApiResponse<AdminDashboard>, AppError> {
    let dashboard = state.complaints.admin_dashboard(&claims).await?;
    Ok(ApiResponse::ok("Admin dashboard data", dashboard))
}

pub async fn super_admin_dashboard(
    State(state): State<AppState>,
) -> Result<ApiResponse<SuperAdminDashboard>, AppError> {
    let dashboard = state.complaints.super_admin_dashboard().await?;
    Ok(ApiResponse::ok("SuperAdmin dashboard data", dashboard))
}
