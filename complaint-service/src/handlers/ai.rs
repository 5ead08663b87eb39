use axum::{extract::State, Json};
use service_core::error::AppError;

use crate::{
    dtos::{
        ai::{AnalyzeBatchRequest, AnalyzeLocationRequest},
        ApiResponse,
    },
    services::ai::BatchAnalysis,
    AppState,
};

pub async fn analyze_batch(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeBatchRequest>,
) -> Result<ApiResponse<BatchAnalysis>, AppError> {
    let analysis = state
        .analysis
        .analyze_batch(&req.complaint_ids, req.location)
        .await?;
    Ok(ApiResponse::ok("Complaints analyzed successfully", analysis))
}

pub async fn analyze_location(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeLocationRequest>,
) -> Result<ApiResponse<BatchAnalysis>, AppError> {
    let analysis = state.analysis.analyze_location(req.location).await?;
    Ok(ApiResponse::ok(
        "Location-based complaints analyzed successfully",
        analysis,
    ))
}
