use serde::Deserialize;

use crate::services::LocationFilter;

/// Id-count bounds are enforced by the analysis service.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeBatchRequest {
    #[serde(default)]
    pub complaint_ids: Vec<String>,
    #[serde(default)]
    pub location: Option<LocationFilter>,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeLocationRequest {
    #[serde(default)]
    pub location: LocationFilter,
}
