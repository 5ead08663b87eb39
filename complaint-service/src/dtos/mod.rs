pub mod ai;
pub mod auth;
pub mod complaint;
pub mod user;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

use crate::services::QueryResult;

/// Success envelope shared by every endpoint. List endpoints put their
/// pagination summary in `meta`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    #[serde(skip)]
    status: StatusCode,
    pub success: bool,
    pub message: String,
    pub data: T,
    pub meta: Value,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            status: StatusCode::OK,
            success: true,
            message: message.into(),
            data,
            meta: Value::Object(Default::default()),
        }
    }

    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            ..Self::ok(message, data)
        }
    }
}

impl ApiResponse<Vec<Value>> {
    pub fn page(message: impl Into<String>, result: QueryResult) -> Self {
        let meta = serde_json::to_value(result.pagination).unwrap_or_default();
        Self {
            meta,
            ..Self::ok(message, result.data)
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::query::Pagination;

    #[test]
    fn envelope_has_empty_meta_by_default() {
        let body = serde_json::to_value(ApiResponse::ok("Done", 5)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "success": true, "message": "Done", "data": 5, "meta": {} })
        );
    }

    #[test]
    fn pages_carry_pagination_in_meta() {
        let result = QueryResult {
            data: vec![serde_json::json!({ "title": "x" })],
            pagination: Pagination::new(2, 1, 3),
        };
        let response = ApiResponse::page("Listed", result);
        assert_eq!(response.meta["totalPages"], 3);
        assert_eq!(response.meta["hasPrevPage"], true);
        assert_eq!(response.data.len(), 1);
    }

    #[test]
    fn created_uses_201() {
        let response = ApiResponse::created("Made", ()).into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
    }
}
