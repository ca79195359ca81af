//! HTTP surface over the same service the MCP tools use.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{error, info};
use wiki_common::api::{
    AnalysisReport, AnalyzeDiscussionParams, AnalyzeTextParams, ListPoliciesParams, PolicyInfo,
    PolicyListResponse,
};

use crate::error::AppError;
use crate::service::AnalysisService;

/// Error body: `{"error": true, "message": ..., "status": ..., "error_code": ...}`.
#[derive(Debug)]
pub struct ApiError {
    pub message: String,
    pub status_code: StatusCode,
    pub error_code: &'static str,
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        let (status_code, error_code) = match &err {
            AppError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            AppError::LlmDisabled => (StatusCode::BAD_REQUEST, "LLM_DISABLED"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::Fetch(_) => (StatusCode::BAD_GATEWAY, "FETCH_FAILED"),
            AppError::Llm(_) | AppError::Common(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
            AppError::Config(_) | AppError::Dictionary(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };
        if status_code.is_server_error() {
            error!(error = %err, status = status_code.as_u16(), "request failed");
        }
        Self {
            message: err.to_string(),
            status_code,
            error_code,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": true,
            "message": self.message,
            "status": self.status_code.as_u16(),
            "error_code": self.error_code,
        });
        (self.status_code, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

pub fn router(service: Arc<AnalysisService>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/analyze", post(analyze_discussion))
        .route("/analyze/text", post(analyze_text))
        .route("/policies", get(list_policies))
        .route("/policies/{token}", get(lookup_policy))
        .with_state(service)
}

async fn health(State(service): State<Arc<AnalysisService>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "dictionary_entries": service.dictionary().len(),
        "fetch_strategy": service.fetch_strategy(),
        "llm_enabled": service.llm_enabled(),
    }))
}

async fn analyze_discussion(
    State(service): State<Arc<AnalysisService>>,
    Json(params): Json<AnalyzeDiscussionParams>,
) -> ApiResult<AnalysisReport> {
    let mode = params.mode.unwrap_or_default();
    info!(mode = mode.as_str(), "POST /analyze");
    let report = service
        .analyze_url(params.url.as_deref(), mode, params.refresh.unwrap_or(false))
        .await?;
    Ok(Json(report))
}

async fn analyze_text(
    State(service): State<Arc<AnalysisService>>,
    Json(params): Json<AnalyzeTextParams>,
) -> ApiResult<AnalysisReport> {
    Ok(Json(service.analyze_text(params.text.as_deref()).await?))
}

async fn list_policies(
    State(service): State<Arc<AnalysisService>>,
    Query(params): Query<ListPoliciesParams>,
) -> ApiResult<PolicyListResponse> {
    Ok(Json(service.list(params.category.as_deref())?))
}

async fn lookup_policy(
    State(service): State<Arc<AnalysisService>>,
    Path(token): Path<String>,
) -> ApiResult<PolicyInfo> {
    Ok(Json(service.lookup(&token)?))
}
