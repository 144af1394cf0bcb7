//! Report API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};

use super::{success, ApiResult};
use crate::models::{GenerateReportRequest, MonthlyReportRequest, ReportDetail, ReportSummary};
use crate::AppState;

/// GET /api/reports - List the reports index.
pub async fn list_reports(State(state): State<AppState>) -> ApiResult<Vec<ReportSummary>> {
    success(state.reports.list().await?)
}

/// GET /api/reports/{id} - Full report document.
pub async fn get_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ReportDetail> {
    success(state.reports.get(&id).await?)
}

/// POST /api/reports - Generate a report over a date range.
pub async fn generate_report(
    State(state): State<AppState>,
    Json(request): Json<GenerateReportRequest>,
) -> ApiResult<ReportSummary> {
    success(state.reports.generate(request, Utc::now()).await?)
}

/// POST /api/reports/monthly - Generate a calendar-month report.
pub async fn generate_monthly_report(
    State(state): State<AppState>,
    Json(request): Json<MonthlyReportRequest>,
) -> ApiResult<ReportSummary> {
    success(state.reports.generate_monthly(request, Utc::now()).await?)
}

/// DELETE /api/reports/{id}
pub async fn delete_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    state.reports.remove(&id).await?;
    success(json!({ "id": id }))
}
