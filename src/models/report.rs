//! Report models stored under `reports/`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::codec::Envelope;

/// Which task timestamp decides whether a task falls inside a report range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DateField {
    #[default]
    CreatedAt,
    UpdatedAt,
    Due,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    #[default]
    Ready,
}

/// Inclusive calendar-day range a report covers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPeriod {
    #[serde(rename = "type")]
    pub kind: String,
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportTotals {
    pub tasks: usize,
    pub done: usize,
    pub overdue: usize,
}

/// Entry of the reports index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub id: String,
    pub period: ReportPeriod,
    pub title: String,
    pub created_at: String,
    pub owner_id: String,
    #[serde(default)]
    pub status: ReportStatus,
    #[serde(default)]
    pub totals: ReportTotals,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Per-assignee counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssigneeBucket {
    pub key: String,
    pub label: String,
    pub total: usize,
    pub done: usize,
}

/// Per-tag counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagBucket {
    pub tag: String,
    pub total: usize,
    pub done: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetrics {
    pub tasks_total: usize,
    pub tasks_done: usize,
    pub tasks_overdue: usize,
    /// Status to count, in first-seen order
    pub by_status: Map<String, Value>,
    pub by_assignee: Vec<AssigneeBucket>,
    pub by_tag: Vec<TagBucket>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportFilters {
    pub start_date: String,
    pub end_date: String,
    pub date_field: DateField,
}

/// Where the report's numbers came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSource {
    pub tasks_path: String,
    pub filters: ReportFilters,
}

/// Full report document stored at `reports/<id>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDetail {
    pub id: String,
    pub period: ReportPeriod,
    pub created_at: String,
    pub owner_id: String,
    #[serde(default)]
    pub status: ReportStatus,
    pub source: ReportSource,
    pub metrics: ReportMetrics,
    #[serde(default)]
    pub top_overdue: Vec<String>,
}

/// Contents of `reports/index.json`.
pub type ReportIndex = Envelope<ReportSummary>;

/// Request body for generating a report over an explicit range.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateReportRequest {
    /// `YYYY-MM-DD`
    pub start_date: String,
    /// `YYYY-MM-DD`, inclusive
    pub end_date: String,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub date_field: DateField,
}

/// Request body for generating a calendar-month report.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyReportRequest {
    /// Defaults to the current UTC year
    #[serde(default)]
    pub year: Option<i32>,
    /// 1-12, defaults to the current UTC month
    #[serde(default)]
    pub month: Option<u32>,
    #[serde(default)]
    pub owner_id: Option<String>,
}
