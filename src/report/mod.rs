//! Report aggregation.
//!
//! Pure functions over a task snapshot: nothing here touches the store or the
//! clock, so the same tasks, range and `now` always yield the same report.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::errors::AppError;
use crate::models::{
    AssigneeBucket, DateField, ReportDetail, ReportFilters, ReportMetrics, ReportPeriod,
    ReportSource, ReportStatus, ReportSummary, ReportTotals, TagBucket, Task, TaskStatus,
};

/// Placeholder owner for reports generated without one.
pub const NO_OWNER: &str = "—";

const TOP_OVERDUE_LIMIT: usize = 10;

/// Inclusive range of UTC calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl ReportRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, AppError> {
        if start > end {
            return Err(AppError::Validation(format!(
                "startDate {start} is after endDate {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Parse two `YYYY-MM-DD` strings.
    pub fn parse(start: &str, end: &str) -> Result<Self, AppError> {
        Self::new(parse_day("startDate", start)?, parse_day("endDate", end)?)
    }

    /// First through last day of a calendar month.
    pub fn monthly(year: i32, month: u32) -> Result<Self, AppError> {
        let invalid = || AppError::Validation(format!("Invalid month: {year}-{month:02}"));
        let start = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        };
        let end = next.and_then(|d| d.pred_opt()).ok_or_else(invalid)?;
        Self::new(start, end)
    }

    /// `R-<YYYYMMDD>-<YYYYMMDD>`
    pub fn report_id(&self) -> String {
        format!(
            "R-{}-{}",
            self.start.format("%Y%m%d"),
            self.end.format("%Y%m%d")
        )
    }

    pub fn title(&self) -> String {
        format!("Report {} — {}", self.start, self.end)
    }

    fn period(&self) -> ReportPeriod {
        ReportPeriod {
            kind: "range".to_string(),
            start_date: self.start.to_string(),
            end_date: self.end.to_string(),
        }
    }

    /// `[start 00:00:00Z, end 23:59:59Z]`
    fn contains(&self, instant: DateTime<Utc>) -> bool {
        let from = self.start.and_hms_opt(0, 0, 0).map(|d| d.and_utc());
        let to = self.end.and_hms_opt(23, 59, 59).map(|d| d.and_utc());
        match (from, to) {
            (Some(from), Some(to)) => instant >= from && instant <= to,
            _ => false,
        }
    }
}

fn parse_day(field: &str, value: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        AppError::Validation(format!("{field} must be YYYY-MM-DD, got {value:?}"))
    })
}

/// Parse a task timestamp. Date-only values (`YYYY-MM-DD`) mean midnight UTC.
pub fn parse_instant(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.len() == 10 {
        return NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|d| d.and_utc());
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Summary for the index plus the full detail document.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub summary: ReportSummary,
    pub detail: ReportDetail,
}

fn selected_date(task: &Task, field: DateField) -> Option<&str> {
    match field {
        DateField::CreatedAt => task.created_at.as_deref(),
        DateField::UpdatedAt => task.updated_at.as_deref(),
        DateField::Due => task.due.as_deref(),
    }
}

fn overdue_since(task: &Task, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if task.status == TaskStatus::Done {
        return None;
    }
    task.due
        .as_deref()
        .and_then(parse_instant)
        .filter(|due| *due < now)
}

/// Aggregate `tasks` over `range`.
pub fn aggregate(
    tasks: &[Task],
    range: &ReportRange,
    date_field: DateField,
    owner_id: Option<&str>,
    now: DateTime<Utc>,
    tasks_path: &str,
) -> Report {
    let picked: Vec<&Task> = tasks
        .iter()
        .filter(|t| {
            selected_date(t, date_field)
                .and_then(parse_instant)
                .is_some_and(|d| range.contains(d))
        })
        .collect();

    let mut by_status: Map<String, Value> = Map::new();
    let mut by_assignee: Vec<AssigneeBucket> = Vec::new();
    let mut assignee_slots: HashMap<String, usize> = HashMap::new();
    let mut by_tag: Vec<TagBucket> = Vec::new();
    let mut tag_slots: HashMap<String, usize> = HashMap::new();
    let mut overdue: Vec<(&Task, DateTime<Utc>)> = Vec::new();
    let mut done_count = 0;

    for &task in &picked {
        let done = task.status == TaskStatus::Done;
        if done {
            done_count += 1;
        }
        let status = task.status.as_str();
        let seen = by_status.get(status).and_then(Value::as_u64).unwrap_or(0);
        by_status.insert(status.to_string(), Value::from(seen + 1));

        let key = task.assignee_key();
        let slot = *assignee_slots.entry(key.to_string()).or_insert_with(|| {
            by_assignee.push(AssigneeBucket {
                key: key.to_string(),
                label: key.to_string(),
                total: 0,
                done: 0,
            });
            by_assignee.len() - 1
        });
        by_assignee[slot].total += 1;
        by_assignee[slot].done += usize::from(done);

        for tag in &task.tags {
            let slot = *tag_slots.entry(tag.clone()).or_insert_with(|| {
                by_tag.push(TagBucket {
                    tag: tag.clone(),
                    total: 0,
                    done: 0,
                });
                by_tag.len() - 1
            });
            by_tag[slot].total += 1;
            by_tag[slot].done += usize::from(done);
        }

        if let Some(due) = overdue_since(task, now) {
            overdue.push((task, due));
        }
    }

    // Stable: equal due dates keep input order.
    overdue.sort_by(|a, b| b.1.cmp(&a.1));
    let top_overdue: Vec<String> = overdue
        .iter()
        .take(TOP_OVERDUE_LIMIT)
        .map(|(t, _)| t.id.clone())
        .collect();

    let owner_id = owner_id
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .unwrap_or(NO_OWNER)
        .to_string();
    let created_at = now.to_rfc3339_opts(SecondsFormat::Millis, true);
    let id = range.report_id();
    let period = range.period();

    let totals = ReportTotals {
        tasks: picked.len(),
        done: done_count,
        overdue: overdue.len(),
    };

    let detail = ReportDetail {
        id: id.clone(),
        period: period.clone(),
        created_at: created_at.clone(),
        owner_id: owner_id.clone(),
        status: ReportStatus::Ready,
        source: ReportSource {
            tasks_path: tasks_path.to_string(),
            filters: ReportFilters {
                start_date: range.start.to_string(),
                end_date: range.end.to_string(),
                date_field,
            },
        },
        metrics: ReportMetrics {
            tasks_total: totals.tasks,
            tasks_done: totals.done,
            tasks_overdue: totals.overdue,
            by_status,
            by_assignee,
            by_tag,
        },
        top_overdue,
    };

    let summary = ReportSummary {
        id,
        period,
        title: range.title(),
        created_at,
        owner_id,
        status: ReportStatus::Ready,
        totals,
        extra: Map::new(),
    };

    Report { summary, detail }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        parse_instant("2025-11-01T12:00:00Z").unwrap()
    }

    fn tasks(value: serde_json::Value) -> Vec<Task> {
        serde_json::from_value(value).unwrap()
    }

    fn october() -> ReportRange {
        ReportRange::parse("2025-10-01", "2025-10-31").unwrap()
    }

    #[test]
    fn test_october_scenario() {
        let tasks = tasks(json!([
            {"id": "1", "title": "a", "status": "done", "createdAt": "2025-10-01"},
            {"id": "2", "title": "b", "status": "todo", "createdAt": "2025-10-15", "due": "2025-09-01"}
        ]));

        let report = aggregate(&tasks, &october(), DateField::CreatedAt, None, now(), "public/data/tasks.json");
        let metrics = &report.detail.metrics;

        assert_eq!(metrics.tasks_total, 2);
        assert_eq!(metrics.tasks_done, 1);
        assert_eq!(metrics.tasks_overdue, 1);
        assert_eq!(report.detail.top_overdue, vec!["2".to_string()]);
        assert_eq!(metrics.by_status.get("done"), Some(&json!(1)));
        assert_eq!(metrics.by_status.get("todo"), Some(&json!(1)));
        assert_eq!(report.summary.totals, ReportTotals { tasks: 2, done: 1, overdue: 1 });
    }

    #[test]
    fn test_identity_fields() {
        let report = aggregate(&[], &october(), DateField::CreatedAt, Some("  "), now(), "tasks.json");

        assert_eq!(report.summary.id, "R-20251001-20251031");
        assert_eq!(report.summary.title, "Report 2025-10-01 — 2025-10-31");
        assert_eq!(report.summary.owner_id, NO_OWNER);
        assert_eq!(report.summary.created_at, "2025-11-01T12:00:00.000Z");
        assert_eq!(report.detail.period.kind, "range");
        assert_eq!(report.detail.source.filters.date_field, DateField::CreatedAt);
    }

    #[test]
    fn test_range_bounds_are_inclusive() {
        let tasks = tasks(json!([
            {"id": "before", "title": "x", "createdAt": "2025-09-30T23:59:59Z"},
            {"id": "first", "title": "x", "createdAt": "2025-10-01T00:00:00Z"},
            {"id": "last", "title": "x", "createdAt": "2025-10-31T23:59:59Z"},
            {"id": "after", "title": "x", "createdAt": "2025-11-01T00:00:00Z"},
            {"id": "undated", "title": "x"},
            {"id": "garbage", "title": "x", "createdAt": "yesterday"}
        ]));

        let report = aggregate(&tasks, &october(), DateField::CreatedAt, None, now(), "tasks.json");
        assert_eq!(report.detail.metrics.tasks_total, 2);
    }

    #[test]
    fn test_date_field_selection() {
        let tasks = tasks(json!([
            {"id": "1", "title": "x", "createdAt": "2025-01-01", "due": "2025-10-10", "updatedAt": "2025-12-01T00:00:00Z"}
        ]));

        let by_due = aggregate(&tasks, &october(), DateField::Due, None, now(), "tasks.json");
        assert_eq!(by_due.detail.metrics.tasks_total, 1);

        let by_updated = aggregate(&tasks, &october(), DateField::UpdatedAt, None, now(), "tasks.json");
        assert_eq!(by_updated.detail.metrics.tasks_total, 0);
    }

    #[test]
    fn test_buckets_in_first_seen_order() {
        let tasks = tasks(json!([
            {"id": "1", "title": "x", "createdAt": "2025-10-02", "assigneeId": "zoe", "tags": ["ui", "bug"]},
            {"id": "2", "title": "x", "createdAt": "2025-10-03", "assignee": "Ann", "status": "done", "tags": ["bug"]},
            {"id": "3", "title": "x", "createdAt": "2025-10-04"},
            {"id": "4", "title": "x", "createdAt": "2025-10-05", "assigneeId": "zoe", "status": "done"}
        ]));

        let report = aggregate(&tasks, &october(), DateField::CreatedAt, None, now(), "tasks.json");
        let metrics = report.detail.metrics;

        let keys: Vec<_> = metrics.by_assignee.iter().map(|b| b.key.as_str()).collect();
        assert_eq!(keys, vec!["zoe", "Ann", "unassigned"]);
        assert_eq!(metrics.by_assignee[0].total, 2);
        assert_eq!(metrics.by_assignee[0].done, 1);

        let tags: Vec<_> = metrics.by_tag.iter().map(|b| (b.tag.as_str(), b.total, b.done)).collect();
        assert_eq!(tags, vec![("ui", 1, 0), ("bug", 2, 1)]);

        let statuses: Vec<_> = metrics.by_status.iter().map(|(k, v)| (k.as_str(), v.as_u64())).collect();
        assert_eq!(statuses, vec![("todo", Some(2)), ("done", Some(2))]);
    }

    #[test]
    fn test_top_overdue_order_and_limit() {
        let mut rows = Vec::new();
        for i in 0..12 {
            rows.push(json!({
                "id": format!("t{i}"),
                "title": "x",
                "createdAt": "2025-10-10",
                "due": format!("2025-10-{:02}", 10 + i)
            }));
        }
        // Same due date as t11, later in input order.
        rows.push(json!({"id": "tie", "title": "x", "createdAt": "2025-10-10", "due": "2025-10-21"}));
        rows.push(json!({"id": "future", "title": "x", "createdAt": "2025-10-10", "due": "2026-01-01"}));
        rows.push(json!({"id": "closed", "title": "x", "createdAt": "2025-10-10", "due": "2025-10-01", "status": "done"}));

        let report = aggregate(&tasks(json!(rows)), &october(), DateField::CreatedAt, None, now(), "tasks.json");

        assert_eq!(report.detail.metrics.tasks_overdue, 13);
        assert_eq!(report.detail.top_overdue.len(), 10);
        assert_eq!(report.detail.top_overdue[0], "t11");
        assert_eq!(report.detail.top_overdue[1], "tie");
        assert_eq!(report.detail.top_overdue[2], "t10");
    }

    #[test]
    fn test_aggregation_is_deterministic() {
        let tasks = tasks(json!([
            {"id": "1", "title": "x", "createdAt": "2025-10-02", "assigneeId": "a", "tags": ["t"], "due": "2025-10-05"},
            {"id": "2", "title": "x", "createdAt": "2025-10-03", "assigneeId": "b", "status": "in_progress"}
        ]));
        let first = aggregate(&tasks, &october(), DateField::CreatedAt, Some("me"), now(), "tasks.json");
        let second = aggregate(&tasks, &october(), DateField::CreatedAt, Some("me"), now(), "tasks.json");
        assert_eq!(first, second);
    }

    #[test]
    fn test_start_after_end_is_rejected() {
        let err = ReportRange::parse("2025-10-31", "2025-10-01").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = ReportRange::parse("2025-13-01", "2025-12-31").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_monthly_ranges() {
        let feb = ReportRange::monthly(2024, 2).unwrap();
        assert_eq!(feb.report_id(), "R-20240201-20240229");

        let dec = ReportRange::monthly(2025, 12).unwrap();
        assert_eq!(dec.report_id(), "R-20251201-20251231");

        assert!(ReportRange::monthly(2025, 13).is_err());
        assert!(ReportRange::monthly(2025, 0).is_err());
    }

    #[test]
    fn test_parse_instant() {
        assert_eq!(
            parse_instant("2025-10-01"),
            parse_instant("2025-10-01T00:00:00.000Z")
        );
        assert!(parse_instant("2025-10-01T03:00:00+03:00").is_some());
        assert!(parse_instant("").is_none());
        assert!(parse_instant("10/01/2025").is_none());
    }
}
