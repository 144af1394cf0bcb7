//! Generated reports: detail documents under `reports/` plus `reports/index.json`.

use chrono::{DateTime, Datelike, Utc};

use super::DataPaths;
use crate::errors::AppError;
use crate::models::{
    DateField, GenerateReportRequest, MonthlyReportRequest, ReportDetail, ReportIndex,
    ReportSummary, Task,
};
use crate::report::{self, ReportRange};
use crate::sync::{CollectionSync, PathLocks};

#[derive(Clone)]
pub struct ReportsApi {
    sync: CollectionSync,
    locks: PathLocks,
    paths: DataPaths,
}

impl ReportsApi {
    pub fn new(sync: CollectionSync, locks: PathLocks, paths: &DataPaths) -> Self {
        Self {
            sync,
            locks,
            paths: paths.clone(),
        }
    }

    /// Index entries, newest first.
    pub async fn list(&self) -> Result<Vec<ReportSummary>, AppError> {
        let index = self.sync.read::<ReportIndex>(&self.paths.reports_index()).await?;
        Ok(index.items.items)
    }

    pub async fn get(&self, id: &str) -> Result<ReportDetail, AppError> {
        check_id(id)?;
        self.sync
            .read::<Option<ReportDetail>>(&self.paths.report(id))
            .await?
            .items
            .ok_or_else(|| not_found(id))
    }

    /// Aggregate tasks over an explicit range and store the result.
    pub async fn generate(
        &self,
        request: GenerateReportRequest,
        now: DateTime<Utc>,
    ) -> Result<ReportSummary, AppError> {
        let range = ReportRange::parse(&request.start_date, &request.end_date)?;
        self.generate_range(range, request.date_field, request.owner_id.as_deref(), now)
            .await
    }

    /// Report over one calendar month, by creation date. Year and month
    /// default to those of `now`.
    pub async fn generate_monthly(
        &self,
        request: MonthlyReportRequest,
        now: DateTime<Utc>,
    ) -> Result<ReportSummary, AppError> {
        let range = ReportRange::monthly(
            request.year.unwrap_or_else(|| now.year()),
            request.month.unwrap_or_else(|| now.month()),
        )?;
        self.generate_range(range, DateField::CreatedAt, request.owner_id.as_deref(), now)
            .await
    }

    async fn generate_range(
        &self,
        range: ReportRange,
        date_field: DateField,
        owner_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ReportSummary, AppError> {
        let tasks_path = self.paths.tasks();
        let tasks = self.sync.read::<Vec<Task>>(&tasks_path).await?.items;
        let report = report::aggregate(&tasks, &range, date_field, owner_id, now, &tasks_path);
        let id = report.summary.id.clone();

        let detail_path = self.paths.report(&id);
        {
            let _guard = self.locks.lock(&detail_path).await;
            let detail = report.detail;
            self.sync
                .mutate(
                    &detail_path,
                    &format!("reports: add {id}"),
                    move |_: Option<ReportDetail>| Ok(Some(detail.clone())),
                )
                .await?;
        }

        let index_path = self.paths.reports_index();
        let _guard = self.locks.lock(&index_path).await;
        let summary = report.summary.clone();
        self.sync
            .mutate(
                &index_path,
                &format!("reports: update index {id}"),
                move |mut index: ReportIndex| {
                    index.items.retain(|s| s.id != summary.id);
                    index.items.insert(0, summary.clone());
                    Ok(index)
                },
            )
            .await?;

        tracing::info!(
            id = %id,
            tasks = report.summary.totals.tasks,
            overdue = report.summary.totals.overdue,
            "report generated"
        );
        Ok(report.summary)
    }

    /// Delete the detail document and drop the index entry.
    pub async fn remove(&self, id: &str) -> Result<(), AppError> {
        check_id(id)?;

        let detail_path = self.paths.report(id);
        let detail_removed = {
            let _guard = self.locks.lock(&detail_path).await;
            match self.sync.delete(&detail_path, &format!("reports: remove {id}")).await {
                Ok(()) => true,
                Err(AppError::NotFound(_)) => false,
                Err(e) => return Err(e),
            }
        };

        let index_path = self.paths.reports_index();
        let _guard = self.locks.lock(&index_path).await;
        let dropped = self
            .sync
            .mutate(
                &index_path,
                &format!("reports: update index {id}"),
                |mut index: ReportIndex| {
                    let before = index.items.len();
                    index.items.retain(|s| s.id != id);
                    if index.items.len() == before {
                        return Err(not_found(id));
                    }
                    Ok(index)
                },
            )
            .await;

        match dropped {
            Ok(_) => Ok(()),
            Err(AppError::NotFound(_)) if detail_removed => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Report ids become file names, so only `[A-Za-z0-9-]` is accepted.
fn check_id(id: &str) -> Result<(), AppError> {
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(AppError::Validation(format!("Invalid report id: {id:?}")));
    }
    Ok(())
}

fn not_found(id: &str) -> AppError {
    AppError::NotFound(format!("Report {id} not found"))
}
