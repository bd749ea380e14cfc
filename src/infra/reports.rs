//! Sales report files and the background job that produces them.

use std::path::{Path, PathBuf};
use std::time::Duration;

use time::{OffsetDateTime, macros::format_description};
use tokio::{fs, task::JoinHandle};
use tracing::{error, info};

use crate::application::reports::ReportService;
use crate::domain::reports::SalesReport;

use super::error::InfraError;

/// Writes reports as `report_<YYYYMMDDhhmmss>.json` under one directory.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    dir: PathBuf,
}

impl ReportWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, timestamp: OffsetDateTime) -> Result<PathBuf, InfraError> {
        let stamp = timestamp
            .format(format_description!(
                "[year][month][day][hour][minute][second]"
            ))
            .map_err(|err| InfraError::configuration(format!("bad report timestamp: {err}")))?;
        Ok(self.dir.join(format!("report_{stamp}.json")))
    }

    pub async fn write(&self, report: &SalesReport) -> Result<PathBuf, InfraError> {
        fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(report.timestamp)?;
        let body = serde_json::to_vec_pretty(report)?;
        fs::write(&path, body).await?;
        Ok(path)
    }
}

/// Generate and write one report, logging the outcome.
pub async fn run_once(service: &ReportService, writer: &ReportWriter) -> Result<PathBuf, InfraError> {
    let report = service
        .generate(OffsetDateTime::now_utc())
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;
    let path = writer.write(&report).await?;

    info!(
        target = "bookstore::reports",
        path = %path.display(),
        total_orders = report.total_orders,
        total_revenue = report.total_revenue,
        "Sales report written"
    );
    Ok(path)
}

/// Produce a report every `interval` until the handle is aborted. Failures
/// are logged and the next tick proceeds as usual.
pub fn spawn_report_job(
    service: ReportService,
    writer: ReportWriter,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(err) = run_once(&service, &writer).await {
                error!(
                    target = "bookstore::reports",
                    error = %err,
                    "Sales report failed"
                );
            }
        }
    })
}
