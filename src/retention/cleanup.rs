//! Deletion of videos older than the retention window.
//!
//! Candidates are fetched page by page in `(created_at, id)` order. Each
//! video is handled on its own: the stored file is removed first, then the
//! row. A failing item is recorded in the report and the run moves on; only
//! a failing candidate query aborts the run.

use std::{fmt::Display, future::Future, sync::Arc};

use chrono::{DateTime, Months, SecondsFormat, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{
    config::{RetentionConfig, RetentionRetryConfig},
    db::{DbError, VideoRepo},
    models::{Video, VideoCursor},
    services::{BlobStore, BlobStoreError, object_key_from_url},
};

#[derive(Debug, Error)]
pub enum CleanupError {
    /// Listing candidates failed. Nothing after the failing page was touched.
    #[error("{0}")]
    Query(DbError),

    #[error("Cannot compute a cutoff {months} months before {now}")]
    Cutoff { months: u32, now: DateTime<Utc> },
}

/// Outcome of one cleanup run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    pub total_found: usize,
    pub deleted_records: usize,
    pub deleted_files: usize,
    pub errors: Vec<String>,
    pub cutoff: DateTime<Utc>,
}

impl CleanupReport {
    fn empty(cutoff: DateTime<Utc>) -> Self {
        Self {
            total_found: 0,
            deleted_records: 0,
            deleted_files: 0,
            errors: Vec::new(),
            cutoff,
        }
    }

    pub fn message(&self) -> String {
        if self.total_found == 0 {
            "No old videos found".to_string()
        } else {
            format!(
                "Cleanup complete. {} records and {} files removed",
                self.deleted_records, self.deleted_files
            )
        }
    }

    /// JSON body returned to schedulers.
    pub fn to_response(&self) -> CleanupResponse {
        CleanupResponse {
            success: true,
            message: self.message(),
            deleted_records: self.deleted_records,
            deleted_files: self.deleted_files,
            total_found: self.total_found,
            errors: self.errors.clone(),
            cutoff_date: self.cutoff.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupResponse {
    pub success: bool,
    pub message: String,
    pub deleted_records: usize,
    pub deleted_files: usize,
    pub total_found: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    pub cutoff_date: String,
}

/// `now` minus `months` calendar months, clamping the day to the target month's end.
pub fn retention_cutoff(now: DateTime<Utc>, months: u32) -> Option<DateTime<Utc>> {
    now.checked_sub_months(Months::new(months))
}

fn is_transient_db(err: &DbError) -> bool {
    match err {
        DbError::Internal(_) => true,
        #[cfg(any(feature = "database-sqlite", feature = "database-postgres"))]
        DbError::Sqlx(_) => true,
        _ => false,
    }
}

fn is_transient_blob(err: &BlobStoreError) -> bool {
    matches!(err, BlobStoreError::Io(_) | BlobStoreError::S3(_))
}

/// Run `op` until it succeeds, fails permanently, or the attempts run out.
async fn with_retry<T, E, F, Fut>(
    retry: &RetentionRetryConfig,
    what: &str,
    is_transient: fn(&E) -> bool,
    mut op: F,
) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = retry.max_attempts();
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt + 1 < max_attempts && is_transient(&e) => {
                let delay = retry.delay_for_attempt(attempt);
                debug!(
                    what,
                    attempt = attempt + 1,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retrying after transient failure"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Retention job over the video table and its stored files.
#[derive(Clone)]
pub struct VideoCleanup {
    videos: Arc<dyn VideoRepo>,
    blobs: Arc<dyn BlobStore>,
    config: RetentionConfig,
}

impl VideoCleanup {
    pub fn new(
        videos: Arc<dyn VideoRepo>,
        blobs: Arc<dyn BlobStore>,
        config: RetentionConfig,
    ) -> Self {
        Self {
            videos,
            blobs,
            config,
        }
    }

    pub async fn run(&self) -> Result<CleanupReport, CleanupError> {
        self.run_at(Utc::now()).await
    }

    #[instrument(skip(self), fields(max_age_months = self.config.max_age_months))]
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<CleanupReport, CleanupError> {
        let months = self.config.max_age_months;
        let cutoff = retention_cutoff(now, months).ok_or(CleanupError::Cutoff { months, now })?;
        info!(cutoff = %cutoff, "Looking for videos created before cutoff");

        let page_size = i64::from(self.config.page_size);
        let mut report = CleanupReport::empty(cutoff);
        let mut after: Option<VideoCursor> = None;

        loop {
            let page = self
                .fetch_page(cutoff, after, page_size)
                .await
                .map_err(CleanupError::Query)?;
            let Some(last) = page.last() else { break };
            after = Some(VideoCursor::from(last));
            let full_page = page.len() as i64 >= page_size;

            report.total_found += page.len();
            for video in &page {
                self.delete_one(video, &mut report).await;
            }

            if !full_page {
                break;
            }
        }

        if report.total_found == 0 {
            info!("No old videos found");
        } else {
            info!(
                total_found = report.total_found,
                deleted_records = report.deleted_records,
                deleted_files = report.deleted_files,
                errors = report.errors.len(),
                "Video cleanup complete"
            );
        }
        Ok(report)
    }

    async fn fetch_page(
        &self,
        cutoff: DateTime<Utc>,
        after: Option<VideoCursor>,
        limit: i64,
    ) -> Result<Vec<Video>, DbError> {
        with_retry(&self.config.retry, "list videos", is_transient_db, || {
            self.videos.list_created_before(cutoff, after, limit)
        })
        .await
    }

    async fn delete_one(&self, video: &Video, report: &mut CleanupReport) {
        debug!(
            video_id = %video.id,
            title = video.title.as_deref().unwrap_or("untitled"),
            "Deleting video"
        );

        if let Some(key) = video.file_url.as_deref().and_then(object_key_from_url) {
            let keys = [key];
            let removed = with_retry(&self.config.retry, "remove file", is_transient_blob, || {
                self.blobs.remove(&keys)
            })
            .await;
            match removed {
                Ok(()) => report.deleted_files += 1,
                Err(e) => {
                    warn!(video_id = %video.id, key = %keys[0], error = %e, "Failed to remove video file");
                    report.errors.push(storage_error(video.id, &e));
                }
            }
        }

        let deleted = with_retry(&self.config.retry, "delete video", is_transient_db, || {
            self.videos.delete(video.id)
        })
        .await;
        match deleted {
            Ok(()) => report.deleted_records += 1,
            // Removed by a concurrent run or an admin between listing and delete.
            Err(DbError::NotFound) => {
                debug!(video_id = %video.id, "Video row already deleted");
                report.deleted_records += 1;
            }
            Err(e) => {
                warn!(video_id = %video.id, error = %e, "Failed to delete video row");
                report.errors.push(database_error(video.id, &e));
            }
        }
    }
}

fn storage_error(id: Uuid, err: &BlobStoreError) -> String {
    format!("Storage error for {id}: {err}")
}

fn database_error(id: Uuid, err: &DbError) -> String {
    format!("Database error for {id}: {err}")
}
