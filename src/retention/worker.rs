//! Background worker running the video cleanup on a fixed interval.

use tokio_util::sync::CancellationToken;

use super::cleanup::VideoCleanup;
use crate::config::RetentionConfig;

/// Runs the cleanup once, then every `interval_hours`, until `shutdown` fires.
///
/// A run in progress is allowed to finish; the token is only checked while
/// waiting for the next run.
pub async fn start_retention_worker(
    cleanup: VideoCleanup,
    config: RetentionConfig,
    shutdown: CancellationToken,
) {
    if !config.enabled {
        tracing::info!("Retention worker disabled by configuration");
        return;
    }

    tracing::info!(
        interval_hours = config.interval_hours,
        max_age_months = config.max_age_months,
        page_size = config.page_size,
        "Starting retention worker"
    );

    let interval = config.interval();

    loop {
        match cleanup.run().await {
            Ok(report) => {
                if report.total_found > 0 {
                    tracing::info!(
                        total_found = report.total_found,
                        deleted_records = report.deleted_records,
                        deleted_files = report.deleted_files,
                        errors = report.errors.len(),
                        cutoff = %report.cutoff,
                        "Retention run complete"
                    );
                    for error in &report.errors {
                        tracing::warn!(error = %error, "Retention item failed");
                    }
                } else {
                    tracing::debug!(cutoff = %report.cutoff, "Retention run complete, no videos to delete");
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Error running retention");
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.cancelled() => {
                tracing::info!("Retention worker stopped");
                return;
            }
        }
    }
}
