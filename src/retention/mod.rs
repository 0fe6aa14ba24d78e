//! Scheduled deletion of old videos.
//!
//! Videos older than `retention.max_age_months` calendar months are deleted
//! together with their stored files. The same job backs the background
//! worker, the `cleanup` CLI command and the HTTP trigger.

mod cleanup;
mod worker;

pub use cleanup::{CleanupError, CleanupReport, CleanupResponse, VideoCleanup, retention_cutoff};
pub use worker::start_retention_worker;
