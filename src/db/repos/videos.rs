use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    db::error::DbResult,
    models::{NewVideo, Video, VideoCursor},
};

#[async_trait]
pub trait VideoRepo: Send + Sync {
    async fn create(&self, input: NewVideo) -> DbResult<Video>;
    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<Video>>;
    /// A patient's videos, newest first.
    async fn list_by_patient(&self, patient_id: Uuid) -> DbResult<Vec<Video>>;
    async fn count(&self) -> DbResult<i64>;
    /// Fails with `DbError::NotFound` when no row was deleted.
    async fn delete(&self, id: Uuid) -> DbResult<()>;
    /// Videos with `created_at < cutoff`, oldest first, strictly after `after`
    /// in `(created_at, id)` order.
    async fn list_created_before(
        &self,
        cutoff: DateTime<Utc>,
        after: Option<VideoCursor>,
        limit: i64,
    ) -> DbResult<Vec<Video>>;
}
