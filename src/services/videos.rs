use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::blob_storage::{BlobStore, BlobStoreError, object_key_from_url};
use crate::{
    db::{DbError, DbPool, DbResult},
    models::{NewVideo, Patient, Video},
};

#[derive(Debug, Error)]
pub enum VideoServiceError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Storage error: {0}")]
    Storage(#[from] BlobStoreError),

    #[error("Video not found: {0}")]
    NotFound(Uuid),

    #[error("Uploaded file is empty")]
    EmptyFile,
}

pub type VideoServiceResult<T> = Result<T, VideoServiceError>;

/// A received upload.
#[derive(Debug, Clone)]
pub struct VideoUpload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub content: Bytes,
    pub title: Option<String>,
}

/// Extension of `file_name`, lowercased and reduced to ASCII alphanumerics.
fn file_extension(file_name: Option<&str>) -> String {
    file_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| {
            ext.chars()
                .filter(char::is_ascii_alphanumeric)
                .collect::<String>()
                .to_ascii_lowercase()
        })
        .filter(|ext| !ext.is_empty())
        .unwrap_or_else(|| "bin".to_string())
}

/// Object key for an upload: `{patient_id}-{unix_millis}.{ext}`.
pub fn video_object_key(patient_id: Uuid, file_name: Option<&str>, now: DateTime<Utc>) -> String {
    format!(
        "{}-{}.{}",
        patient_id,
        now.timestamp_millis(),
        file_extension(file_name)
    )
}

/// Ultrasound videos attached to patients.
#[derive(Clone)]
pub struct VideoService {
    db: Arc<DbPool>,
    blobs: Arc<dyn BlobStore>,
}

impl VideoService {
    pub fn new(db: Arc<DbPool>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { db, blobs }
    }

    pub fn storage_backend_name(&self) -> &'static str {
        self.blobs.backend_name()
    }

    /// A patient's videos, newest first.
    pub async fn list_by_patient(&self, patient_id: Uuid) -> DbResult<Vec<Video>> {
        self.db.videos().list_by_patient(patient_id).await
    }

    pub async fn get(&self, id: Uuid) -> DbResult<Option<Video>> {
        self.db.videos().get_by_id(id).await
    }

    /// Store the file, then record it.
    ///
    /// If the row cannot be written the stored file is removed again.
    #[instrument(skip(self, patient, upload), fields(
        patient_id = %patient.id,
        size = upload.content.len(),
        backend = %self.blobs.backend_name()
    ))]
    pub async fn upload(&self, patient: &Patient, upload: VideoUpload) -> VideoServiceResult<Video> {
        if upload.content.is_empty() {
            return Err(VideoServiceError::EmptyFile);
        }

        let key = video_object_key(patient.id, upload.file_name.as_deref(), Utc::now());
        let content_type = upload
            .content_type
            .as_deref()
            .unwrap_or("application/octet-stream");
        let file_url = self.blobs.upload(&key, upload.content, content_type).await?;

        let title = upload
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        let result = self
            .db
            .videos()
            .create(NewVideo {
                patient_id: patient.id,
                clinic_id: patient.clinic_id,
                title,
                file_url: Some(file_url),
                created_at: None,
            })
            .await;

        match result {
            Ok(video) => {
                info!(video_id = %video.id, key, "Video uploaded");
                Ok(video)
            }
            Err(e) => {
                if let Err(cleanup) = self.blobs.remove(std::slice::from_ref(&key)).await {
                    warn!(key, error = %cleanup, "Failed to remove orphaned upload");
                }
                Err(e.into())
            }
        }
    }

    /// Remove the stored file, then the row. A storage failure keeps the row.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> VideoServiceResult<Video> {
        let video = self
            .db
            .videos()
            .get_by_id(id)
            .await?
            .ok_or(VideoServiceError::NotFound(id))?;

        if let Some(key) = video.file_url.as_deref().and_then(object_key_from_url) {
            self.blobs.remove(&[key]).await?;
        }

        self.db.videos().delete(id).await?;
        info!(video_id = %id, "Video deleted");
        Ok(video)
    }
}
