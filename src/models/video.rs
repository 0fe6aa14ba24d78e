use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata row for an uploaded ultrasound video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Video {
    pub id: Uuid,
    pub patient_id: Uuid,
    /// Copy of the patient's clinic, kept for tenant filtering.
    pub clinic_id: Uuid,
    pub title: Option<String>,
    /// Public URL of the stored object.
    pub file_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewVideo {
    pub patient_id: Uuid,
    pub clinic_id: Uuid,
    pub title: Option<String>,
    pub file_url: Option<String>,
    /// Recording time for imported videos. Defaults to now.
    pub created_at: Option<DateTime<Utc>>,
}

/// Keyset position for paging through videos ordered by `(created_at, id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoCursor {
    pub created_at: DateTime<Utc>,
    pub id: Uuid,
}

impl From<&Video> for VideoCursor {
    fn from(video: &Video) -> Self {
        Self {
            created_at: video.created_at,
            id: video.id,
        }
    }
}
