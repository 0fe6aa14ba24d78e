pub mod blob_storage;
mod clinics;
mod patients;
mod videos;

use std::sync::Arc;

#[cfg(feature = "s3-storage")]
pub use blob_storage::S3BlobStore;
pub use blob_storage::{
    BlobStore, BlobStoreError, BlobStoreResult, FilesystemBlobStore, create_blob_store,
    object_key_from_url,
};
pub use clinics::{ClinicService, ClinicServiceError, ClinicServiceResult, start_of_day};
pub use patients::PatientService;
pub use videos::{
    VideoService, VideoServiceError, VideoServiceResult, VideoUpload, video_object_key,
};

use crate::db::DbPool;

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub clinics: ClinicService,
    pub patients: PatientService,
    pub videos: VideoService,
}

impl Services {
    pub fn new(db: Arc<DbPool>, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            clinics: ClinicService::new(db.clone()),
            patients: PatientService::new(db.clone(), blobs.clone()),
            videos: VideoService::new(db, blobs),
        }
    }
}
