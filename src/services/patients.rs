use std::sync::Arc;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::blob_storage::{BlobStore, object_key_from_url};
use crate::{
    db::{DbPool, DbResult},
    models::{CreatePatient, Patient, PatientSearch, UpdatePatient, patient_matches},
};

/// Patient records of a clinic.
#[derive(Clone)]
pub struct PatientService {
    db: Arc<DbPool>,
    blobs: Arc<dyn BlobStore>,
}

impl PatientService {
    pub fn new(db: Arc<DbPool>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { db, blobs }
    }

    /// A clinic's patients, newest first, filtered by the search term if any.
    pub async fn list(&self, clinic_id: Uuid, search: &PatientSearch) -> DbResult<Vec<Patient>> {
        let patients = self.db.patients().list_by_clinic(clinic_id).await?;
        Ok(match search.term() {
            Some(term) => patients
                .into_iter()
                .filter(|p| patient_matches(p, term))
                .collect(),
            None => patients,
        })
    }

    #[instrument(skip(self, input))]
    pub async fn create(&self, clinic_id: Uuid, input: CreatePatient) -> DbResult<Patient> {
        let patient = self
            .db
            .patients()
            .create(
                clinic_id,
                CreatePatient {
                    name: input.name.trim().to_string(),
                    phone: input.phone.trim().to_string(),
                },
            )
            .await?;
        info!(patient_id = %patient.id, "Patient created");
        Ok(patient)
    }

    pub async fn get(&self, id: Uuid) -> DbResult<Option<Patient>> {
        self.db.patients().get_by_id(id).await
    }

    pub async fn update(&self, id: Uuid, input: UpdatePatient) -> DbResult<Patient> {
        self.db
            .patients()
            .update(
                id,
                UpdatePatient {
                    name: input.name.map(|v| v.trim().to_string()),
                    phone: input.phone.map(|v| v.trim().to_string()),
                },
            )
            .await
    }

    /// Delete the patient and its videos, then their stored files.
    ///
    /// The rows go in one transaction. File removal happens afterwards and
    /// only logs on failure. Returns the number of videos deleted.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> DbResult<usize> {
        let videos = self.db.patients().delete_with_videos(id).await?;

        let keys: Vec<String> = videos
            .iter()
            .filter_map(|v| v.file_url.as_deref())
            .filter_map(object_key_from_url)
            .collect();

        if !keys.is_empty()
            && let Err(e) = self.blobs.remove(&keys).await
        {
            warn!(
                patient_id = %id,
                error = %e,
                count = keys.len(),
                "Failed to remove video files of deleted patient"
            );
        }

        info!(patient_id = %id, videos = videos.len(), "Patient deleted");
        Ok(videos.len())
    }
}
