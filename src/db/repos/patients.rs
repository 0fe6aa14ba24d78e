use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    db::error::DbResult,
    models::{CreatePatient, Patient, UpdatePatient, Video},
};

#[async_trait]
pub trait PatientRepo: Send + Sync {
    async fn create(&self, clinic_id: Uuid, input: CreatePatient) -> DbResult<Patient>;
    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<Patient>>;
    /// A clinic's patients, newest first.
    async fn list_by_clinic(&self, clinic_id: Uuid) -> DbResult<Vec<Patient>>;
    /// Patients of a clinic, optionally only those created at or after `since`.
    async fn count_by_clinic(
        &self,
        clinic_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> DbResult<i64>;
    async fn count(&self) -> DbResult<i64>;
    async fn update(&self, id: Uuid, input: UpdatePatient) -> DbResult<Patient>;
    /// Delete the patient's videos and then the patient in one transaction.
    ///
    /// Returns the deleted video rows so their stored files can be removed.
    /// Fails with `DbError::NotFound` when the patient does not exist, in
    /// which case nothing is deleted.
    async fn delete_with_videos(&self, id: Uuid) -> DbResult<Vec<Video>>;
}
