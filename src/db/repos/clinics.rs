use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    db::error::DbResult,
    models::{Clinic, ClinicChanges, ClinicCredentials, NewClinic},
};

#[async_trait]
pub trait ClinicRepo: Send + Sync {
    /// Insert a clinic. A duplicate email yields `DbError::Conflict`.
    async fn create(&self, input: NewClinic) -> DbResult<Clinic>;
    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<Clinic>>;
    /// Lookup for login. `email` must already be normalized.
    async fn get_credentials_by_email(&self, email: &str) -> DbResult<Option<ClinicCredentials>>;
    /// All clinics, newest first.
    async fn list(&self) -> DbResult<Vec<Clinic>>;
    async fn count(&self) -> DbResult<i64>;
    async fn update(&self, id: Uuid, changes: ClinicChanges) -> DbResult<Clinic>;
}
