use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::{PasswordError, hash_password, verify_password},
    db::{DbError, DbPool, DbResult},
    models::{
        Clinic, ClinicChanges, ClinicStats, CreateClinic, NewClinic, PlatformStats, UpdateClinic,
        normalize_email,
    },
};

#[derive(Debug, Error)]
pub enum ClinicServiceError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error(transparent)]
    Password(#[from] PasswordError),
}

pub type ClinicServiceResult<T> = Result<T, ClinicServiceError>;

/// Midnight UTC of the day containing `now`.
pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(chrono::NaiveTime::MIN).and_utc()
}

/// Clinic accounts, login and dashboard counters.
#[derive(Clone)]
pub struct ClinicService {
    db: Arc<DbPool>,
}

impl ClinicService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn create(&self, input: CreateClinic) -> ClinicServiceResult<Clinic> {
        let password_hash = hash_password(&input.password)?;
        let clinic = self
            .db
            .clinics()
            .create(NewClinic {
                name: input.name.trim().to_string(),
                city: input.city.trim().to_string(),
                address: input.address.trim().to_string(),
                phone: input.phone.trim().to_string(),
                email: normalize_email(&input.email),
                password_hash,
            })
            .await?;

        info!(clinic_id = %clinic.id, "Clinic created");
        Ok(clinic)
    }

    pub async fn get(&self, id: Uuid) -> DbResult<Option<Clinic>> {
        self.db.clinics().get_by_id(id).await
    }

    /// All clinics, newest first.
    pub async fn list(&self) -> DbResult<Vec<Clinic>> {
        self.db.clinics().list().await
    }

    /// Apply an edit. A present password is re-hashed; an absent one is kept.
    #[instrument(skip(self, input))]
    pub async fn update(&self, id: Uuid, input: UpdateClinic) -> ClinicServiceResult<Clinic> {
        let password_hash = input.password.as_deref().map(hash_password).transpose()?;
        let trimmed = |value: Option<String>| value.map(|v| v.trim().to_string());

        let clinic = self
            .db
            .clinics()
            .update(
                id,
                ClinicChanges {
                    name: trimmed(input.name),
                    city: trimmed(input.city),
                    address: trimmed(input.address),
                    phone: trimmed(input.phone),
                    email: input.email.as_deref().map(normalize_email),
                    password_hash,
                },
            )
            .await?;

        info!(clinic_id = %clinic.id, "Clinic updated");
        Ok(clinic)
    }

    /// The clinic owning `email` if `password` matches its stored hash.
    #[instrument(skip(self, password))]
    pub async fn authenticate(&self, email: &str, password: &str) -> DbResult<Option<Clinic>> {
        let Some(credentials) = self
            .db
            .clinics()
            .get_credentials_by_email(&normalize_email(email))
            .await?
        else {
            return Ok(None);
        };

        if verify_password(password, &credentials.password_hash) {
            Ok(Some(credentials.clinic))
        } else {
            Ok(None)
        }
    }

    pub async fn stats(&self, clinic_id: Uuid, now: DateTime<Utc>) -> DbResult<ClinicStats> {
        let patients = self.db.patients();
        let total_patients = patients.count_by_clinic(clinic_id, None).await?;
        let patients_today = patients
            .count_by_clinic(clinic_id, Some(start_of_day(now)))
            .await?;
        Ok(ClinicStats {
            total_patients,
            patients_today,
        })
    }

    pub async fn platform_stats(&self) -> DbResult<PlatformStats> {
        Ok(PlatformStats {
            total_clinics: self.db.clinics().count().await?,
            total_patients: self.db.patients().count().await?,
            total_videos: self.db.videos().count().await?,
        })
    }
}
