use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::validators::validate_not_blank;

/// A tenant clinic. The password hash is deliberately not part of this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clinic {
    pub id: Uuid,
    pub name: String,
    pub city: String,
    pub address: String,
    pub phone: String,
    /// Login key, unique across clinics.
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A clinic together with its stored argon2 hash. Only used by login.
#[derive(Debug, Clone)]
pub struct ClinicCredentials {
    pub clinic: Clinic,
    pub password_hash: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateClinic {
    #[validate(length(max = 255), custom(function = "validate_not_blank"))]
    pub name: String,
    #[validate(length(max = 255), custom(function = "validate_not_blank"))]
    pub city: String,
    #[validate(length(max = 500), custom(function = "validate_not_blank"))]
    pub address: String,
    #[validate(length(max = 50), custom(function = "validate_not_blank"))]
    pub phone: String,
    #[validate(email, length(max = 255))]
    pub email: String,
    /// Plaintext password; hashed before it reaches the store.
    #[validate(length(min = 6, max = 128))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateClinic {
    #[validate(length(max = 255), custom(function = "validate_not_blank"))]
    pub name: Option<String>,
    #[validate(length(max = 255), custom(function = "validate_not_blank"))]
    pub city: Option<String>,
    #[validate(length(max = 500), custom(function = "validate_not_blank"))]
    pub address: Option<String>,
    #[validate(length(max = 50), custom(function = "validate_not_blank"))]
    pub phone: Option<String>,
    #[validate(email, length(max = 255))]
    pub email: Option<String>,
    /// New plaintext password. Left unchanged when absent.
    #[validate(length(min = 6, max = 128))]
    pub password: Option<String>,
}

/// Row to insert, with the password already hashed.
#[derive(Debug, Clone)]
pub struct NewClinic {
    pub name: String,
    pub city: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub password_hash: String,
}

/// Column changes for an update; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct ClinicChanges {
    pub name: Option<String>,
    pub city: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
}

/// Login form.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(custom(function = "validate_not_blank"))]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Per-clinic dashboard counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClinicStats {
    pub total_patients: i64,
    /// Patients created since midnight UTC.
    pub patients_today: i64,
}

/// Admin dashboard counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlatformStats {
    pub total_clinics: i64,
    pub total_patients: i64,
    pub total_videos: i64,
}

/// Canonical form of a login email.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
