use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::validators::validate_not_blank;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub name: String,
    pub phone: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePatient {
    #[validate(length(max = 255), custom(function = "validate_not_blank"))]
    pub name: String,
    #[validate(length(max = 50), custom(function = "validate_not_blank"))]
    pub phone: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdatePatient {
    #[validate(length(max = 255), custom(function = "validate_not_blank"))]
    pub name: Option<String>,
    #[validate(length(max = 50), custom(function = "validate_not_blank"))]
    pub phone: Option<String>,
}

/// Query string for the patient listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatientSearch {
    /// Case-insensitive match on name, substring match on phone.
    #[serde(default)]
    pub search: Option<String>,
}

impl PatientSearch {
    /// The trimmed term, or `None` when it is absent or blank.
    pub fn term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Whether `patient` matches a search term.
pub fn patient_matches(patient: &Patient, term: &str) -> bool {
    patient.name.to_lowercase().contains(&term.to_lowercase()) || patient.phone.contains(term)
}
