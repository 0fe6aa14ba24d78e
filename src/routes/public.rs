//! Pages reached through a patient's QR code. No login.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ApiError, api::get_services};
use crate::{
    AppState,
    models::{Patient, Video},
    services::Services,
};

#[derive(Debug, Default, Deserialize)]
pub struct PublicPageQuery {
    /// `accepted` once the visitor agreed to the privacy notice.
    #[serde(default)]
    pub consent: Option<String>,
}

impl PublicPageQuery {
    fn accepted(&self) -> bool {
        self.consent.as_deref() == Some("accepted")
    }
}

#[derive(Debug, Serialize)]
pub struct PublicVideo {
    pub id: Uuid,
    pub title: Option<String>,
    pub file_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Video> for PublicVideo {
    fn from(video: Video) -> Self {
        Self {
            id: video.id,
            title: video.title,
            file_url: video.file_url,
            created_at: video.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PublicPatientPage {
    ConsentRequired {
        patient_name: String,
        clinic_name: String,
    },
    Ready {
        patient_name: String,
        clinic_name: String,
        videos: Vec<PublicVideo>,
    },
    NotFound,
}

impl IntoResponse for PublicPatientPage {
    fn into_response(self) -> Response {
        let status = match self {
            PublicPatientPage::NotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::OK,
        };
        (status, Json(self)).into_response()
    }
}

/// Data for the printable QR card.
#[derive(Debug, Serialize)]
pub struct PrintableCard {
    pub patient_name: String,
    pub clinic_name: String,
    pub public_url: String,
    pub qr_code_url: String,
}

/// The patient for `id`, if `id` is a UUID naming one.
async fn find_patient(services: &Services, id: &str) -> Result<Option<Patient>, ApiError> {
    let Ok(id) = Uuid::parse_str(id) else {
        return Ok(None);
    };
    Ok(services.patients.get(id).await?)
}

async fn clinic_name(state: &AppState, services: &Services, patient: &Patient) -> Result<String, ApiError> {
    Ok(services
        .clinics
        .get(patient.clinic_id)
        .await?
        .map(|c| c.name)
        .unwrap_or_else(|| state.config.public.fallback_clinic_name.clone()))
}

/// Public patient page. Videos are only listed after consent.
#[tracing::instrument(name = "public.patient_page", skip(state))]
pub async fn patient_page(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PublicPageQuery>,
) -> Result<PublicPatientPage, ApiError> {
    let services = get_services(&state)?;
    let Some(patient) = find_patient(services, &id).await? else {
        return Ok(PublicPatientPage::NotFound);
    };
    let clinic_name = clinic_name(&state, services, &patient).await?;

    if !query.accepted() {
        return Ok(PublicPatientPage::ConsentRequired {
            patient_name: patient.name,
            clinic_name,
        });
    }

    let videos = services
        .videos
        .list_by_patient(patient.id)
        .await?
        .into_iter()
        .map(PublicVideo::from)
        .collect();

    Ok(PublicPatientPage::Ready {
        patient_name: patient.name,
        clinic_name,
        videos,
    })
}

#[tracing::instrument(name = "public.card", skip(state))]
pub async fn card(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PrintableCard>, ApiError> {
    let services = get_services(&state)?;
    let patient = find_patient(services, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Patient '{id}' not found")))?;
    let clinic_name = clinic_name(&state, services, &patient).await?;

    let public_url = format!(
        "{}/paciente/{}",
        state.config.server.public_base_url(),
        patient.id
    );
    let qr_code_url = state.config.public.qr_code_url(&public_url);

    Ok(Json(PrintableCard {
        patient_name: patient.name,
        clinic_name,
        public_url,
        qr_code_url,
    }))
}
