use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use axum_valid::Valid;
use serde::Serialize;
use uuid::Uuid;

use super::get_services;
use crate::{
    AppState,
    auth::Caller,
    models::{CreatePatient, Patient, PatientSearch, UpdatePatient},
    routes::ApiError,
    services::Services,
};

#[derive(Debug, Serialize)]
pub struct PatientListResponse {
    pub data: Vec<Patient>,
}

#[derive(Debug, Serialize)]
pub struct PatientDeleteResponse {
    pub deleted_videos: usize,
}

/// Load a patient and check the caller may see its clinic.
pub(super) async fn load_patient(
    services: &Services,
    caller: &Caller,
    id: Uuid,
) -> Result<Patient, ApiError> {
    let patient = services
        .patients
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Patient '{id}' not found")))?;
    caller.require_clinic_access(patient.clinic_id)?;
    Ok(patient)
}

/// A clinic's patients, newest first, optionally filtered by `?search=`.
#[tracing::instrument(name = "api.patients.list", skip(state, caller), fields(%clinic_id))]
pub async fn list(
    State(state): State<AppState>,
    caller: Caller,
    Path(clinic_id): Path<Uuid>,
    Query(search): Query<PatientSearch>,
) -> Result<Json<PatientListResponse>, ApiError> {
    caller.require_clinic_access(clinic_id)?;
    let services = get_services(&state)?;

    let data = services.patients.list(clinic_id, &search).await?;
    Ok(Json(PatientListResponse { data }))
}

#[tracing::instrument(name = "api.patients.create", skip(state, caller, input), fields(%clinic_id))]
pub async fn create(
    State(state): State<AppState>,
    caller: Caller,
    Path(clinic_id): Path<Uuid>,
    Valid(Json(input)): Valid<Json<CreatePatient>>,
) -> Result<(StatusCode, Json<Patient>), ApiError> {
    caller.require_clinic_access(clinic_id)?;
    let services = get_services(&state)?;

    let patient = services.patients.create(clinic_id, input).await?;
    Ok((StatusCode::CREATED, Json(patient)))
}

#[tracing::instrument(name = "api.patients.get", skip(state, caller), fields(%id))]
pub async fn get(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<Patient>, ApiError> {
    let services = get_services(&state)?;
    Ok(Json(load_patient(services, &caller, id).await?))
}

#[tracing::instrument(name = "api.patients.update", skip(state, caller, input), fields(%id))]
pub async fn update(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Valid(Json(input)): Valid<Json<UpdatePatient>>,
) -> Result<Json<Patient>, ApiError> {
    let services = get_services(&state)?;
    load_patient(services, &caller, id).await?;

    let patient = services.patients.update(id, input).await?;
    Ok(Json(patient))
}

/// Delete a patient together with its videos.
#[tracing::instrument(name = "api.patients.delete", skip(state, caller), fields(%id))]
pub async fn delete(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<PatientDeleteResponse>, ApiError> {
    let services = get_services(&state)?;
    load_patient(services, &caller, id).await?;

    let deleted_videos = services.patients.delete(id).await?;
    Ok(Json(PatientDeleteResponse { deleted_videos }))
}
