use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use axum_valid::Valid;
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use super::get_services;
use crate::{
    AppState,
    auth::Caller,
    models::{Clinic, ClinicStats, CreateClinic, PlatformStats, UpdateClinic},
    routes::ApiError,
};

#[derive(Debug, Serialize)]
pub struct ClinicListResponse {
    pub data: Vec<Clinic>,
}

/// Register a clinic. Admin only.
#[tracing::instrument(name = "api.clinics.create", skip(state, caller, input))]
pub async fn create(
    State(state): State<AppState>,
    caller: Caller,
    Valid(Json(input)): Valid<Json<CreateClinic>>,
) -> Result<(StatusCode, Json<Clinic>), ApiError> {
    caller.require_admin()?;
    let services = get_services(&state)?;

    let clinic = services.clinics.create(input).await?;
    Ok((StatusCode::CREATED, Json(clinic)))
}

/// All clinics, newest first. Admin only.
#[tracing::instrument(name = "api.clinics.list", skip(state, caller))]
pub async fn list(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<ClinicListResponse>, ApiError> {
    caller.require_admin()?;
    let services = get_services(&state)?;

    let data = services.clinics.list().await?;
    Ok(Json(ClinicListResponse { data }))
}

#[tracing::instrument(name = "api.clinics.get", skip(state, caller), fields(%id))]
pub async fn get(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<Clinic>, ApiError> {
    caller.require_clinic_access(id)?;
    let services = get_services(&state)?;

    let clinic = services
        .clinics
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Clinic '{id}' not found")))?;
    Ok(Json(clinic))
}

/// Edit a clinic. A present password is re-hashed. Admin only.
#[tracing::instrument(name = "api.clinics.update", skip(state, caller, input), fields(%id))]
pub async fn update(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Valid(Json(input)): Valid<Json<UpdateClinic>>,
) -> Result<Json<Clinic>, ApiError> {
    caller.require_admin()?;
    let services = get_services(&state)?;

    let clinic = services.clinics.update(id, input).await?;
    Ok(Json(clinic))
}

/// Dashboard counters of one clinic.
#[tracing::instrument(name = "api.clinics.stats", skip(state, caller), fields(%id))]
pub async fn stats(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<ClinicStats>, ApiError> {
    caller.require_clinic_access(id)?;
    let services = get_services(&state)?;

    let stats = services.clinics.stats(id, Utc::now()).await?;
    Ok(Json(stats))
}

/// Platform-wide counters. Admin only.
#[tracing::instrument(name = "api.clinics.platform_stats", skip(state, caller))]
pub async fn platform_stats(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<PlatformStats>, ApiError> {
    caller.require_admin()?;
    let services = get_services(&state)?;

    let stats = services.clinics.platform_stats().await?;
    Ok(Json(stats))
}
