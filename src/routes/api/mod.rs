//! JSON API consumed by the clinic and admin front end.

pub mod auth;
pub mod clinics;
pub mod patients;
pub mod session;
pub mod videos;

use axum::{
    Router,
    routing::{delete, get, post},
};

use super::ApiError;
use crate::{AppState, services::Services};

pub(crate) fn get_services(state: &AppState) -> Result<&Services, ApiError> {
    state.services.as_ref().ok_or(ApiError::DatabaseRequired)
}

pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Login and logout
        .route("/auth/clinic/login", post(auth::clinic_login))
        .route("/auth/admin/login", post(auth::admin_login))
        .route("/auth/admin/logout", post(auth::admin_logout))
        // Navigation state
        .route("/session", get(session::resolve))
        .route("/session/logout", post(session::logout))
        .route("/session/view-as", delete(session::end_view_as))
        .route("/session/view-as/{clinic_id}", post(session::begin_view_as))
        // Clinics
        .route("/stats", get(clinics::platform_stats))
        .route("/clinics", get(clinics::list).post(clinics::create))
        .route("/clinics/{id}", get(clinics::get).patch(clinics::update))
        .route("/clinics/{id}/stats", get(clinics::stats))
        // Patients
        .route(
            "/clinics/{clinic_id}/patients",
            get(patients::list).post(patients::create),
        )
        .route(
            "/patients/{id}",
            get(patients::get)
                .patch(patients::update)
                .delete(patients::delete),
        )
        // Videos
        .route(
            "/patients/{id}/videos",
            get(videos::list).post(videos::upload),
        )
        .route("/videos/{id}", delete(videos::delete))
        // Reached through the QR code, no login
        .route("/public/patients/{id}", get(super::public::patient_page))
        .route("/public/patients/{id}/card", get(super::public::card))
}
