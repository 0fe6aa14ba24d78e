use axum::{Json, extract::State};
use axum_valid::Valid;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::get_services;
use crate::{
    AppState,
    auth::{
        AuthError, ClinicSession, Resolver, Sessions,
        resolver::{ADMIN_DASHBOARD, CLINIC_DASHBOARD, ROOT_PATH},
        sign_in_admin, sign_out_admin, verify_password,
    },
    models::{LoginRequest, normalize_email},
    routes::ApiError,
};


#[derive(Debug, Serialize)]
pub struct ClinicLoginResponse {
    pub clinic: ClinicSession,
    pub redirect_to: &'static str,
}

#[derive(Debug, Serialize)]
pub struct AdminLoginResponse {
    pub email: String,
    pub expires_at: DateTime<Utc>,
    pub redirect_to: &'static str,
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub redirect_to: &'static str,
}

/// Log a clinic in and persist its session.
#[tracing::instrument(name = "api.auth.clinic_login", skip(state, store, input))]
pub async fn clinic_login(
    State(state): State<AppState>,
    Sessions(store): Sessions,
    Valid(Json(input)): Valid<Json<LoginRequest>>,
) -> Result<Json<ClinicLoginResponse>, ApiError> {
    let services = get_services(&state)?;

    let clinic = services
        .clinics
        .authenticate(&input.email, &input.password)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    let expires_at = Utc::now() + Duration::days(state.config.auth.clinic_session_days);
    let session = ClinicSession::new(&clinic, expires_at);
    Resolver::new(&store)
        .login(&session)
        .map_err(|e| AuthError::Internal(e.to_string()))?;

    tracing::info!(clinic_id = %clinic.id, "Clinic logged in");
    Ok(Json(ClinicLoginResponse {
        clinic: session,
        redirect_to: CLINIC_DASHBOARD,
    }))
}

/// Log the platform admin in against the configured credentials.
#[tracing::instrument(name = "api.auth.admin_login", skip(state, store, input))]
pub async fn admin_login(
    State(state): State<AppState>,
    Sessions(store): Sessions,
    Valid(Json(input)): Valid<Json<LoginRequest>>,
) -> Result<Json<AdminLoginResponse>, ApiError> {
    let admin = state
        .config
        .auth
        .admin
        .as_ref()
        .ok_or(AuthError::AdminNotConfigured)?;

    let email_matches = normalize_email(&input.email) == normalize_email(&admin.email);
    // Verify even on an email mismatch so both failures cost the same.
    let password_matches = verify_password(&input.password, &admin.password_hash);
    if !(email_matches && password_matches) {
        tracing::warn!("Rejected admin login");
        return Err(AuthError::InvalidCredentials.into());
    }

    let claims = sign_in_admin(
        &store,
        &admin.email,
        Duration::hours(state.config.auth.admin_session_hours),
    )?;

    tracing::info!("Admin logged in");
    Ok(Json(AdminLoginResponse {
        email: claims.email,
        expires_at: claims.expires_at,
        redirect_to: ADMIN_DASHBOARD,
    }))
}

#[tracing::instrument(name = "api.auth.admin_logout", skip(store))]
pub async fn admin_logout(Sessions(store): Sessions) -> Json<LogoutResponse> {
    sign_out_admin(&store);
    Json(LogoutResponse {
        redirect_to: ROOT_PATH,
    })
}
