//! Navigation state: which actor the browser is, and where it must go.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::get_services;
use crate::{
    AppState,
    auth::{Caller, Resolution, Resolver, Sessions},
    routes::ApiError,
};

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    /// Path the browser is about to render. Defaults to `/`.
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RedirectResponse {
    pub redirect_to: String,
}

#[derive(Debug, Serialize)]
pub struct ViewAsResponse {
    pub acting_clinic_id: Uuid,
    pub redirect_to: String,
}

#[tracing::instrument(name = "api.session.resolve", skip(store))]
pub async fn resolve(
    Sessions(store): Sessions,
    Query(query): Query<SessionQuery>,
) -> Json<Resolution> {
    let path = query.path.as_deref().unwrap_or("/");
    Json(Resolver::new(&store).resolve(path))
}

#[tracing::instrument(name = "api.session.logout", skip(store))]
pub async fn logout(Sessions(store): Sessions) -> Json<RedirectResponse> {
    let redirect_to = Resolver::new(&store).logout();
    Json(RedirectResponse {
        redirect_to: redirect_to.to_string(),
    })
}

/// Let the admin act on one clinic's data in this tab.
#[tracing::instrument(name = "api.session.begin_view_as", skip(state, caller, store))]
pub async fn begin_view_as(
    State(state): State<AppState>,
    caller: Caller,
    Sessions(store): Sessions,
    Path(clinic_id): Path<Uuid>,
) -> Result<Json<ViewAsResponse>, ApiError> {
    caller.require_admin()?;

    let services = get_services(&state)?;
    services
        .clinics
        .get(clinic_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Clinic '{clinic_id}' not found")))?;

    Resolver::new(&store).begin_view_as(clinic_id);
    Ok(Json(ViewAsResponse {
        acting_clinic_id: clinic_id,
        redirect_to: format!("/admin/clinica/{clinic_id}/pacientes"),
    }))
}

#[tracing::instrument(name = "api.session.end_view_as", skip(store))]
pub async fn end_view_as(Sessions(store): Sessions) -> Json<RedirectResponse> {
    let redirect_to = Resolver::new(&store).end_view_as();
    Json(RedirectResponse {
        redirect_to: redirect_to.to_string(),
    })
}
