use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
};
use bytes::Bytes;
use serde::Serialize;
use uuid::Uuid;

use super::{get_services, patients::load_patient};
use crate::{
    AppState,
    auth::Caller,
    models::Video,
    routes::ApiError,
    services::VideoUpload,
};

#[derive(Debug, Serialize)]
pub struct VideoListResponse {
    pub data: Vec<Video>,
}

/// A patient's videos, newest first.
#[tracing::instrument(name = "api.videos.list", skip(state, caller), fields(patient_id = %id))]
pub async fn list(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<VideoListResponse>, ApiError> {
    let services = get_services(&state)?;
    let patient = load_patient(services, &caller, id).await?;

    let data = services.videos.list_by_patient(patient.id).await?;
    Ok(Json(VideoListResponse { data }))
}

/// Upload a video for a patient.
///
/// Multipart fields: `file` (required) and `title` (optional).
#[tracing::instrument(name = "api.videos.upload", skip(state, caller, multipart), fields(patient_id = %id))]
pub async fn upload(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Video>), ApiError> {
    let services = get_services(&state)?;
    let patient = load_patient(services, &caller, id).await?;

    let mut file: Option<(Option<String>, Option<String>, Bytes)> = None;
    let mut title: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read multipart field: {e}")))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "file" => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let content = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read file: {e}")))?;
                file = Some((file_name, content_type, content));
            }
            "title" => {
                title = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::BadRequest(format!("Failed to read title: {e}")))?,
                );
            }
            _ => {}
        }
    }

    let (file_name, content_type, content) =
        file.ok_or_else(|| ApiError::BadRequest("Missing 'file' field".to_string()))?;

    let video = services
        .videos
        .upload(
            &patient,
            VideoUpload {
                file_name,
                content_type,
                content,
                title,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(video)))
}

/// Delete a video and its stored file.
#[tracing::instrument(name = "api.videos.delete", skip(state, caller), fields(%id))]
pub async fn delete(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let services = get_services(&state)?;
    let video = services
        .videos
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Video '{id}' not found")))?;
    caller.require_clinic_access(video.clinic_id)?;

    services.videos.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
