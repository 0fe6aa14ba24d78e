//! HTTP trigger for the video retention job, called by an external scheduler.

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::AppState;

const ALLOW_HEADERS: &str = "authorization, x-client-info, apikey, content-type";

fn with_cors(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
    response
}

fn failure(status: StatusCode, error: impl Into<String>) -> Response {
    let body = json!({ "success": false, "error": error.into() });
    with_cors((status, Json(body)).into_response())
}

fn bearer_matches(headers: &HeaderMap, token: &str) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|presented| presented == token)
}

/// CORS preflight.
pub async fn preflight() -> Response {
    with_cors(StatusCode::OK.into_response())
}

/// Run the retention job once and report what it did.
#[tracing::instrument(name = "functions.cleanup_old_videos", skip(state, headers))]
pub async fn cleanup_old_videos(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = &state.config.retention.trigger_token
        && !bearer_matches(&headers, token)
    {
        tracing::warn!("Rejected cleanup trigger without a valid token");
        return failure(StatusCode::UNAUTHORIZED, "Unauthorized");
    }

    let Some(cleanup) = &state.cleanup else {
        return failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Video cleanup requires a configured database",
        );
    };

    match cleanup.run().await {
        Ok(report) => with_cors(Json(report.to_response()).into_response()),
        Err(e) => {
            tracing::error!(error = %e, "Video cleanup failed");
            failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
