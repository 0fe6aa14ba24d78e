//! Health check endpoints for container probes and monitoring.

use axum::{Json, extract::State, response::IntoResponse};
use http::StatusCode;
use serde::Serialize;

use crate::AppState;

/// Detailed health status response.
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    /// "healthy" or "unhealthy"
    pub status: String,
    pub version: String,
    pub subsystems: SubsystemStatus,
}

#[derive(Debug, Serialize)]
pub struct SubsystemStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<ComponentStatus>,
    /// Configured video backend (`filesystem` or `s3`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ComponentStatus {
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

/// Full health check with subsystem status.
#[tracing::instrument(name = "health.check", skip(state))]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let mut overall_healthy = true;
    let mut subsystems = SubsystemStatus {
        database: None,
        storage: state.blobs.as_ref().map(|b| b.backend_name().to_string()),
    };

    if let Some(db) = &state.db {
        let start = std::time::Instant::now();
        let db_healthy = db.health_check().await.is_ok();
        let latency_ms = start.elapsed().as_millis() as u64;

        if !db_healthy {
            overall_healthy = false;
        }

        subsystems.database = Some(ComponentStatus {
            healthy: db_healthy,
            message: if db_healthy {
                None
            } else {
                Some("Database connection failed".to_string())
            },
            latency_ms: Some(latency_ms),
        });
    }

    let health = HealthStatus {
        status: if overall_healthy { "healthy" } else { "unhealthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        subsystems,
    };

    let status_code = if overall_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(health))
}

/// Liveness probe. Succeeds while the process serves requests.
#[tracing::instrument(name = "health.liveness")]
pub async fn liveness() -> impl IntoResponse {
    StatusCode::OK
}

/// Readiness probe. Fails while the database is unreachable.
#[tracing::instrument(name = "health.readiness", skip(state))]
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    if let Some(db) = &state.db
        && db.health_check().await.is_err()
    {
        return StatusCode::SERVICE_UNAVAILABLE;
    }

    StatusCode::OK
}
