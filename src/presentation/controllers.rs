//! Scan API controllers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use tracing::error;
use uuid::Uuid;

use crate::application::use_cases::{CreateScanJobUseCase, ExecuteScanJobUseCase};
use crate::infrastructure::admission::AdmissionController;
use crate::infrastructure::job_store::{JobStoreError, ScanJobStore};
use crate::presentation::models::{
    CapacityResponse, ErrorResponse, HealthResponse, ScanAcceptedResponse, ScanRequest,
    ScanStatusResponse,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub create_scan: Arc<CreateScanJobUseCase>,
    pub execute_scan: Arc<ExecuteScanJobUseCase>,
    pub admission: Arc<AdmissionController>,
    pub store: Arc<dyn ScanJobStore>,
}

/// POST /api/v1/scan - Admit, validate, and launch a scan
#[utoipa::path(
    post,
    path = "/api/v1/scan",
    request_body = ScanRequest,
    responses(
        (status = 202, description = "Scan accepted", body = ScanAcceptedResponse),
        (status = 400, description = "Invalid target", body = ErrorResponse),
        (status = 503, description = "Scan capacity exhausted", body = CapacityResponse)
    ),
    tag = "scans"
)]
pub async fn start_scan(
    State(state): State<AppState>,
    Json(request): Json<ScanRequest>,
) -> Response {
    // Admission comes first: no job is created when capacity is exhausted.
    let permit = match state.admission.try_admit() {
        Ok(permit) => permit,
        Err(rejected) => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(CapacityResponse {
                    error: rejected.to_string(),
                    running_scans: rejected.running,
                    max_scans: rejected.max,
                }),
            )
                .into_response();
        }
    };

    match state.create_scan.execute(&request.target).await {
        Ok((job, target)) => {
            state.execute_scan.spawn(job.scan_id, target, permit);
            (
                StatusCode::ACCEPTED,
                Json(ScanAcceptedResponse {
                    scan_id: job.scan_id,
                    status: "processing".to_string(),
                }),
            )
                .into_response()
        }
        // Dropping the permit here releases the admission slot.
        Err(error) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: error.to_string(),
            }),
        )
            .into_response(),
    }
}

/// GET /api/v1/scan/{scan_id}/status - Current job snapshot
#[utoipa::path(
    get,
    path = "/api/v1/scan/{scan_id}/status",
    params(
        ("scan_id" = Uuid, Path, description = "Scan ID")
    ),
    responses(
        (status = 200, description = "Scan found", body = ScanStatusResponse),
        (status = 404, description = "Unknown or expired scan ID", body = ErrorResponse)
    ),
    tag = "scans"
)]
pub async fn get_scan_status(
    State(state): State<AppState>,
    Path(scan_id): Path<Uuid>,
) -> Response {
    match state.store.get(scan_id).await {
        Ok(job) => Json(ScanStatusResponse::from(job)).into_response(),
        Err(JobStoreError::NotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "scan not found".to_string(),
            }),
        )
            .into_response(),
        Err(e) => {
            error!(scan_id = %scan_id, error = %e, "failed to fetch scan");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// GET /health - Service health and capacity
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service healthy", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        active_scans: state.store.active_count().await,
        running_scans: state.admission.running(),
        max_concurrent_scans: state.admission.max_concurrent(),
    })
}

/// GET / - Service banner
pub async fn root_handler() -> Json<serde_json::Value> {
    Json(json!({
        "service": "vigil",
        "status": "operational"
    }))
}
