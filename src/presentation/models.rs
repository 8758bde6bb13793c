//! API request and response models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::entities::{AggregatedReport, ScanJob};

/// Request model for starting a scan
#[derive(Debug, Deserialize, ToSchema)]
pub struct ScanRequest {
    /// Target URL to scan
    #[schema(example = "https://example.com")]
    pub target: String,
}

/// Returned when a scan is accepted for asynchronous processing
#[derive(Debug, Serialize, ToSchema)]
pub struct ScanAcceptedResponse {
    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub scan_id: Uuid,
    #[schema(example = "processing")]
    pub status: String,
}

/// Returned when scan capacity is exhausted
#[derive(Debug, Serialize, ToSchema)]
pub struct CapacityResponse {
    pub error: String,
    pub running_scans: usize,
    pub max_scans: usize,
}

/// Generic error body
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

/// Snapshot of one scan job for status pollers
#[derive(Debug, Serialize, ToSchema)]
pub struct ScanStatusResponse {
    pub scan_id: Uuid,
    pub target: String,
    #[schema(example = "running")]
    pub status: String,
    #[schema(example = "parallel-scans")]
    pub phase: String,
    pub progress_percent: u8,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Present only once the scan completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<AggregatedReport>,
    /// Present only if the scan failed or was rejected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<ScanJob> for ScanStatusResponse {
    fn from(job: ScanJob) -> Self {
        Self {
            scan_id: job.scan_id,
            target: job.target_url,
            status: job.status.to_string(),
            phase: job.phase.to_string(),
            progress_percent: job.progress_percent,
            created_at: job.created_at,
            last_updated_at: job.last_updated_at,
            completed_at: job.completed_at,
            report: job.report,
            error: job.error,
        }
    }
}

/// Service health summary
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "ok")]
    pub status: String,
    /// Jobs currently tracked in a non-terminal state
    pub active_scans: usize,
    /// Admission slots currently held
    pub running_scans: usize,
    pub max_concurrent_scans: usize,
}
