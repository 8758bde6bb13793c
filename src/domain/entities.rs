//! Scan domain entities

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::value_objects::{Finding, Grade, ScanPhase, ScanStatus, ScanTransitionError};

/// A library detected on the target, with its version when one is visible.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DetectedLibrary {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Software fingerprint of the target, passed through to the final report.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct TechnologyProfile {
    /// Raw web server banner, e.g. `nginx/1.18.0`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_server: Option<String>,
    /// Detected CMS, e.g. `WordPress 5.8`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cms: Option<String>,
    pub frameworks: Vec<String>,
    pub libraries: Vec<DetectedLibrary>,
    /// Findings the fingerprint probe itself attaches for known-bad versions
    pub vulnerable_components: Vec<Finding>,
}

impl TechnologyProfile {
    /// Split the server banner into a (name, version) pair when it carries
    /// one, e.g. `Apache/2.4.49 (Ubuntu)` -> `("Apache", "2.4.49")`.
    pub fn server_component(&self) -> Option<(String, String)> {
        let banner = self.web_server.as_deref()?;
        let (name, rest) = banner.split_once('/')?;
        let version = rest.split_whitespace().next()?;
        if name.is_empty() || version.is_empty() {
            return None;
        }
        Some((name.to_string(), version.to_string()))
    }
}

/// Per-severity finding counts for a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
}

impl SeverityCounts {
    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low + self.info
    }
}

/// The merged, deduplicated, scored result of one scan.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AggregatedReport {
    pub target_url: String,
    pub scanned_at: DateTime<Utc>,
    /// 0-100; a pure function of the severity counts
    pub score: u8,
    pub grade: Grade,
    pub severity_counts: SeverityCounts,
    /// Always equals `findings.len()`
    pub total_issues: usize,
    /// Sorted critical-first, stable within equal severity
    pub findings: Vec<Finding>,
    pub technology: TechnologyProfile,
    /// Probe tag -> error message for probes that failed in isolation
    pub probe_errors: BTreeMap<String, String>,
}

/// One tracked scan job.
///
/// Created by the admission path, mutated only through the job store during
/// the pipeline run, finalized exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanJob {
    pub scan_id: Uuid,
    pub target_url: String,
    pub hostname: String,
    pub status: ScanStatus,
    pub phase: ScanPhase,
    pub progress_percent: u8,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub report: Option<AggregatedReport>,
    pub error: Option<String>,
}

impl ScanJob {
    pub fn new(target_url: String, hostname: String) -> Self {
        let now = Utc::now();
        Self {
            scan_id: Uuid::new_v4(),
            target_url,
            hostname,
            status: ScanStatus::Queued,
            phase: ScanPhase::Start,
            progress_percent: 0,
            created_at: now,
            last_updated_at: now,
            completed_at: None,
            report: None,
            error: None,
        }
    }

    /// Validated status transition; touches `last_updated_at`.
    pub fn transition(&mut self, to: ScanStatus) -> Result<(), ScanTransitionError> {
        if !self.status.can_transition_to(&to) {
            return Err(ScanTransitionError {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.last_updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::ScanStatus;

    #[test]
    fn new_job_starts_queued_at_zero() {
        let job = ScanJob::new("https://example.com/".into(), "example.com".into());
        assert_eq!(job.status, ScanStatus::Queued);
        assert_eq!(job.phase, ScanPhase::Start);
        assert_eq!(job.progress_percent, 0);
        assert!(job.report.is_none());
        assert!(job.error.is_none());
    }

    #[test]
    fn transition_rejects_invalid_moves() {
        let mut job = ScanJob::new("https://example.com/".into(), "example.com".into());
        assert!(job.transition(ScanStatus::Completed).is_err());
        job.transition(ScanStatus::Running).unwrap();
        job.transition(ScanStatus::Completed).unwrap();
        assert!(job.transition(ScanStatus::Failed).is_err());
    }

    #[test]
    fn server_component_splits_banner() {
        let profile = TechnologyProfile {
            web_server: Some("Apache/2.4.49 (Ubuntu)".into()),
            ..Default::default()
        };
        assert_eq!(
            profile.server_component(),
            Some(("Apache".to_string(), "2.4.49".to_string()))
        );

        let bare = TechnologyProfile {
            web_server: Some("nginx".into()),
            ..Default::default()
        };
        assert_eq!(bare.server_component(), None);
    }
}
