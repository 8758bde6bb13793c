//! Probe capability interfaces consumed by the scan pipeline.
//!
//! Each probe performs one category of security check. The pipeline treats
//! every probe failure as an isolated data value rather than an error path,
//! so implementations report what they can and return `ProbeError` only when
//! they produced nothing usable.

use async_trait::async_trait;

use super::entities::TechnologyProfile;
use super::value_objects::{Finding, Grade, ScanTarget};

/// Error produced by a probe that could not complete its check.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ProbeError(String);

impl ProbeError {
    pub fn failure(message: impl std::fmt::Display) -> Self {
        Self(message.to_string())
    }
}

/// A network service discovered by the port scan.
#[derive(Debug, Clone)]
pub struct DetectedService {
    pub port: u16,
    pub service: String,
}

/// Port scan result: findings plus the raw service list.
#[derive(Debug, Default)]
pub struct PortScanOutcome {
    pub findings: Vec<Finding>,
    pub services: Vec<DetectedService>,
}

/// Certificate grading result: findings plus a TLS letter grade when the
/// target speaks TLS at all.
#[derive(Debug, Default)]
pub struct CertificateOutcome {
    pub findings: Vec<Finding>,
    pub grade: Option<Grade>,
}

/// Identifies the software stack serving the target.
#[async_trait]
pub trait FingerprintProbe: Send + Sync {
    async fn fingerprint(&self, target: &ScanTarget) -> Result<TechnologyProfile, ProbeError>;
}

/// Scans the target host for exposed network services.
#[async_trait]
pub trait PortScanProbe: Send + Sync {
    async fn scan(&self, target: &ScanTarget) -> Result<PortScanOutcome, ProbeError>;
}

/// Grades the target's TLS configuration and certificate.
#[async_trait]
pub trait CertificateProbe: Send + Sync {
    async fn grade(&self, target: &ScanTarget) -> Result<CertificateOutcome, ProbeError>;
}

/// Runs templated HTTP vulnerability checks against the target.
#[async_trait]
pub trait TemplateProbe: Send + Sync {
    async fn run(&self, target: &ScanTarget) -> Result<Vec<Finding>, ProbeError>;
}

/// Matches fingerprinted components against a CVE knowledge base.
#[async_trait]
pub trait CveLookupProbe: Send + Sync {
    async fn lookup(&self, profile: &TechnologyProfile) -> Result<Vec<Finding>, ProbeError>;
}

/// Synchronous, local knowledge base of known-vulnerable component versions.
pub trait QuickVulnerabilityKb: Send + Sync {
    fn lookup(&self, name: &str, version: &str) -> Option<Finding>;
}
