//! Scan domain value objects

use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use url::Url;
use utoipa::ToSchema;

/// Scan lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum ScanStatus {
    /// Job accepted and waiting for the pipeline to pick it up
    Queued,
    /// Pipeline is executing probes
    Running,
    /// Terminal: report attached
    Completed,
    /// Terminal: pipeline-level failure
    Failed,
    /// Terminal: target validation refused the job
    Rejected,
}

impl ScanStatus {
    /// Returns the set of valid target states from the current state.
    ///
    /// ```text
    /// Queued ──► Running ──► Completed
    ///   │           │
    ///   ▼           ▼
    /// Rejected    Failed
    /// ```
    pub fn valid_transitions(&self) -> &[ScanStatus] {
        match self {
            Self::Queued => &[Self::Running, Self::Rejected],
            Self::Running => &[Self::Completed, Self::Failed],
            Self::Completed | Self::Failed | Self::Rejected => &[],
        }
    }

    /// Check whether transitioning to `target` is allowed from the current state.
    pub fn can_transition_to(&self, target: &ScanStatus) -> bool {
        self.valid_transitions().contains(target)
    }

    /// Whether this status represents a terminal (final) state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Rejected)
    }
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

/// Error returned when an invalid status transition is attempted.
#[derive(Debug, thiserror::Error)]
#[error("invalid scan transition from {from} to {to}")]
pub struct ScanTransitionError {
    pub from: ScanStatus,
    pub to: ScanStatus,
}

/// Pipeline phase tag reported to status pollers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ScanPhase {
    Start,
    Detection,
    KnowledgeBase,
    ParallelScans,
    CveLookup,
    Aggregate,
    Done,
}

impl ScanPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Detection => "detection",
            Self::KnowledgeBase => "knowledge-base",
            Self::ParallelScans => "parallel-scans",
            Self::CveLookup => "cve-lookup",
            Self::Aggregate => "aggregate",
            Self::Done => "done",
        }
    }
}

impl std::fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Finding severity, ordered most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    /// Sort rank; lower sorts first in reports.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Critical => 0,
            Self::High => 1,
            Self::Medium => 2,
            Self::Low => 3,
            Self::Info => 4,
        }
    }

    /// Parse a severity string; anything unrecognized folds into `Info`.
    pub fn parse_lenient(value: &str) -> Severity {
        match value.to_ascii_lowercase().as_str() {
            "critical" => Self::Critical,
            "high" => Self::High,
            "medium" => Self::Medium,
            "low" => Self::Low,
            _ => Self::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Info => "info",
        }
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Severity::parse_lenient(&raw))
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Letter grade derived from the report score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    /// Fixed cutoffs: >=85 A, >=70 B, >=55 C, >=40 D, else F.
    pub fn from_score(score: u8) -> Grade {
        match score {
            85..=u8::MAX => Self::A,
            70..=84 => Self::B,
            55..=69 => Self::C,
            40..=54 => Self::D,
            _ => Self::F,
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let letter = match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::F => "F",
        };
        f.write_str(letter)
    }
}

/// A single reported security issue.
///
/// Findings are immutable value objects produced by probes; the aggregation
/// step deduplicates, counts, and orders them but never rewrites them.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Finding {
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub recommendation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cve: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwe: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owasp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cvss: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_version: Option<String>,
    /// Tag of the probe that produced this finding
    pub probe: String,
}

impl Finding {
    pub fn new(
        severity: Severity,
        title: impl Into<String>,
        description: impl Into<String>,
        recommendation: impl Into<String>,
        probe: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            title: title.into(),
            description: description.into(),
            recommendation: recommendation.into(),
            cve: None,
            cwe: None,
            owasp: None,
            cvss: None,
            component: None,
            component_version: None,
            probe: probe.into(),
        }
    }

    pub fn with_cve(mut self, cve: impl Into<String>, cvss: f32) -> Self {
        self.cve = Some(cve.into());
        self.cvss = Some(cvss);
        self
    }

    pub fn with_component(mut self, name: impl Into<String>, version: Option<String>) -> Self {
        self.component = Some(name.into());
        self.component_version = version;
        self
    }

    pub fn with_cwe(mut self, cwe: impl Into<String>) -> Self {
        self.cwe = Some(cwe.into());
        self
    }

    pub fn with_owasp(mut self, owasp: impl Into<String>) -> Self {
        self.owasp = Some(owasp.into());
        self
    }
}

/// A validated, resolved scan target.
///
/// Produced by the target validator after scheme, literal-address, and
/// resolved-address checks have all passed.
#[derive(Debug, Clone)]
pub struct ScanTarget {
    pub url: Url,
    pub host: String,
    pub port: u16,
    pub addresses: Vec<IpAddr>,
}

impl ScanTarget {
    pub fn is_https(&self) -> bool {
        self.url.scheme() == "https"
    }
}
