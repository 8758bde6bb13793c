//! Finding aggregation: deduplicate, count, score, grade, sort.
//!
//! The scoring contract is deterministic: the score is a pure function of
//! the severity counts, and the grade a pure function of the score. Probe
//! errors never influence the score; they travel alongside it.

use std::collections::{BTreeMap, HashSet};

use chrono::Utc;

use crate::domain::entities::{AggregatedReport, SeverityCounts, TechnologyProfile};
use crate::domain::value_objects::{Finding, Grade, Severity};

/// Score penalty per finding of each severity. Informational findings never
/// reduce the score.
const WEIGHT_CRITICAL: usize = 20;
const WEIGHT_HIGH: usize = 10;
const WEIGHT_MEDIUM: usize = 5;
const WEIGHT_LOW: usize = 2;

/// Everything the pipeline collected for one scan, in encounter order.
pub struct AggregationInput {
    pub target_url: String,
    pub technology: TechnologyProfile,
    pub findings: Vec<Finding>,
    pub probe_errors: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
pub struct AggregateFindingsUseCase;

impl AggregateFindingsUseCase {
    pub fn new() -> Self {
        Self
    }

    pub fn execute(&self, input: AggregationInput) -> AggregatedReport {
        let deduplicated = Self::deduplicate(input.findings);
        let severity_counts = Self::count(&deduplicated);
        let score = Self::score(&severity_counts);
        let grade = Grade::from_score(score);

        let mut findings = deduplicated;
        // Stable: equal-severity findings keep their dedup order.
        findings.sort_by_key(|f| f.severity.rank());

        AggregatedReport {
            target_url: input.target_url,
            scanned_at: Utc::now(),
            score,
            grade,
            severity_counts,
            total_issues: findings.len(),
            findings,
            technology: input.technology,
            probe_errors: input.probe_errors,
        }
    }

    /// Keep the first occurrence of each (lowercase title, severity) pair.
    fn deduplicate(findings: Vec<Finding>) -> Vec<Finding> {
        let mut seen: HashSet<(String, Severity)> = HashSet::new();
        findings
            .into_iter()
            .filter(|f| seen.insert((f.title.to_lowercase(), f.severity)))
            .collect()
    }

    fn count(findings: &[Finding]) -> SeverityCounts {
        let mut counts = SeverityCounts::default();
        for finding in findings {
            match finding.severity {
                Severity::Critical => counts.critical += 1,
                Severity::High => counts.high += 1,
                Severity::Medium => counts.medium += 1,
                Severity::Low => counts.low += 1,
                Severity::Info => counts.info += 1,
            }
        }
        counts
    }

    /// `max(0, 100 - sum(weight * count))`, clamped to [0, 100].
    fn score(counts: &SeverityCounts) -> u8 {
        let penalty = counts.critical * WEIGHT_CRITICAL
            + counts.high * WEIGHT_HIGH
            + counts.medium * WEIGHT_MEDIUM
            + counts.low * WEIGHT_LOW;
        100usize.saturating_sub(penalty) as u8
    }
}
