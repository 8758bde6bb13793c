//! Aggregation and scoring contract

use std::collections::BTreeMap;

use vigil::application::aggregation::{AggregateFindingsUseCase, AggregationInput};
use vigil::domain::entities::TechnologyProfile;
use vigil::domain::value_objects::{Finding, Grade, Severity};

fn finding(severity: Severity, title: &str, probe: &str) -> Finding {
    Finding::new(severity, title, "description", "recommendation", probe)
}

fn aggregate(findings: Vec<Finding>) -> vigil::domain::entities::AggregatedReport {
    AggregateFindingsUseCase::new().execute(AggregationInput {
        target_url: "https://example.com/".into(),
        technology: TechnologyProfile::default(),
        findings,
        probe_errors: BTreeMap::new(),
    })
}

#[test]
fn no_two_findings_share_title_and_severity_after_dedup() {
    let findings = vec![
        finding(Severity::High, "Weak TLS", "certificates"),
        finding(Severity::High, "weak tls", "templates"),
        finding(Severity::High, "WEAK TLS", "cve"),
        finding(Severity::Medium, "Weak TLS", "certificates"),
        finding(Severity::High, "Another Issue", "ports"),
    ];
    let report = aggregate(findings);

    let mut keys: Vec<(String, Severity)> = report
        .findings
        .iter()
        .map(|f| (f.title.to_lowercase(), f.severity))
        .collect();
    let before = keys.len();
    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), before, "dedup left duplicate (title, severity) pairs");
    assert_eq!(report.total_issues, 3);
}

#[test]
fn cross_probe_duplicate_tls_finding_appears_once() {
    // CertificateGradingProbe and the quick knowledge base independently
    // report the same issue; the report carries exactly one copy.
    let report = aggregate(vec![
        finding(Severity::Critical, "Outdated TLS Version", "certificates"),
        finding(Severity::Critical, "Outdated TLS Version", "knowledge-base"),
    ]);
    assert_eq!(report.total_issues, 1);
    assert_eq!(report.findings[0].probe, "certificates");
}

#[test]
fn score_stays_in_range_for_large_finding_sets() {
    for count in [0usize, 1, 3, 7, 20, 100] {
        let findings = (0..count)
            .map(|i| finding(Severity::High, &format!("issue {i}"), "test"))
            .collect();
        let report = aggregate(findings);
        assert!(report.score <= 100);
    }
}

#[test]
fn adding_any_scored_finding_never_raises_the_score() {
    let base = aggregate(vec![finding(Severity::Medium, "base", "test")]);
    for severity in [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
    ] {
        let report = aggregate(vec![
            finding(Severity::Medium, "base", "test"),
            finding(severity, "extra", "test"),
        ]);
        assert!(report.score < base.score);
    }

    // Info findings carry weight zero.
    let with_info = aggregate(vec![
        finding(Severity::Medium, "base", "test"),
        finding(Severity::Info, "extra", "test"),
    ]);
    assert_eq!(with_info.score, base.score);
}

#[test]
fn info_only_reports_score_100_and_grade_a() {
    let findings = (0..25)
        .map(|i| finding(Severity::Info, &format!("note {i}"), "test"))
        .collect();
    let report = aggregate(findings);
    assert_eq!(report.score, 100);
    assert_eq!(report.grade, Grade::A);
    assert_eq!(report.severity_counts.info, 25);
}

#[test]
fn grade_boundaries_are_deterministic_on_repeated_calls() {
    for _ in 0..3 {
        assert_eq!(Grade::from_score(85), Grade::A);
        assert_eq!(Grade::from_score(84), Grade::B);
        assert_eq!(Grade::from_score(70), Grade::B);
        assert_eq!(Grade::from_score(69), Grade::C);
        assert_eq!(Grade::from_score(55), Grade::C);
        assert_eq!(Grade::from_score(54), Grade::D);
        assert_eq!(Grade::from_score(40), Grade::D);
        assert_eq!(Grade::from_score(39), Grade::F);
    }
}

#[test]
fn report_preserves_probe_errors_and_technology() {
    let mut probe_errors = BTreeMap::new();
    probe_errors.insert("ports".to_string(), "probe timed out after 20s".to_string());

    let technology = TechnologyProfile {
        web_server: Some("nginx/1.24.0".into()),
        ..Default::default()
    };

    let report = AggregateFindingsUseCase::new().execute(AggregationInput {
        target_url: "https://example.com/".into(),
        technology,
        findings: vec![],
        probe_errors,
    });

    assert_eq!(report.probe_errors.get("ports").map(String::as_str), Some("probe timed out after 20s"));
    assert_eq!(report.technology.web_server.as_deref(), Some("nginx/1.24.0"));
    // Probe errors never affect the deterministic score.
    assert_eq!(report.score, 100);
}
