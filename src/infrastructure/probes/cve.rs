//! CVE lookup against an embedded knowledge base.
//!
//! Matches the fingerprinted web server, CMS, and libraries against a static
//! table of published CVEs. Persistent vulnerability databases are out of
//! scope, so the table ships with the binary.

use async_trait::async_trait;

use crate::domain::entities::TechnologyProfile;
use crate::domain::probes::{CveLookupProbe, ProbeError};
use crate::domain::value_objects::{Finding, Severity};
use crate::infrastructure::probes::version_lt;

struct CveEntry {
    component: &'static str,
    below: &'static str,
    cve: &'static str,
    cvss: f32,
    severity: Severity,
    title: &'static str,
    description: &'static str,
    recommendation: &'static str,
}

const CVE_ENTRIES: &[CveEntry] = &[
    CveEntry {
        component: "nginx",
        below: "1.21.0",
        cve: "CVE-2021-23017",
        cvss: 7.7,
        severity: Severity::High,
        title: "nginx Resolver Off-by-One",
        description: "The nginx DNS resolver before 1.21.0 has an off-by-one heap write \
                      reachable through crafted DNS responses.",
        recommendation: "Upgrade nginx to 1.21.0 or later.",
    },
    CveEntry {
        component: "apache",
        below: "2.4.51",
        cve: "CVE-2021-41773",
        cvss: 9.8,
        severity: Severity::Critical,
        title: "Apache Path Traversal",
        description: "Apache httpd 2.4.49/2.4.50 allow path traversal and remote code \
                      execution via crafted URLs.",
        recommendation: "Upgrade Apache httpd to 2.4.51 or later.",
    },
    CveEntry {
        component: "php",
        below: "7.4.28",
        cve: "CVE-2021-21708",
        cvss: 8.1,
        severity: Severity::High,
        title: "PHP Use-After-Free in Filter Functions",
        description: "PHP before 7.4.28 has a use-after-free in filter_var with \
                      FILTER_VALIDATE_FLOAT.",
        recommendation: "Upgrade PHP to 7.4.28 / 8.0.16 or later.",
    },
    CveEntry {
        component: "jquery",
        below: "3.5.0",
        cve: "CVE-2020-11022",
        cvss: 6.1,
        severity: Severity::Medium,
        title: "jQuery Cross-Site Scripting",
        description: "jQuery before 3.5.0 executes untrusted code when passing HTML from \
                      untrusted sources to DOM manipulation methods.",
        recommendation: "Upgrade jQuery to 3.5.0 or later.",
    },
    CveEntry {
        component: "bootstrap",
        below: "3.4.1",
        cve: "CVE-2019-8331",
        cvss: 6.1,
        severity: Severity::Medium,
        title: "Bootstrap Tooltip Cross-Site Scripting",
        description: "Bootstrap before 3.4.1 allows XSS via the tooltip and popover \
                      data-template attribute.",
        recommendation: "Upgrade Bootstrap to 3.4.1/4.3.1 or later.",
    },
    CveEntry {
        component: "angularjs",
        below: "1.8.0",
        cve: "CVE-2020-7676",
        cvss: 5.4,
        severity: Severity::Medium,
        title: "AngularJS Sanitization Bypass",
        description: "angular.js before 1.8.0 allows cross-site scripting via crafted \
                      SVG content.",
        recommendation: "Upgrade AngularJS to 1.8.0 or migrate off the 1.x line.",
    },
    CveEntry {
        component: "wordpress",
        below: "5.8.3",
        cve: "CVE-2022-21661",
        cvss: 8.0,
        severity: Severity::High,
        title: "WordPress SQL Injection via WP_Query",
        description: "WordPress before 5.8.3 is vulnerable to SQL injection through \
                      plugins using WP_Query.",
        recommendation: "Update WordPress core to 5.8.3 or later.",
    },
];

#[derive(Debug, Default)]
pub struct StaticCveLookupProbe;

impl StaticCveLookupProbe {
    pub fn new() -> Self {
        Self
    }

    fn check(name: &str, version: &str) -> Vec<Finding> {
        let needle = name.to_ascii_lowercase();
        CVE_ENTRIES
            .iter()
            .filter(|entry| entry.component == needle && version_lt(version, entry.below))
            .map(|entry| {
                Finding::new(
                    entry.severity,
                    entry.title,
                    format!("{} (detected version {version})", entry.description),
                    entry.recommendation,
                    "cve",
                )
                .with_cve(entry.cve, entry.cvss)
                .with_component(entry.component, Some(version.to_string()))
            })
            .collect()
    }
}

#[async_trait]
impl CveLookupProbe for StaticCveLookupProbe {
    async fn lookup(&self, profile: &TechnologyProfile) -> Result<Vec<Finding>, ProbeError> {
        let mut findings = Vec::new();

        if let Some((name, version)) = profile.server_component() {
            findings.extend(Self::check(&name, &version));
        }

        // CMS strings like "WordPress 5.8" carry the version after a space.
        if let Some(cms) = &profile.cms {
            if let Some((name, version)) = cms.split_once(' ') {
                findings.extend(Self::check(name, version.trim()));
            }
        }

        for library in &profile.libraries {
            if let Some(version) = &library.version {
                findings.extend(Self::check(&library.name, version));
            }
        }

        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::DetectedLibrary;

    #[tokio::test]
    async fn matches_vulnerable_apache_banner() {
        let probe = StaticCveLookupProbe::new();
        let profile = TechnologyProfile {
            web_server: Some("Apache/2.4.49 (Ubuntu)".into()),
            ..Default::default()
        };
        let findings = probe.lookup(&profile).await.unwrap();
        assert!(findings.iter().any(|f| f.cve.as_deref() == Some("CVE-2021-41773")));
    }

    #[tokio::test]
    async fn skips_patched_versions() {
        let probe = StaticCveLookupProbe::new();
        let profile = TechnologyProfile {
            web_server: Some("Apache/2.4.58".into()),
            libraries: vec![DetectedLibrary {
                name: "jquery".into(),
                version: Some("3.6.0".into()),
            }],
            ..Default::default()
        };
        let findings = probe.lookup(&profile).await.unwrap();
        assert!(findings.is_empty());
    }

    #[tokio::test]
    async fn matches_cms_with_version() {
        let probe = StaticCveLookupProbe::new();
        let profile = TechnologyProfile {
            cms: Some("WordPress 5.8".into()),
            ..Default::default()
        };
        let findings = probe.lookup(&profile).await.unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].cve.as_deref(), Some("CVE-2022-21661"));
    }

    #[tokio::test]
    async fn empty_profile_yields_nothing() {
        let probe = StaticCveLookupProbe::new();
        let findings = probe
            .lookup(&TechnologyProfile::default())
            .await
            .unwrap();
        assert!(findings.is_empty());
    }
}
