//! Synchronous knowledge base of known-vulnerable component versions.
//!
//! Consulted between the fingerprint and the network phases; a lookup is a
//! pure table scan and can never fail the job.

use crate::domain::probes::QuickVulnerabilityKb;
use crate::domain::value_objects::{Finding, Severity};
use crate::infrastructure::probes::version_lt;

struct KbRule {
    component: &'static str,
    below: &'static str,
    severity: Severity,
    title: &'static str,
    description: &'static str,
    recommendation: &'static str,
}

const KB_RULES: &[KbRule] = &[
    KbRule {
        component: "jquery",
        below: "3.5.0",
        severity: Severity::Medium,
        title: "Outdated jQuery Library",
        description: "jQuery releases before 3.5.0 contain known cross-site scripting issues \
                      in HTML manipulation helpers.",
        recommendation: "Upgrade jQuery to 3.5.0 or later.",
    },
    KbRule {
        component: "bootstrap",
        below: "3.4.1",
        severity: Severity::Medium,
        title: "Outdated Bootstrap Library",
        description: "Bootstrap releases before 3.4.1 are affected by XSS issues in the \
                      tooltip and popover components.",
        recommendation: "Upgrade Bootstrap to 3.4.1/4.3.1 or later.",
    },
    KbRule {
        component: "angularjs",
        below: "1.8.0",
        severity: Severity::Medium,
        title: "Outdated AngularJS Version",
        description: "AngularJS before 1.8.0 has known sandbox escape and XSS issues, and \
                      the 1.x line is end-of-life.",
        recommendation: "Migrate off AngularJS 1.x or upgrade to 1.8.x as an interim step.",
    },
    KbRule {
        component: "nginx",
        below: "1.20.0",
        severity: Severity::Medium,
        title: "Outdated Web Server Version",
        description: "nginx releases before 1.20.0 miss several security fixes from the \
                      current stable branch.",
        recommendation: "Upgrade nginx to the current stable release.",
    },
    KbRule {
        component: "apache",
        below: "2.4.51",
        severity: Severity::High,
        title: "Outdated Web Server Version",
        description: "Apache httpd releases before 2.4.51 include versions affected by \
                      actively exploited path traversal flaws.",
        recommendation: "Upgrade Apache httpd to 2.4.51 or later.",
    },
    KbRule {
        component: "php",
        below: "8.0.0",
        severity: Severity::High,
        title: "End-of-Life PHP Version",
        description: "PHP branches before 8.0 no longer receive security fixes.",
        recommendation: "Upgrade to a supported PHP 8.x release.",
    },
    KbRule {
        component: "openssl",
        below: "1.1.1",
        severity: Severity::High,
        title: "Outdated OpenSSL Version",
        description: "OpenSSL releases before 1.1.1 are out of support and miss protocol \
                      hardening fixes.",
        recommendation: "Upgrade OpenSSL to a supported release.",
    },
];

#[derive(Debug, Default)]
pub struct StaticQuickVulnerabilityKb;

impl StaticQuickVulnerabilityKb {
    pub fn new() -> Self {
        Self
    }
}

impl QuickVulnerabilityKb for StaticQuickVulnerabilityKb {
    fn lookup(&self, name: &str, version: &str) -> Option<Finding> {
        let needle = name.to_ascii_lowercase();
        let rule = KB_RULES
            .iter()
            .find(|rule| rule.component == needle && version_lt(version, rule.below))?;

        Some(
            Finding::new(
                rule.severity,
                rule.title,
                format!("{} (detected version {version})", rule.description),
                rule.recommendation,
                "knowledge-base",
            )
            .with_component(rule.component, Some(version.to_string())),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_old_jquery() {
        let kb = StaticQuickVulnerabilityKb::new();
        let finding = kb.lookup("jQuery", "1.8.3").unwrap();
        assert_eq!(finding.severity, Severity::Medium);
        assert_eq!(finding.component_version.as_deref(), Some("1.8.3"));
    }

    #[test]
    fn passes_current_versions() {
        let kb = StaticQuickVulnerabilityKb::new();
        assert!(kb.lookup("jquery", "3.6.0").is_none());
        assert!(kb.lookup("nginx", "1.24.0").is_none());
    }

    #[test]
    fn unknown_components_return_nothing() {
        let kb = StaticQuickVulnerabilityKb::new();
        assert!(kb.lookup("left-pad", "0.0.1").is_none());
    }

    #[test]
    fn flags_eol_php_from_powered_by_banner() {
        let kb = StaticQuickVulnerabilityKb::new();
        let finding = kb.lookup("php", "7.4.3").unwrap();
        assert_eq!(finding.severity, Severity::High);
    }
}
