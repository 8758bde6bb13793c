//! Templated HTTP vulnerability checks.
//!
//! A bounded set of checks against well-known weak spots: missing security
//! headers, exposed sensitive files, and directory listings. Every check
//! requires a content marker in addition to a 200 status to keep false
//! positives down.

use async_trait::async_trait;
use reqwest::{Client, Response};

use crate::domain::probes::{ProbeError, TemplateProbe};
use crate::domain::value_objects::{Finding, ScanTarget, Severity};

/// Sensitive path, marker the body must contain, and the finding it produces.
struct PathCheck {
    path: &'static str,
    marker: &'static str,
    severity: Severity,
    title: &'static str,
    description: &'static str,
    recommendation: &'static str,
}

const PATH_CHECKS: &[PathCheck] = &[
    PathCheck {
        path: "/.git/config",
        marker: "[core]",
        severity: Severity::Critical,
        title: "Exposed Git Repository",
        description: "The .git directory is readable; the full source history can be downloaded.",
        recommendation: "Block access to /.git/ at the web server.",
    },
    PathCheck {
        path: "/.env",
        marker: "=",
        severity: Severity::Critical,
        title: "Exposed Environment File",
        description: ".env is readable and may leak credentials and secret keys.",
        recommendation: "Remove the file from the web root and rotate any leaked secrets.",
    },
    PathCheck {
        path: "/phpinfo.php",
        marker: "PHP Version",
        severity: Severity::High,
        title: "Exposed phpinfo Page",
        description: "phpinfo() output reveals paths, modules, and configuration details.",
        recommendation: "Delete the phpinfo script from production.",
    },
    PathCheck {
        path: "/server-status",
        marker: "Apache Server Status",
        severity: Severity::Medium,
        title: "Exposed Server Status Page",
        description: "mod_status output reveals client addresses and requested URLs.",
        recommendation: "Restrict /server-status to localhost.",
    },
];

pub struct HttpTemplateProbe {
    client: Client,
}

impl HttpTemplateProbe {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn header_findings(target: &ScanTarget, response: &Response) -> Vec<Finding> {
        let headers = response.headers();
        let mut findings = Vec::new();

        if target.is_https() && !headers.contains_key("strict-transport-security") {
            findings.push(
                Finding::new(
                    Severity::Medium,
                    "Missing HTTP Strict Transport Security Header",
                    "Responses lack Strict-Transport-Security; browsers will follow \
                     downgraded http links.",
                    "Send Strict-Transport-Security with a max-age of at least six months.",
                    "templates",
                )
                .with_owasp("A05:2021"),
            );
        }

        if !headers.contains_key("content-security-policy") {
            findings.push(
                Finding::new(
                    Severity::Low,
                    "Missing Content Security Policy",
                    "Responses lack Content-Security-Policy, weakening cross-site \
                     scripting defenses.",
                    "Define a Content-Security-Policy appropriate for the application.",
                    "templates",
                )
                .with_owasp("A05:2021"),
            );
        }

        if !headers.contains_key("x-frame-options")
            && !headers.contains_key("content-security-policy")
        {
            findings.push(
                Finding::new(
                    Severity::Low,
                    "Missing X-Frame-Options Header",
                    "Pages can be framed by other origins, enabling clickjacking.",
                    "Send X-Frame-Options: DENY or a frame-ancestors CSP directive.",
                    "templates",
                )
                .with_cwe("CWE-1021"),
            );
        }

        if !headers.contains_key("x-content-type-options") {
            findings.push(Finding::new(
                Severity::Low,
                "Missing X-Content-Type-Options Header",
                "Responses lack X-Content-Type-Options: nosniff.",
                "Send X-Content-Type-Options: nosniff on every response.",
                "templates",
            ));
        }

        if let Some(server) = headers.get("server").and_then(|v| v.to_str().ok()) {
            if server.contains('/') {
                findings.push(Finding::new(
                    Severity::Info,
                    "Verbose Server Banner",
                    format!("The Server header exposes an exact version: {server}."),
                    "Strip version numbers from the Server header.",
                    "templates",
                ));
            }
        }

        findings
    }
}

#[async_trait]
impl TemplateProbe for HttpTemplateProbe {
    async fn run(&self, target: &ScanTarget) -> Result<Vec<Finding>, ProbeError> {
        let base = self
            .client
            .get(target.url.clone())
            .send()
            .await
            .map_err(ProbeError::failure)?;

        let mut findings = Self::header_findings(target, &base);

        let body = base.text().await.unwrap_or_default();
        if body.contains("Index of /") {
            findings.push(Finding::new(
                Severity::Medium,
                "Directory Listing Enabled",
                "The server returns a directory index for the document root.",
                "Disable automatic directory indexes.",
                "templates",
            ));
        }

        for check in PATH_CHECKS {
            let Ok(probe_url) = target.url.join(check.path) else {
                continue;
            };
            let Ok(response) = self.client.get(probe_url).send().await else {
                continue;
            };
            if !response.status().is_success() {
                continue;
            }
            let text = response.text().await.unwrap_or_default();
            if text.contains(check.marker) {
                findings.push(
                    Finding::new(
                        check.severity,
                        check.title,
                        check.description,
                        check.recommendation,
                        "templates",
                    )
                    .with_owasp("A05:2021"),
                );
            }
        }

        tracing::debug!(host = %target.host, count = findings.len(), "template checks finished");

        Ok(findings)
    }
}
