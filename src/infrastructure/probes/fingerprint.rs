//! HTTP software fingerprinting.
//!
//! One GET against the target root; server identity comes from response
//! headers, CMS and library detection from the HTML body. Known-bad
//! versions spotted here become the profile's embedded findings.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;

use crate::domain::entities::{DetectedLibrary, TechnologyProfile};
use crate::domain::probes::{FingerprintProbe, ProbeError};
use crate::domain::value_objects::{Finding, ScanTarget, Severity};
use crate::infrastructure::probes::version_lt;

static META_GENERATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]+name=["']generator["'][^>]+content=["']([^"']+)["']"#)
        .expect("valid generator regex")
});
static JQUERY_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)jquery[-.]([0-9]+\.[0-9]+(?:\.[0-9]+)?)").expect("valid jquery regex")
});
static BOOTSTRAP_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)bootstrap[-./]([0-9]+\.[0-9]+(?:\.[0-9]+)?)").expect("valid bootstrap regex")
});
static ANGULAR_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)angular(?:js)?[-./]([0-9]+\.[0-9]+(?:\.[0-9]+)?)").expect("valid angular regex")
});

pub struct HttpFingerprintProbe {
    client: Client,
}

impl HttpFingerprintProbe {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn detect_cms(body: &str) -> Option<String> {
        if let Some(caps) = META_GENERATOR.captures(body) {
            return Some(caps[1].trim().to_string());
        }
        if body.contains("wp-content") || body.contains("wp-includes") {
            return Some("WordPress".to_string());
        }
        if body.contains("Drupal.settings") || body.contains("/sites/default/files") {
            return Some("Drupal".to_string());
        }
        if body.contains("/media/jui/") || body.contains("Joomla!") {
            return Some("Joomla".to_string());
        }
        None
    }

    fn detect_libraries(body: &str) -> Vec<DetectedLibrary> {
        let mut libraries = Vec::new();
        if let Some(caps) = JQUERY_VERSION.captures(body) {
            libraries.push(DetectedLibrary {
                name: "jquery".to_string(),
                version: Some(caps[1].to_string()),
            });
        }
        if let Some(caps) = BOOTSTRAP_VERSION.captures(body) {
            libraries.push(DetectedLibrary {
                name: "bootstrap".to_string(),
                version: Some(caps[1].to_string()),
            });
        }
        if let Some(caps) = ANGULAR_VERSION.captures(body) {
            libraries.push(DetectedLibrary {
                name: "angularjs".to_string(),
                version: Some(caps[1].to_string()),
            });
        }
        libraries
    }

    /// Findings the fingerprint attaches itself for versions it already
    /// knows are bad; the fuller tables live in the knowledge-base probes.
    fn flag_vulnerable_components(profile: &mut TechnologyProfile) {
        for library in &profile.libraries {
            let Some(version) = &library.version else {
                continue;
            };
            if library.name == "jquery" && version_lt(version, "1.9.0") {
                profile.vulnerable_components.push(
                    Finding::new(
                        Severity::High,
                        "Vulnerable jQuery Version",
                        format!(
                            "jQuery {version} is affected by known cross-site scripting \
                             issues (CVE-2012-6708 and related)."
                        ),
                        "Upgrade jQuery to 3.5.0 or later.",
                        "detection",
                    )
                    .with_cve("CVE-2012-6708", 6.1)
                    .with_component("jquery", Some(version.clone())),
                );
            }
        }
        if let Some((name, version)) = profile.server_component() {
            if name.eq_ignore_ascii_case("apache") && version_lt(&version, "2.4.0") {
                profile.vulnerable_components.push(
                    Finding::new(
                        Severity::High,
                        "End-of-Life Web Server",
                        format!("Apache {version} no longer receives security fixes."),
                        "Upgrade to a supported Apache 2.4.x release.",
                        "detection",
                    )
                    .with_component("apache", Some(version)),
                );
            }
        }
    }
}

#[async_trait]
impl FingerprintProbe for HttpFingerprintProbe {
    async fn fingerprint(&self, target: &ScanTarget) -> Result<TechnologyProfile, ProbeError> {
        let response = self
            .client
            .get(target.url.clone())
            .send()
            .await
            .map_err(ProbeError::failure)?;

        let headers = response.headers().clone();
        let web_server = headers
            .get(reqwest::header::SERVER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let powered_by = headers
            .get("x-powered-by")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.text().await.unwrap_or_default();

        let mut profile = TechnologyProfile {
            web_server,
            cms: Self::detect_cms(&body),
            frameworks: Vec::new(),
            libraries: Self::detect_libraries(&body),
            vulnerable_components: Vec::new(),
        };

        if let Some(raw) = powered_by {
            profile.frameworks.push(raw.clone());
            // "PHP/7.4.3" style banners also feed the version knowledge base.
            if let Some((name, version)) = raw.split_once('/') {
                profile.libraries.push(DetectedLibrary {
                    name: name.to_ascii_lowercase(),
                    version: version.split_whitespace().next().map(str::to_string),
                });
            }
        }

        Self::flag_vulnerable_components(&mut profile);

        tracing::debug!(
            host = %target.host,
            server = profile.web_server.as_deref().unwrap_or("-"),
            cms = profile.cms.as_deref().unwrap_or("-"),
            libraries = profile.libraries.len(),
            "fingerprint collected"
        );

        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_cms_from_generator_meta() {
        let body = r#"<html><head><meta name="generator" content="WordPress 5.8" /></head></html>"#;
        assert_eq!(
            HttpFingerprintProbe::detect_cms(body),
            Some("WordPress 5.8".to_string())
        );
    }

    #[test]
    fn detects_cms_from_path_markers() {
        let body = r#"<img src="/wp-content/uploads/logo.png">"#;
        assert_eq!(
            HttpFingerprintProbe::detect_cms(body),
            Some("WordPress".to_string())
        );
    }

    #[test]
    fn detects_versioned_libraries() {
        let body = r#"<script src="/js/jquery-1.8.3.min.js"></script>
                      <link href="/css/bootstrap/3.3.7/bootstrap.min.css">"#;
        let libraries = HttpFingerprintProbe::detect_libraries(body);
        assert_eq!(libraries.len(), 2);
        assert_eq!(libraries[0].name, "jquery");
        assert_eq!(libraries[0].version.as_deref(), Some("1.8.3"));
        assert_eq!(libraries[1].name, "bootstrap");
    }

    #[test]
    fn flags_ancient_jquery_as_vulnerable_component() {
        let mut profile = TechnologyProfile {
            libraries: vec![DetectedLibrary {
                name: "jquery".into(),
                version: Some("1.8.3".into()),
            }],
            ..Default::default()
        };
        HttpFingerprintProbe::flag_vulnerable_components(&mut profile);
        assert_eq!(profile.vulnerable_components.len(), 1);
        assert_eq!(profile.vulnerable_components[0].severity, Severity::High);
    }
}
