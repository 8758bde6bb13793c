//! Scan job use cases: admission-side creation and the probe pipeline.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::time::timeout;
use uuid::Uuid;

use crate::application::aggregation::{AggregateFindingsUseCase, AggregationInput};
use crate::domain::entities::{ScanJob, TechnologyProfile};
use crate::domain::probes::{
    CertificateProbe, CveLookupProbe, FingerprintProbe, PortScanProbe, QuickVulnerabilityKb,
    TemplateProbe,
};
use crate::domain::value_objects::{Finding, ScanPhase, ScanTarget, Severity};
use crate::infrastructure::admission::AdmissionPermit;
use crate::infrastructure::job_store::{JobStoreError, ScanJobStore, ScanUpdate};
use crate::infrastructure::target::{TargetError, TargetValidator};

// Reference progress values for each pipeline phase.
const PROGRESS_DETECTION: u8 = 10;
const PROGRESS_KNOWLEDGE_BASE: u8 = 20;
const PROGRESS_PARALLEL_START: u8 = 30;
const PROGRESS_PARALLEL_SPAN: u8 = 55;
const PROGRESS_CVE_LOOKUP: u8 = 85;
const PROGRESS_AGGREGATE: u8 = 95;
const PROGRESS_FINALIZE: u8 = 98;

const PARALLEL_PROBES: usize = 3;

/// Rejected scan requests; all map to a caller-visible 400.
#[derive(Debug, thiserror::Error)]
pub enum ScanRequestError {
    #[error(transparent)]
    InvalidTarget(#[from] TargetError),
}

/// Failures outside probe isolation; these terminate the job as Failed.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] JobStoreError),
}

/// Hard per-probe timeouts; the fan-in join is bounded by their maximum.
#[derive(Debug, Clone, Copy)]
pub struct ProbeTimeouts {
    pub fingerprint: Duration,
    pub port_scan: Duration,
    pub certificate: Duration,
    pub templates: Duration,
    pub cve_lookup: Duration,
}

/// Validates the target and registers the job record.
///
/// Parse-stage failures never create a job; resolution-stage failures mark
/// the already-created record Rejected while the caller still receives the
/// synchronous 400.
pub struct CreateScanJobUseCase {
    validator: TargetValidator,
    store: Arc<dyn ScanJobStore>,
}

impl CreateScanJobUseCase {
    pub fn new(validator: TargetValidator, store: Arc<dyn ScanJobStore>) -> Self {
        Self { validator, store }
    }

    pub async fn execute(&self, raw_target: &str) -> Result<(ScanJob, ScanTarget), ScanRequestError> {
        let pending = self.validator.parse(raw_target)?;
        let job = self
            .store
            .create(pending.url.to_string(), pending.host.clone())
            .await;

        match self.validator.resolve(pending).await {
            Ok(target) => Ok((job, target)),
            Err(error) => {
                tracing::info!(scan_id = %job.scan_id, error = %error, "target rejected");
                if let Err(store_error) =
                    self.store.reject(job.scan_id, error.to_string()).await
                {
                    tracing::warn!(scan_id = %job.scan_id, error = %store_error, "failed to mark job rejected");
                }
                Err(error.into())
            }
        }
    }
}

/// A probe call settled into data: findings plus an optional error message.
struct SettledProbe {
    findings: Vec<Finding>,
    error: Option<String>,
}

impl SettledProbe {
    fn failed(message: String) -> Self {
        Self {
            findings: Vec::new(),
            error: Some(message),
        }
    }
}

/// Drives one admitted scan job through the probe pipeline.
pub struct ExecuteScanJobUseCase {
    store: Arc<dyn ScanJobStore>,
    fingerprint: Arc<dyn FingerprintProbe>,
    ports: Arc<dyn PortScanProbe>,
    certificate: Arc<dyn CertificateProbe>,
    templates: Arc<dyn TemplateProbe>,
    cve: Arc<dyn CveLookupProbe>,
    quick_kb: Arc<dyn QuickVulnerabilityKb>,
    aggregator: AggregateFindingsUseCase,
    timeouts: ProbeTimeouts,
}

impl ExecuteScanJobUseCase {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn ScanJobStore>,
        fingerprint: Arc<dyn FingerprintProbe>,
        ports: Arc<dyn PortScanProbe>,
        certificate: Arc<dyn CertificateProbe>,
        templates: Arc<dyn TemplateProbe>,
        cve: Arc<dyn CveLookupProbe>,
        quick_kb: Arc<dyn QuickVulnerabilityKb>,
        timeouts: ProbeTimeouts,
    ) -> Self {
        Self {
            store,
            fingerprint,
            ports,
            certificate,
            templates,
            cve,
            quick_kb,
            aggregator: AggregateFindingsUseCase::new(),
            timeouts,
        }
    }

    /// Spawn the pipeline task for an admitted job. The permit moves into
    /// the task and is released on every exit path, panics included.
    pub fn spawn(self: &Arc<Self>, job_id: Uuid, target: ScanTarget, permit: AdmissionPermit) {
        let pipeline = Arc::clone(self);
        tokio::spawn(async move {
            let _permit = permit;
            if let Err(error) = pipeline.run(job_id, &target).await {
                tracing::error!(scan_id = %job_id, error = %error, "scan pipeline failed");
                if let Err(store_error) = pipeline.store.fail(job_id, error.to_string()).await {
                    tracing::warn!(scan_id = %job_id, error = %store_error, "failed to mark job failed");
                }
            }
        });
    }

    async fn run(&self, id: Uuid, target: &ScanTarget) -> Result<(), PipelineError> {
        self.store.start(id).await?;
        self.store
            .update(
                id,
                ScanUpdate::phase(ScanPhase::Detection).with_progress(PROGRESS_DETECTION),
            )
            .await?;

        let mut probe_errors: BTreeMap<String, String> = BTreeMap::new();

        // Sequential fingerprint phase; failure is non-fatal.
        let technology =
            match timeout(self.timeouts.fingerprint, self.fingerprint.fingerprint(target)).await {
                Ok(Ok(profile)) => profile,
                Ok(Err(error)) => {
                    probe_errors.insert("detection".into(), error.to_string());
                    TechnologyProfile::default()
                }
                Err(_) => {
                    probe_errors.insert(
                        "detection".into(),
                        timeout_message(self.timeouts.fingerprint),
                    );
                    TechnologyProfile::default()
                }
            };
        self.store
            .update(
                id,
                ScanUpdate::phase(ScanPhase::KnowledgeBase).with_progress(PROGRESS_KNOWLEDGE_BASE),
            )
            .await?;

        // Local knowledge-base phase; synchronous, cannot fail the job.
        let kb_findings = self.consult_knowledge_base(&technology);
        self.store
            .update(
                id,
                ScanUpdate::phase(ScanPhase::ParallelScans).with_progress(PROGRESS_PARALLEL_START),
            )
            .await?;

        // Parallel network-probe phase: fan out, join on all three. Each
        // probe settles into data and bumps progress as it lands, in
        // whatever order completions arrive.
        let completed = AtomicUsize::new(0);

        let ports_settled = async {
            let settled = match timeout(self.timeouts.port_scan, self.ports.scan(target)).await {
                Ok(Ok(outcome)) => {
                    tracing::debug!(scan_id = %id, services = outcome.services.len(), "port scan settled");
                    SettledProbe {
                        findings: outcome.findings,
                        error: None,
                    }
                }
                Ok(Err(error)) => SettledProbe::failed(error.to_string()),
                Err(_) => SettledProbe::failed(timeout_message(self.timeouts.port_scan)),
            };
            self.bump_parallel_progress(id, &completed).await;
            settled
        };

        let certificates_settled = async {
            let settled =
                match timeout(self.timeouts.certificate, self.certificate.grade(target)).await {
                    Ok(Ok(outcome)) => {
                        tracing::debug!(scan_id = %id, grade = ?outcome.grade, "certificate grading settled");
                        SettledProbe {
                            findings: outcome.findings,
                            error: None,
                        }
                    }
                    Ok(Err(error)) => SettledProbe::failed(error.to_string()),
                    Err(_) => SettledProbe::failed(timeout_message(self.timeouts.certificate)),
                };
            self.bump_parallel_progress(id, &completed).await;
            settled
        };

        let templates_settled = async {
            let settled = match timeout(self.timeouts.templates, self.templates.run(target)).await {
                Ok(Ok(findings)) => SettledProbe {
                    findings,
                    error: None,
                },
                Ok(Err(error)) => SettledProbe::failed(error.to_string()),
                Err(_) => SettledProbe::failed(timeout_message(self.timeouts.templates)),
            };
            self.bump_parallel_progress(id, &completed).await;
            settled
        };

        let (ports, certificates, templates) =
            tokio::join!(ports_settled, certificates_settled, templates_settled);

        for (key, settled) in [
            ("ports", &ports),
            ("certificates", &certificates),
            ("templates", &templates),
        ] {
            if let Some(error) = &settled.error {
                tracing::warn!(scan_id = %id, probe = key, error = %error, "probe failed in isolation");
                probe_errors.insert(key.into(), error.clone());
            }
        }

        self.store
            .update(
                id,
                ScanUpdate::phase(ScanPhase::CveLookup).with_progress(PROGRESS_CVE_LOOKUP),
            )
            .await?;

        // CVE lookup phase; failure is non-fatal.
        let cve_findings =
            match timeout(self.timeouts.cve_lookup, self.cve.lookup(&technology)).await {
                Ok(Ok(findings)) => findings,
                Ok(Err(error)) => {
                    probe_errors.insert("cve".into(), error.to_string());
                    Vec::new()
                }
                Err(_) => {
                    probe_errors.insert("cve".into(), timeout_message(self.timeouts.cve_lookup));
                    Vec::new()
                }
            };
        self.store
            .update(
                id,
                ScanUpdate::phase(ScanPhase::Aggregate).with_progress(PROGRESS_AGGREGATE),
            )
            .await?;

        // Aggregation phase: concatenate every list in pipeline order.
        let mut findings = Vec::new();
        findings.extend(technology.vulnerable_components.clone());
        findings.extend(kb_findings);
        findings.extend(ports.findings);
        findings.extend(certificates.findings);
        findings.extend(templates.findings);
        findings.extend(cve_findings);
        if !target.is_https() {
            findings.push(plaintext_transport_finding());
        }

        let report = self.aggregator.execute(AggregationInput {
            target_url: target.url.to_string(),
            technology,
            findings,
            probe_errors,
        });

        self.store
            .update(id, ScanUpdate::progress(PROGRESS_FINALIZE))
            .await?;

        tracing::info!(
            scan_id = %id,
            score = report.score,
            grade = %report.grade,
            issues = report.total_issues,
            "scan completed"
        );
        self.store.complete(id, report).await?;
        Ok(())
    }

    /// Quick version checks on whatever the fingerprint turned up.
    fn consult_knowledge_base(&self, technology: &TechnologyProfile) -> Vec<Finding> {
        let mut findings = Vec::new();
        if let Some((name, version)) = technology.server_component() {
            if let Some(finding) = self.quick_kb.lookup(&name, &version) {
                findings.push(finding);
            }
        }
        for library in &technology.libraries {
            if let Some(version) = &library.version {
                if let Some(finding) = self.quick_kb.lookup(&library.name, version) {
                    findings.push(finding);
                }
            }
        }
        findings
    }

    async fn bump_parallel_progress(&self, id: Uuid, completed: &AtomicUsize) {
        let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
        let percent = PROGRESS_PARALLEL_START
            + ((PROGRESS_PARALLEL_SPAN as usize * done.min(PARALLEL_PROBES)) / PARALLEL_PROBES)
                as u8;
        if let Err(error) = self.store.update(id, ScanUpdate::progress(percent)).await {
            tracing::warn!(scan_id = %id, error = %error, "progress update dropped");
        }
    }
}

fn timeout_message(limit: Duration) -> String {
    format!("probe timed out after {}s", limit.as_secs_f32())
}

fn plaintext_transport_finding() -> Finding {
    Finding::new(
        Severity::High,
        "Unencrypted Transport",
        "The site is served over plain HTTP; traffic can be read and modified in transit.",
        "Serve the site over HTTPS and redirect all http:// requests.",
        "transport",
    )
    .with_owasp("A02:2021")
}
