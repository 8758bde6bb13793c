//! Application setup and wiring

use std::sync::Arc;

use axum::Router;
use tokio_util::sync::CancellationToken;

use crate::application::use_cases::{CreateScanJobUseCase, ExecuteScanJobUseCase};
use crate::config::Config;
use crate::infrastructure::admission::AdmissionController;
use crate::infrastructure::job_store::{InMemoryScanJobStore, ScanJobStore};
use crate::infrastructure::probes::{
    HttpFingerprintProbe, HttpTemplateProbe, RustlsCertificateProbe, StaticCveLookupProbe,
    StaticQuickVulnerabilityKb, TcpPortScanProbe,
};
use crate::infrastructure::target::TargetValidator;
use crate::presentation::controllers::AppState;
use crate::presentation::routes::create_router;

/// Handle returned from create_app for graceful shutdown coordination
pub struct AppHandle {
    pub router: Router,
    pub shutdown_token: CancellationToken,
}

/// Wire up stores, probes, use cases, and the router.
pub fn create_app(config: Config) -> Result<AppHandle, Box<dyn std::error::Error + Send + Sync>> {
    let shutdown_token = CancellationToken::new();

    // Shared probe HTTP client. Broken TLS on the target is a finding, not a
    // reason to abort, so certificate errors are tolerated here.
    let client = reqwest::Client::builder()
        .user_agent(&config.probes.http_user_agent)
        .danger_accept_invalid_certs(true)
        .connect_timeout(std::time::Duration::from_secs(10))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()?;

    let store = Arc::new(InMemoryScanJobStore::new(config.scan.retention()));
    store
        .clone()
        .spawn_sweeper(config.scan.sweep_interval(), shutdown_token.clone());
    let store: Arc<dyn ScanJobStore> = store;

    let admission = Arc::new(AdmissionController::new(config.scan.max_concurrent_scans));

    let create_scan = Arc::new(CreateScanJobUseCase::new(
        TargetValidator::new(),
        store.clone(),
    ));

    let execute_scan = Arc::new(ExecuteScanJobUseCase::new(
        store.clone(),
        Arc::new(HttpFingerprintProbe::new(client.clone())),
        Arc::new(TcpPortScanProbe::new(
            config.probes.port_connect_timeout(),
            config.probes.port_scan_concurrency,
        )),
        Arc::new(RustlsCertificateProbe::new()),
        Arc::new(HttpTemplateProbe::new(client)),
        Arc::new(StaticCveLookupProbe::new()),
        Arc::new(StaticQuickVulnerabilityKb::new()),
        config.probes.timeouts(),
    ));

    let state = AppState {
        create_scan,
        execute_scan,
        admission,
        store,
    };

    let router = create_router(state, &config);

    Ok(AppHandle {
        router,
        shutdown_token,
    })
}
