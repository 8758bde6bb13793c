//! Route definitions and router assembly

use std::time::Duration;

use axum::{
    Router,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::Config;
use crate::presentation::controllers::{
    AppState, get_scan_status, health_check, root_handler, start_scan,
};
use crate::presentation::models::*;

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::presentation::controllers::start_scan,
        crate::presentation::controllers::get_scan_status,
        crate::presentation::controllers::health_check,
    ),
    components(schemas(
        ScanRequest,
        ScanAcceptedResponse,
        CapacityResponse,
        ErrorResponse,
        ScanStatusResponse,
        HealthResponse,
        crate::domain::entities::AggregatedReport,
        crate::domain::entities::SeverityCounts,
        crate::domain::entities::TechnologyProfile,
        crate::domain::entities::DetectedLibrary,
        crate::domain::value_objects::Finding,
        crate::domain::value_objects::Severity,
        crate::domain::value_objects::Grade,
    )),
    tags(
        (name = "scans", description = "Scan orchestration"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;

/// Assemble the full application router.
pub fn create_router(state: AppState, config: &Config) -> Router {
    let api = Router::new()
        .route("/scan", post(start_scan))
        .route("/scan/{scan_id}/status", get(get_scan_status));

    let mut router = Router::new()
        .nest("/api/v1", api)
        .route("/", get(root_handler))
        .route("/health", get(health_check))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(TimeoutLayer::new(Duration::from_secs(
                    config.server.request_timeout_seconds,
                ))),
        );

    if config.server.enable_docs {
        router = router
            .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()));
    }

    router
}
