//! Vigil — coordinated web security scanning service
//!
//! Vigil runs a set of independent security probes against a single web
//! target, tracks progress for asynchronous pollers, and merges the probes'
//! outputs into one deduplicated, severity-scored report.
//!
//! # Architecture
//!
//! ```text
//! vigil/
//! ├── domain/           # Entities, value objects, probe capability traits
//! ├── application/      # Scan pipeline orchestration and aggregation
//! ├── infrastructure/   # Admission control, job store, target validation,
//! │                     # production probe implementations
//! ├── presentation/     # axum handlers, DTOs, router, OpenAPI docs
//! └── config/           # Strongly-typed configuration
//! ```
//!
//! # Configuration
//!
//! Environment variables use the `VIGIL__` prefix with double underscore
//! separators:
//!
//! ```bash
//! VIGIL__SERVER__PORT=8080
//! VIGIL__SCAN__MAX_CONCURRENT_SCANS=10
//! ```

mod app;

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod logging;
pub mod presentation;

pub use app::{AppHandle, create_app};
pub use config::Config;
pub use logging::init_tracing;
