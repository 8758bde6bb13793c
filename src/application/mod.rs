//! Application layer: scan pipeline orchestration and result aggregation.

pub mod aggregation;
pub mod use_cases;

pub use aggregation::{AggregateFindingsUseCase, AggregationInput};
pub use use_cases::{
    CreateScanJobUseCase, ExecuteScanJobUseCase, PipelineError, ProbeTimeouts, ScanRequestError,
};
