//! Infrastructure: admission control, job storage, target validation, and
//! the production probe implementations.

pub mod admission;
pub mod job_store;
pub mod probes;
pub mod target;

pub use admission::{AdmissionController, AdmissionPermit, AdmissionRejected};
pub use job_store::{InMemoryScanJobStore, JobStoreError, ScanJobStore, ScanUpdate};
pub use target::{TargetError, TargetValidator};
