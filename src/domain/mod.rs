//! Core domain model for scan jobs, findings, and probe capabilities

pub mod entities;
pub mod probes;
pub mod value_objects;
