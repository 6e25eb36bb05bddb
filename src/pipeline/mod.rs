//! Pipeline spec types and the deterministic stage executor

pub mod executor;
pub mod spec;

pub use executor::{ExecutionReport, RunControl, StageDiagnostic};
pub use spec::{OutputRequest, PipelineSpec, StageInvocation};
