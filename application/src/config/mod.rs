//! Application configuration types

pub mod execution_params;
pub mod pipeline_plan;

pub use execution_params::ExecutionParams;
pub use pipeline_plan::PipelinePlan;
