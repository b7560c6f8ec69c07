pub mod error;
pub mod orchestrator;
pub mod timeout;
pub mod types;
pub(crate) mod worker;

#[cfg(test)]
mod tests;

pub use error::PipelineError;
pub use orchestrator::{Orchestrator, StageOutput, SubmitRequest};
pub use timeout::compute_timeout_secs;
pub use types::{
    Job, JobError, JobKind, JobResult, JobStatus, Stage, SummaryResult, TranscriptResult,
    TranscriptSegment,
};
