use std::fmt::Display;

/// Submission-time errors are returned to the caller and never produce a
/// stored job. Errors after a job exists are captured in the job's `error`
/// field instead; they never travel through this type.
#[derive(Debug)]
pub enum PipelineError {
    /// missing or empty audio/text input
    EmptyInput,
    EngineUnavailable(String),
    ProviderUnavailable(String),
    /// admission rejected, all worker permits are in use
    Busy,
    Internal(String),
}

impl Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::EmptyInput => write!(f, "input is missing or empty"),
            PipelineError::EngineUnavailable(name) => {
                write!(f, "transcription engine {} is unavailable", name)
            }
            PipelineError::ProviderUnavailable(name) => {
                write!(f, "summary provider {} is unavailable", name)
            }
            PipelineError::Busy => write!(f, "too many jobs in flight, try again later"),
            PipelineError::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl From<anyhow::Error> for PipelineError {
    fn from(error: anyhow::Error) -> Self {
        PipelineError::Internal(error.to_string())
    }
}
