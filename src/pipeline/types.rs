use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engines::EngineKind;
use crate::providers::ProviderKind;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// audio -> transcript
    Transcription,
    /// audio -> transcript -> summary, one combined job
    Process,
}

impl Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobKind::Transcription => write!(f, "transcription"),
            JobKind::Process => write!(f, "process"),
        }
    }
}

impl TryFrom<String> for JobKind {
    type Error = String;
    fn try_from(kind: String) -> Result<Self, Self::Error> {
        match kind.as_str() {
            "transcription" => Ok(JobKind::Transcription),
            "process" => Ok(JobKind::Process),
            _ => Err(format!("Invalid job kind: {}", kind)),
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Error => write!(f, "error"),
        }
    }
}

impl TryFrom<String> for JobStatus {
    type Error = String;
    fn try_from(status: String) -> Result<Self, <JobStatus as TryFrom<String>>::Error> {
        match status.as_str() {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "error" => Ok(JobStatus::Error),
            _ => Err(format!("Invalid job status: {}", status)),
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Transcription,
    Summary,
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Transcription => write!(f, "transcription"),
            Stage::Summary => write!(f, "summary"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptResult {
    pub text: String,
    pub segments: Vec<TranscriptSegment>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryResult {
    pub text: String,
    pub model: String,
    pub provider: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "result", rename_all = "lowercase")]
pub enum JobResult {
    Transcript(TranscriptResult),
    Process {
        transcription: TranscriptResult,
        summary: SummaryResult,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobError {
    pub stage: Stage,
    pub message: String,
}

/// A unit of pipeline work, tracked through
/// `pending -> processing -> {completed | error}`.
///
/// Exactly one of `result`/`error` is set, and only in a terminal status.
/// `progress` never decreases. The engine and provider bound at submission
/// never change for the lifetime of the job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub meeting_id: String,
    pub kind: JobKind,
    pub status: JobStatus,
    pub progress: u8,
    pub engine: EngineKind,
    pub provider: Option<ProviderKind>,
    pub result: Option<JobResult>,
    pub error: Option<JobError>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(
        meeting_id: String,
        kind: JobKind,
        engine: EngineKind,
        provider: Option<ProviderKind>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: format!("job-{}", Uuid::new_v4()),
            meeting_id,
            kind,
            status: JobStatus::Pending,
            progress: 0,
            engine,
            provider,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}
