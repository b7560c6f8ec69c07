use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::AbortHandle;
use tracing::{info, warn};

use crate::engines::{EngineKind, EngineRegistry, TranscribeOptions};
use crate::providers::{ProviderKind, ProviderRegistry};
use crate::storage::job::{JobFilter, JobPatch, JobStore};
use crate::storage::meeting::{MeetingPatch, MeetingStatus, MeetingStore};

use super::error::PipelineError;
use super::timeout::compute_timeout_secs;
use super::types::{Job, JobError, JobKind, JobResult, JobStatus, Stage, SummaryResult, TranscriptResult};
use super::worker;

/// Progress a combined job jumps to when its transcription stage finishes.
pub(crate) const MIDPOINT_PROGRESS: u8 = 50;

#[derive(Debug)]
pub struct SubmitRequest {
    pub meeting_id: String,
    pub audio: Vec<u8>,
    pub filename: String,
    pub kind: JobKind,
    pub language: Option<String>,
    pub model: Option<String>,
    pub engine: Option<EngineKind>,
    pub provider: Option<ProviderKind>,
    /// Operator override; the timeout policy computes the deadline otherwise.
    pub timeout_secs: Option<u64>,
}

/// Output of a finished stage, reported by the bound worker.
#[derive(Debug)]
pub enum StageOutput {
    Transcript(TranscriptResult),
    Summary {
        transcription: TranscriptResult,
        summary: SummaryResult,
    },
}

/// Bookkeeping for a job that has a live worker. Presence in the map is the
/// in-memory source of truth for "not yet terminal"; terminal transitions
/// remove the entry, which makes every later mutation a no-op.
struct ActiveJob {
    kind: JobKind,
    meeting_id: String,
    stage: Stage,
    progress: u8,
    abort: AbortHandle,
}

/// The pipeline state machine. Sole writer of job records: the HTTP surface
/// and the workers both mutate job state exclusively through these methods,
/// and each mutation holds the `active` lock, so transitions for a job are
/// applied one at a time.
pub struct Orchestrator {
    store: Arc<dyn JobStore>,
    meetings: Arc<dyn MeetingStore>,
    engines: Arc<EngineRegistry>,
    providers: Arc<ProviderRegistry>,
    active: Mutex<HashMap<String, ActiveJob>>,
    permits: Arc<Semaphore>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn JobStore>,
        meetings: Arc<dyn MeetingStore>,
        engines: Arc<EngineRegistry>,
        providers: Arc<ProviderRegistry>,
        max_concurrent_jobs: usize,
    ) -> Self {
        Self {
            store,
            meetings,
            engines,
            providers,
            active: Mutex::new(HashMap::new()),
            permits: Arc::new(Semaphore::new(max_concurrent_jobs)),
        }
    }

    /// Validate, pick backends, compute the deadline and launch exactly one
    /// background worker. Returns as soon as the job record exists; callers
    /// poll `get_status` for the rest. Any error here means no job was
    /// created.
    pub async fn submit(self: &Arc<Self>, request: SubmitRequest) -> Result<Job, PipelineError> {
        if request.audio.is_empty() {
            return Err(PipelineError::EmptyInput);
        }

        let engine = self.engines.resolve(request.engine).await?;
        let provider = match request.kind {
            JobKind::Process => Some(self.providers.resolve(request.provider).await?),
            JobKind::Transcription => None,
        };

        let file_size_mb = request.audio.len() as f64 / (1024.0 * 1024.0);
        let timeout_secs = request
            .timeout_secs
            .unwrap_or_else(|| compute_timeout_secs(file_size_mb, engine.descriptor().multiplier));

        let permit = self
            .permits
            .clone()
            .try_acquire_owned()
            .map_err(|_| PipelineError::Busy)?;

        let job = Job::new(
            request.meeting_id.clone(),
            request.kind,
            engine.descriptor().kind,
            provider.as_ref().map(|p| p.kind()),
        );
        self.store.create(&job).await.map_err(PipelineError::from)?;

        info!(
            "Job {} submitted ({}, engine {}, {:.1} MB, timeout {}s)",
            job.id, job.kind, job.engine, file_size_mb, timeout_secs
        );

        let input = worker::WorkerInput {
            job: job.clone(),
            audio: request.audio,
            filename: request.filename,
            options: TranscribeOptions {
                language: request.language,
            },
            model: request.model,
            timeout_secs,
        };

        // hold the lock across the spawn so the worker's first mutation
        // cannot race the bookkeeping insert
        let mut active = self.active.lock().await;
        let handle = tokio::spawn(worker::run(self.clone(), input, engine, provider, permit));
        active.insert(
            job.id.clone(),
            ActiveJob {
                kind: job.kind,
                meeting_id: job.meeting_id.clone(),
                stage: Stage::Transcription,
                progress: 0,
                abort: handle.abort_handle(),
            },
        );

        Ok(job)
    }

    /// Called only by the bound worker. Regressions and writes to terminal
    /// jobs are dropped (and logged), which keeps progress monotone even if
    /// a stray update arrives late.
    pub async fn report_progress(&self, job_id: &str, percent: u8) -> Result<()> {
        let mut active = self.active.lock().await;
        let Some(info) = active.get_mut(job_id) else {
            warn!("Dropping progress for inactive job {}", job_id);
            return Ok(());
        };
        if percent < info.progress {
            warn!(
                "Dropping progress regression for job {} ({} -> {})",
                job_id, info.progress, percent
            );
            return Ok(());
        }
        info.progress = percent;

        self.store
            .update(
                job_id,
                &JobPatch::default()
                    .status(JobStatus::Processing)
                    .progress(percent),
            )
            .await
    }

    /// Apply a finished stage. A transcript on a combined job advances it to
    /// the mid-point and hands control to the summary stage; anything else
    /// is terminal.
    pub async fn complete_stage(&self, job_id: &str, output: StageOutput) -> Result<()> {
        let mut active = self.active.lock().await;
        let Some(mut info) = active.remove(job_id) else {
            warn!("Dropping stage result for inactive job {}", job_id);
            return Ok(());
        };

        match output {
            StageOutput::Transcript(transcript) if info.kind == JobKind::Process => {
                info.stage = Stage::Summary;
                info.progress = MIDPOINT_PROGRESS;
                let meeting_id = info.meeting_id.clone();
                active.insert(job_id.to_string(), info);

                self.store
                    .update(
                        job_id,
                        &JobPatch::default()
                            .status(JobStatus::Processing)
                            .progress(MIDPOINT_PROGRESS),
                    )
                    .await?;
                self.meetings
                    .update(
                        &meeting_id,
                        &MeetingPatch::default()
                            .status(MeetingStatus::Summarizing)
                            .transcription(transcript),
                    )
                    .await?;
                info!("Job {} transcription done, starting summary", job_id);
            }
            StageOutput::Transcript(transcript) => {
                self.store
                    .update(
                        job_id,
                        &JobPatch::default()
                            .status(JobStatus::Completed)
                            .progress(100)
                            .result(JobResult::Transcript(transcript.clone())),
                    )
                    .await?;
                self.meetings
                    .update(
                        &info.meeting_id,
                        &MeetingPatch::default()
                            .status(MeetingStatus::Completed)
                            .transcription(transcript),
                    )
                    .await?;
                info!("Job {} completed", job_id);
            }
            StageOutput::Summary {
                transcription,
                summary,
            } => {
                self.store
                    .update(
                        job_id,
                        &JobPatch::default()
                            .status(JobStatus::Completed)
                            .progress(100)
                            .result(JobResult::Process {
                                transcription: transcription.clone(),
                                summary: summary.clone(),
                            }),
                    )
                    .await?;
                self.meetings
                    .update(
                        &info.meeting_id,
                        &MeetingPatch::default()
                            .status(MeetingStatus::Completed)
                            .transcription(transcription)
                            .summary(summary),
                    )
                    .await?;
                info!("Job {} completed", job_id);
            }
        }

        Ok(())
    }

    /// Terminal failure for one stage. No-op once the job is terminal.
    pub async fn fail(&self, job_id: &str, stage: Stage, message: &str) -> Result<()> {
        let mut active = self.active.lock().await;
        let Some(info) = active.remove(job_id) else {
            warn!("Dropping failure for inactive job {}: {}", job_id, message);
            return Ok(());
        };

        warn!("Job {} failed at {}: {}", job_id, stage, message);
        self.store
            .update(
                job_id,
                &JobPatch::default().status(JobStatus::Error).error(JobError {
                    stage,
                    message: message.to_string(),
                }),
            )
            .await?;
        self.meetings
            .update(
                &info.meeting_id,
                &MeetingPatch::default()
                    .status(MeetingStatus::Error)
                    .error(message.to_string()),
            )
            .await?;

        Ok(())
    }

    /// Abort the worker and mark the job failed. Idempotent: cancelling an
    /// unknown or already-terminal job does nothing and reports `false`.
    pub async fn cancel(&self, job_id: &str) -> Result<bool> {
        let mut active = self.active.lock().await;
        let Some(info) = active.remove(job_id) else {
            return Ok(false);
        };

        info.abort.abort();
        info!("Job {} cancelled", job_id);
        self.store
            .update(
                job_id,
                &JobPatch::default().status(JobStatus::Error).error(JobError {
                    stage: info.stage,
                    message: "cancelled by caller".to_string(),
                }),
            )
            .await?;
        self.meetings
            .update(
                &info.meeting_id,
                &MeetingPatch::default()
                    .status(MeetingStatus::Error)
                    .error("cancelled by caller".to_string()),
            )
            .await?;

        Ok(true)
    }

    /// Read-only view for pollers. `None` means the id was never a job,
    /// which is distinct from a job that terminated with an error.
    pub async fn get_status(&self, job_id: &str) -> Result<Option<Job>> {
        self.store.get(job_id).await
    }

    pub async fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<Job>> {
        self.store.list(filter).await
    }
}
