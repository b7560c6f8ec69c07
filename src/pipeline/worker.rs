use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::OwnedSemaphorePermit;
use tokio::time::{timeout, Duration};
use tracing::error;

use crate::engines::{TranscribeOptions, TranscriptionEngine};
use crate::providers::SummaryProvider;

use super::orchestrator::{Orchestrator, StageOutput, MIDPOINT_PROGRESS};
use super::types::{Job, JobKind, Stage};

/// The original deployment allowed the LLM thirty minutes per summary.
const SUMMARY_TIMEOUT_SECS: u64 = 1800;

pub(crate) struct WorkerInput {
    pub job: Job,
    pub audio: Vec<u8>,
    pub filename: String,
    pub options: TranscribeOptions,
    pub model: Option<String>,
    pub timeout_secs: u64,
}

/// The single detached unit of execution bound to one job. Every external
/// call is bounded by a deadline and every failure path ends in
/// `Orchestrator::fail`, so a job can never be left in `processing`.
pub(crate) async fn run(
    orchestrator: Arc<Orchestrator>,
    input: WorkerInput,
    engine: Arc<dyn TranscriptionEngine>,
    provider: Option<Arc<dyn SummaryProvider>>,
    permit: OwnedSemaphorePermit,
) {
    // released when the worker exits, whatever the outcome
    let _permit = permit;
    let job_id = input.job.id.clone();
    let kind = input.job.kind;

    report(&orchestrator, &job_id, 5).await;

    // engine-side progress is forwarded into the state machine; a combined
    // job maps it into the first half of the progress range
    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<u8>();
    let forwarder = tokio::spawn({
        let orchestrator = orchestrator.clone();
        let job_id = job_id.clone();
        async move {
            while let Some(percent) = progress_rx.recv().await {
                let scaled = match kind {
                    JobKind::Transcription => percent.min(99),
                    JobKind::Process => (percent / 2).min(MIDPOINT_PROGRESS - 1),
                };
                if let Err(e) = orchestrator.report_progress(&job_id, scaled).await {
                    error!("Failed to record progress for job {}: {}", job_id, e);
                }
            }
        }
    });

    let deadline = Duration::from_secs(input.timeout_secs);
    let transcription = timeout(
        deadline,
        engine.transcribe(&input.audio, &input.filename, &input.options, progress_tx),
    )
    .await;
    // the transcribe future (and its progress sender) is gone either way;
    // drain the forwarder before touching progress again
    let _ = forwarder.await;

    let transcript = match transcription {
        Err(_) => {
            fail(
                &orchestrator,
                &job_id,
                Stage::Transcription,
                &format!("timeout: transcription exceeded {}s", input.timeout_secs),
            )
            .await;
            return;
        }
        Ok(Err(e)) => {
            fail(&orchestrator, &job_id, Stage::Transcription, &e.to_string()).await;
            return;
        }
        Ok(Ok(transcript)) => transcript,
    };

    match kind {
        JobKind::Transcription => {
            complete(
                &orchestrator,
                &job_id,
                StageOutput::Transcript(transcript),
            )
            .await;
        }
        JobKind::Process => {
            let Some(provider) = provider else {
                fail(
                    &orchestrator,
                    &job_id,
                    Stage::Summary,
                    "no summary provider bound to job",
                )
                .await;
                return;
            };

            complete(
                &orchestrator,
                &job_id,
                StageOutput::Transcript(transcript.clone()),
            )
            .await;

            let summary = timeout(
                Duration::from_secs(SUMMARY_TIMEOUT_SECS),
                provider.summarize(&transcript.text, input.model.as_deref()),
            )
            .await;

            match summary {
                Err(_) => {
                    fail(
                        &orchestrator,
                        &job_id,
                        Stage::Summary,
                        &format!("timeout: summary exceeded {}s", SUMMARY_TIMEOUT_SECS),
                    )
                    .await;
                }
                Ok(Err(e)) => {
                    fail(&orchestrator, &job_id, Stage::Summary, &e.to_string()).await;
                }
                Ok(Ok(summary)) => {
                    complete(
                        &orchestrator,
                        &job_id,
                        StageOutput::Summary {
                            transcription: transcript,
                            summary,
                        },
                    )
                    .await;
                }
            }
        }
    }
}

async fn report(orchestrator: &Orchestrator, job_id: &str, percent: u8) {
    if let Err(e) = orchestrator.report_progress(job_id, percent).await {
        error!("Failed to record progress for job {}: {}", job_id, e);
    }
}

async fn complete(orchestrator: &Orchestrator, job_id: &str, output: StageOutput) {
    if let Err(e) = orchestrator.complete_stage(job_id, output).await {
        error!("Failed to record stage result for job {}: {}", job_id, e);
    }
}

async fn fail(orchestrator: &Orchestrator, job_id: &str, stage: Stage, message: &str) {
    if let Err(e) = orchestrator.fail(job_id, stage, message).await {
        error!("Failed to record failure for job {}: {}", job_id, e);
    }
}
