use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{sleep, Duration};

use crate::engines::{
    EngineDescriptor, EngineKind, EngineRegistry, TranscribeOptions, TranscriptionEngine,
};
use crate::pipeline::error::PipelineError;
use crate::pipeline::orchestrator::{Orchestrator, SubmitRequest};
use crate::pipeline::types::*;
use crate::providers::{ProviderKind, ProviderRegistry, SummaryProvider};
use crate::storage;
use crate::storage::job::{JobFilter, JobStore, SqliteJobStore};
use crate::storage::meeting::{Meeting, MeetingStatus, MeetingStore, SqliteMeetingStore};

#[derive(Clone, Copy)]
enum Behavior {
    Succeed,
    Fail(&'static str),
    Hang,
}

struct MockEngine {
    descriptor: EngineDescriptor,
    available: bool,
    behavior: Behavior,
}

#[async_trait]
impl TranscriptionEngine for MockEngine {
    fn descriptor(&self) -> &EngineDescriptor {
        &self.descriptor
    }

    async fn probe(&self) -> bool {
        self.available
    }

    async fn transcribe(
        &self,
        _audio: &[u8],
        _filename: &str,
        _options: &TranscribeOptions,
        progress: UnboundedSender<u8>,
    ) -> Result<TranscriptResult> {
        match self.behavior {
            Behavior::Succeed => {
                let _ = progress.send(60);
                Ok(TranscriptResult {
                    text: "the quick brown fox".to_string(),
                    segments: vec![TranscriptSegment {
                        text: "the quick brown fox".to_string(),
                        start: 0.0,
                        end: 2.5,
                    }],
                    language: Some("en".to_string()),
                })
            }
            Behavior::Fail(message) => anyhow::bail!(message),
            Behavior::Hang => std::future::pending().await,
        }
    }
}

struct MockProvider {
    behavior: Behavior,
    called: Arc<AtomicBool>,
}

#[async_trait]
impl SummaryProvider for MockProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    async fn probe(&self) -> bool {
        true
    }

    async fn summarize(&self, _text: &str, model: Option<&str>) -> Result<SummaryResult> {
        self.called.store(true, Ordering::SeqCst);
        match self.behavior {
            Behavior::Succeed => Ok(SummaryResult {
                text: "## Meeting Summary".to_string(),
                model: model.unwrap_or("default").to_string(),
                provider: ProviderKind::Ollama.to_string(),
                created_at: Utc::now(),
            }),
            Behavior::Fail(message) => anyhow::bail!(message),
            Behavior::Hang => std::future::pending().await,
        }
    }
}

struct TestEnv {
    orchestrator: Arc<Orchestrator>,
    store: Arc<SqliteJobStore>,
    meetings: Arc<SqliteMeetingStore>,
    provider_called: Arc<AtomicBool>,
    _dir: tempfile::TempDir,
}

async fn setup(engine: Behavior, engine_available: bool, provider: Behavior) -> Result<TestEnv> {
    setup_with_limit(engine, engine_available, provider, 8).await
}

async fn setup_with_limit(
    engine: Behavior,
    engine_available: bool,
    provider: Behavior,
    max_jobs: usize,
) -> Result<TestEnv> {
    let dir = tempfile::tempdir()?;
    let url = format!("sqlite://{}/pipeline.db?mode=rwc", dir.path().display());
    let pool = storage::connect(&url).await?;
    let store = Arc::new(SqliteJobStore::new(pool.clone()));
    let meetings = Arc::new(SqliteMeetingStore::new(pool));

    let engines = Arc::new(EngineRegistry::from_engines(
        vec![Arc::new(MockEngine {
            descriptor: EngineDescriptor {
                kind: EngineKind::FasterWhisper,
                multiplier: 1.0,
                endpoint: None,
                local: true,
            },
            available: engine_available,
            behavior: engine,
        })],
        EngineKind::FasterWhisper,
    ));

    let provider_called = Arc::new(AtomicBool::new(false));
    let providers = Arc::new(ProviderRegistry::from_providers(vec![Arc::new(
        MockProvider {
            behavior: provider,
            called: provider_called.clone(),
        },
    )]));

    let orchestrator = Arc::new(Orchestrator::new(
        store.clone(),
        meetings.clone(),
        engines,
        providers,
        max_jobs,
    ));

    Ok(TestEnv {
        orchestrator,
        store,
        meetings,
        provider_called,
        _dir: dir,
    })
}

async fn new_meeting(env: &TestEnv) -> Result<Meeting> {
    let meeting = Meeting::new("Test meeting".to_string(), None);
    env.meetings.create(&meeting).await?;
    Ok(meeting)
}

fn request(meeting_id: &str, kind: JobKind, audio: Vec<u8>) -> SubmitRequest {
    SubmitRequest {
        meeting_id: meeting_id.to_string(),
        audio,
        filename: "meeting.wav".to_string(),
        kind,
        language: None,
        model: None,
        engine: None,
        provider: None,
        timeout_secs: None,
    }
}

async fn wait_terminal(env: &TestEnv, job_id: &str) -> Result<Job> {
    for _ in 0..100 {
        if let Some(job) = env.orchestrator.get_status(job_id).await? {
            if job.status.is_terminal() {
                return Ok(job);
            }
        }
        sleep(Duration::from_millis(50)).await;
    }
    anyhow::bail!("job {} never reached a terminal state", job_id)
}

#[tokio::test]
async fn empty_audio_is_rejected_without_a_job() -> Result<()> {
    let env = setup(Behavior::Succeed, true, Behavior::Succeed).await?;
    let meeting = new_meeting(&env).await?;

    let err = env
        .orchestrator
        .submit(request(&meeting.id, JobKind::Process, Vec::new()))
        .await
        .err()
        .expect("empty audio must be rejected");
    assert!(matches!(err, PipelineError::EmptyInput));

    assert!(env.store.list(&JobFilter::default()).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn unavailable_engine_is_rejected_without_a_job() -> Result<()> {
    let env = setup(Behavior::Succeed, false, Behavior::Succeed).await?;
    let meeting = new_meeting(&env).await?;

    let mut req = request(&meeting.id, JobKind::Transcription, vec![1, 2, 3]);
    req.engine = Some(EngineKind::FasterWhisper);
    let err = env.orchestrator.submit(req).await.err().unwrap();
    assert!(matches!(err, PipelineError::EngineUnavailable(_)));

    assert!(env.store.list(&JobFilter::default()).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn process_job_runs_both_stages() -> Result<()> {
    let env = setup(Behavior::Succeed, true, Behavior::Succeed).await?;
    let meeting = new_meeting(&env).await?;

    let job = env
        .orchestrator
        .submit(request(&meeting.id, JobKind::Process, vec![0u8; 1024]))
        .await
        .unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.provider, Some(ProviderKind::Ollama));

    let done = wait_terminal(&env, &job.id).await?;
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.progress, 100);
    assert!(done.error.is_none());
    match done.result {
        Some(JobResult::Process {
            transcription,
            summary,
        }) => {
            assert_eq!(transcription.text, "the quick brown fox");
            assert_eq!(summary.provider, "ollama");
        }
        other => panic!("expected a combined result, got {:?}", other),
    }

    let meeting = env.meetings.get(&meeting.id).await?.unwrap();
    assert_eq!(meeting.status, MeetingStatus::Completed);
    assert!(meeting.transcription.is_some());
    assert!(meeting.summary.is_some());
    Ok(())
}

#[tokio::test]
async fn transcription_only_job_completes() -> Result<()> {
    let env = setup(Behavior::Succeed, true, Behavior::Succeed).await?;
    let meeting = new_meeting(&env).await?;

    let job = env
        .orchestrator
        .submit(request(&meeting.id, JobKind::Transcription, vec![0u8; 64]))
        .await
        .unwrap();
    assert!(job.provider.is_none());

    let done = wait_terminal(&env, &job.id).await?;
    assert_eq!(done.status, JobStatus::Completed);
    assert!(matches!(done.result, Some(JobResult::Transcript(_))));
    assert!(!env.provider_called.load(Ordering::SeqCst));
    Ok(())
}

#[tokio::test]
async fn transcription_failure_short_circuits_the_summary() -> Result<()> {
    let env = setup(Behavior::Fail("engine exploded"), true, Behavior::Succeed).await?;
    let meeting = new_meeting(&env).await?;

    let job = env
        .orchestrator
        .submit(request(&meeting.id, JobKind::Process, vec![0u8; 64]))
        .await
        .unwrap();

    let done = wait_terminal(&env, &job.id).await?;
    assert_eq!(done.status, JobStatus::Error);
    assert!(done.result.is_none());
    let error = done.error.unwrap();
    assert_eq!(error.stage, Stage::Transcription);
    assert!(error.message.contains("engine exploded"));
    assert!(!env.provider_called.load(Ordering::SeqCst));
    Ok(())
}

#[tokio::test]
async fn summary_failure_fails_the_whole_job() -> Result<()> {
    let env = setup(Behavior::Succeed, true, Behavior::Fail("model offline")).await?;
    let meeting = new_meeting(&env).await?;

    let job = env
        .orchestrator
        .submit(request(&meeting.id, JobKind::Process, vec![0u8; 64]))
        .await
        .unwrap();

    let done = wait_terminal(&env, &job.id).await?;
    assert_eq!(done.status, JobStatus::Error);
    // the transcript is not kept as a recoverable artifact
    assert!(done.result.is_none());
    let error = done.error.unwrap();
    assert_eq!(error.stage, Stage::Summary);
    assert!(error.message.contains("model offline"));
    Ok(())
}

#[tokio::test]
async fn hung_engine_times_out_into_error() -> Result<()> {
    let env = setup(Behavior::Hang, true, Behavior::Succeed).await?;
    let meeting = new_meeting(&env).await?;

    let mut req = request(&meeting.id, JobKind::Transcription, vec![0u8; 64]);
    req.timeout_secs = Some(1);
    let job = env.orchestrator.submit(req).await.unwrap();

    let done = wait_terminal(&env, &job.id).await?;
    assert_eq!(done.status, JobStatus::Error);
    assert!(done.result.is_none());
    let error = done.error.unwrap();
    assert_eq!(error.stage, Stage::Transcription);
    assert!(error.message.contains("timeout"));
    Ok(())
}

#[tokio::test]
async fn terminal_jobs_are_frozen() -> Result<()> {
    let env = setup(Behavior::Succeed, true, Behavior::Succeed).await?;
    let meeting = new_meeting(&env).await?;

    let job = env
        .orchestrator
        .submit(request(&meeting.id, JobKind::Transcription, vec![0u8; 64]))
        .await
        .unwrap();
    wait_terminal(&env, &job.id).await?;

    // all of these are silent no-ops against a terminal job
    env.orchestrator.report_progress(&job.id, 10).await?;
    env.orchestrator
        .fail(&job.id, Stage::Transcription, "late failure")
        .await?;
    env.orchestrator
        .complete_stage(
            &job.id,
            crate::pipeline::StageOutput::Transcript(TranscriptResult {
                text: "stray".to_string(),
                segments: vec![],
                language: None,
            }),
        )
        .await?;

    let frozen = env.orchestrator.get_status(&job.id).await?.unwrap();
    assert_eq!(frozen.status, JobStatus::Completed);
    assert_eq!(frozen.progress, 100);
    assert!(frozen.error.is_none());
    assert!(matches!(
        frozen.result,
        Some(JobResult::Transcript(ref t)) if t.text == "the quick brown fox"
    ));
    Ok(())
}

#[tokio::test]
async fn progress_is_monotone_across_polls() -> Result<()> {
    let env = setup(Behavior::Succeed, true, Behavior::Succeed).await?;
    let meeting = new_meeting(&env).await?;

    let job = env
        .orchestrator
        .submit(request(&meeting.id, JobKind::Process, vec![0u8; 64]))
        .await
        .unwrap();

    let mut observed = Vec::new();
    for _ in 0..100 {
        if let Some(job) = env.orchestrator.get_status(&job.id).await? {
            observed.push(job.progress);
            if job.status.is_terminal() {
                break;
            }
        }
        sleep(Duration::from_millis(10)).await;
    }

    assert!(observed.windows(2).all(|w| w[0] <= w[1]), "{:?}", observed);
    assert_eq!(*observed.last().unwrap(), 100);
    Ok(())
}

#[tokio::test]
async fn concurrent_jobs_stay_independent() -> Result<()> {
    let env = setup(Behavior::Succeed, true, Behavior::Succeed).await?;
    let meeting_a = new_meeting(&env).await?;
    let meeting_b = new_meeting(&env).await?;

    let (a, b) = tokio::join!(
        env.orchestrator
            .submit(request(&meeting_a.id, JobKind::Process, vec![0u8; 64])),
        env.orchestrator
            .submit(request(&meeting_b.id, JobKind::Transcription, vec![0u8; 64])),
    );
    let a = a.unwrap();
    let b = b.unwrap();
    assert_ne!(a.id, b.id);

    let done_a = wait_terminal(&env, &a.id).await?;
    let done_b = wait_terminal(&env, &b.id).await?;
    assert_eq!(done_a.status, JobStatus::Completed);
    assert_eq!(done_b.status, JobStatus::Completed);
    assert!(matches!(done_a.result, Some(JobResult::Process { .. })));
    assert!(matches!(done_b.result, Some(JobResult::Transcript(_))));
    Ok(())
}

#[tokio::test]
async fn admission_rejects_beyond_the_concurrency_ceiling() -> Result<()> {
    let env = setup_with_limit(Behavior::Hang, true, Behavior::Succeed, 1).await?;
    let meeting = new_meeting(&env).await?;

    let mut req = request(&meeting.id, JobKind::Transcription, vec![0u8; 64]);
    req.timeout_secs = Some(600);
    let running = env.orchestrator.submit(req).await.unwrap();

    let err = env
        .orchestrator
        .submit(request(&meeting.id, JobKind::Transcription, vec![0u8; 64]))
        .await
        .err()
        .expect("second job must be rejected while the permit is held");
    assert!(matches!(err, PipelineError::Busy));

    // cancelling the running job frees the permit again
    assert!(env.orchestrator.cancel(&running.id).await?);
    for _ in 0..100 {
        if env
            .orchestrator
            .submit(request(&meeting.id, JobKind::Transcription, vec![0u8; 64]))
            .await
            .is_ok()
        {
            return Ok(());
        }
        sleep(Duration::from_millis(20)).await;
    }
    anyhow::bail!("permit was never released after cancel")
}

#[tokio::test]
async fn cancel_is_idempotent() -> Result<()> {
    let env = setup(Behavior::Hang, true, Behavior::Succeed).await?;
    let meeting = new_meeting(&env).await?;

    let mut req = request(&meeting.id, JobKind::Transcription, vec![0u8; 64]);
    req.timeout_secs = Some(600);
    let job = env.orchestrator.submit(req).await.unwrap();

    assert!(env.orchestrator.cancel(&job.id).await?);
    let cancelled = env.orchestrator.get_status(&job.id).await?.unwrap();
    assert_eq!(cancelled.status, JobStatus::Error);
    assert!(cancelled.error.unwrap().message.contains("cancelled"));

    // second cancel, and cancel of an unknown id, are no-ops
    assert!(!env.orchestrator.cancel(&job.id).await?);
    assert!(!env.orchestrator.cancel("job-unknown").await?);
    Ok(())
}
