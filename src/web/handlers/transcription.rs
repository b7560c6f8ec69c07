use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::pipeline::types::{JobKind, JobResult, JobStatus, SummaryResult};
use crate::pipeline::{PipelineError, SubmitRequest};
use crate::providers::ProviderKind;
use crate::storage::job::JobFilter;
use crate::storage::meeting::{Meeting, MeetingPatch, MeetingStatus};
use crate::web::handlers::{error_status, ApiResponse, UploadForm};
use crate::AppContext;

pub fn transcription_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/upload", post(upload))
        .route("/", get(list_jobs))
        .route("/engines/status", get(super::engine::engine_status))
        .route("/:task_id", get(get_job))
        .route("/:task_id/cancel", post(cancel_job))
        .route("/:task_id/summary", post(summarize_job))
        .with_state(ctx)
}

#[derive(Debug, Serialize)]
pub(super) struct UploadResponse {
    task_id: String,
    meeting_id: String,
}

async fn upload(
    State(ctx): State<Arc<AppContext>>,
    multipart: Multipart,
) -> impl IntoResponse {
    let form = match UploadForm::from_multipart(multipart).await {
        Ok(form) => form,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::<UploadResponse>::error(e.to_string())),
            );
        }
    };

    submit_upload(&ctx, form, JobKind::Transcription).await
}

/// Shared by the transcription upload and the full process upload: persists
/// the audio, attaches it to a meeting and hands the job to the orchestrator.
pub(super) async fn submit_upload(
    ctx: &Arc<AppContext>,
    form: UploadForm,
    kind: JobKind,
) -> (StatusCode, Json<ApiResponse<UploadResponse>>) {
    // reject before anything is persisted, so a bad upload leaves no
    // meeting record or file behind
    if form.audio.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(
                PipelineError::EmptyInput.to_string(),
            )),
        );
    }

    let meeting_id = match resolve_meeting(ctx, &form).await {
        Ok(id) => id,
        Err(e) => {
            error!("Failed to resolve meeting: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(e.to_string())),
            );
        }
    };

    let audio_path = match save_upload(ctx, &form).await {
        Ok(path) => path,
        Err(e) => {
            error!("Failed to store upload: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(e.to_string())),
            );
        }
    };

    let patch = MeetingPatch::default()
        .status(MeetingStatus::Transcribing)
        .audio_path(audio_path.display().to_string());
    if let Err(e) = ctx.meetings.update(&meeting_id, &patch).await {
        error!("Failed to update meeting {}: {}", meeting_id, e);
    }

    let request = SubmitRequest {
        meeting_id: meeting_id.clone(),
        audio: form.audio,
        filename: form.filename,
        kind,
        language: form.language,
        model: form.model,
        engine: form.engine,
        provider: form.provider,
        timeout_secs: None,
    };

    match ctx.orchestrator.submit(request).await {
        Ok(job) => {
            info!("Accepted {} job {} for meeting {}", kind, job.id, meeting_id);
            (
                StatusCode::CREATED,
                Json(ApiResponse::success(UploadResponse {
                    task_id: job.id,
                    meeting_id,
                })),
            )
        }
        Err(e) => {
            error!("Failed to submit job for meeting {}: {}", meeting_id, e);
            let patch = MeetingPatch::default()
                .status(MeetingStatus::Error)
                .error(e.to_string());
            if let Err(e) = ctx.meetings.update(&meeting_id, &patch).await {
                error!("Failed to update meeting {}: {}", meeting_id, e);
            }
            (error_status(&e), Json(ApiResponse::error(e.to_string())))
        }
    }
}

async fn resolve_meeting(ctx: &Arc<AppContext>, form: &UploadForm) -> anyhow::Result<String> {
    if let Some(id) = &form.meeting_id {
        if ctx.meetings.get(id).await?.is_none() {
            anyhow::bail!("meeting {} not found", id);
        }
        return Ok(id.clone());
    }

    let title = form
        .title
        .clone()
        .unwrap_or_else(|| format!("Meeting {}", chrono::Utc::now().format("%Y-%m-%d %H:%M")));
    let meeting = Meeting::new(title, form.description.clone());
    ctx.meetings.create(&meeting).await?;
    Ok(meeting.id)
}

async fn save_upload(ctx: &Arc<AppContext>, form: &UploadForm) -> anyhow::Result<PathBuf> {
    let name = format!("{}-{}", Uuid::new_v4(), sanitize_filename(&form.filename));
    let path = ctx.config.upload_dir.join(name);
    tokio::fs::write(&path, &form.audio).await?;
    Ok(path)
}

fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub(super) async fn job_status(
    ctx: Arc<AppContext>,
    task_id: String,
) -> impl IntoResponse {
    match ctx.orchestrator.get_status(&task_id).await {
        Ok(Some(job)) => (StatusCode::OK, Json(ApiResponse::success(job))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("Task not found".to_string())),
        ),
        Err(e) => {
            error!("Failed to get task {}: {}", task_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(e.to_string())),
            )
        }
    }
}

pub(super) async fn cancel(ctx: Arc<AppContext>, task_id: String) -> impl IntoResponse {
    match ctx.orchestrator.cancel(&task_id).await {
        Ok(cancelled) => (StatusCode::OK, Json(ApiResponse::success(cancelled))),
        Err(e) => {
            error!("Failed to cancel task {}: {}", task_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(e.to_string())),
            )
        }
    }
}

async fn get_job(
    State(ctx): State<Arc<AppContext>>,
    Path(task_id): Path<String>,
) -> impl IntoResponse {
    job_status(ctx, task_id).await
}

async fn cancel_job(
    State(ctx): State<Arc<AppContext>>,
    Path(task_id): Path<String>,
) -> impl IntoResponse {
    cancel(ctx, task_id).await
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct JobSummaryRequest {
    pub(super) model: Option<String>,
    pub(super) provider: Option<ProviderKind>,
}

/// Generate a summary for a transcription job that already completed,
/// without re-running the pipeline. The job record stays untouched; the
/// summary lands on the owning meeting.
pub(super) async fn summarize_job(
    State(ctx): State<Arc<AppContext>>,
    Path(task_id): Path<String>,
    body: Option<Json<JobSummaryRequest>>,
) -> (StatusCode, Json<ApiResponse<SummaryResult>>) {
    let req = body.map(|Json(req)| req).unwrap_or_default();

    let job = match ctx.orchestrator.get_status(&task_id).await {
        Ok(Some(job)) => job,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::error("Task not found".to_string())),
            );
        }
        Err(e) => {
            error!("Failed to get task {}: {}", task_id, e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(e.to_string())),
            );
        }
    };

    let transcript = match (&job.status, &job.result) {
        (JobStatus::Completed, Some(JobResult::Transcript(t))) => t.text.clone(),
        (JobStatus::Completed, Some(JobResult::Process { transcription, .. })) => {
            transcription.text.clone()
        }
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::error(
                    "task has not completed with a transcript".to_string(),
                )),
            );
        }
    };

    let provider = match ctx.providers.resolve(req.provider).await {
        Ok(provider) => provider,
        Err(e) => {
            return (error_status(&e), Json(ApiResponse::error(e.to_string())));
        }
    };

    match provider.summarize(&transcript, req.model.as_deref()).await {
        Ok(summary) => {
            let patch = MeetingPatch::default().summary(summary.clone());
            if let Err(e) = ctx.meetings.update(&job.meeting_id, &patch).await {
                error!(
                    "Failed to attach summary to meeting {}: {}",
                    job.meeting_id, e
                );
            }
            (StatusCode::OK, Json(ApiResponse::success(summary)))
        }
        Err(e) => {
            error!("Summary generation for task {} failed: {}", task_id, e);
            (
                StatusCode::BAD_GATEWAY,
                Json(ApiResponse::error(e.to_string())),
            )
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    status: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
}

async fn list_jobs(
    State(ctx): State<Arc<AppContext>>,
    Query(query): Query<ListQuery>,
) -> impl IntoResponse {
    let mut filter = JobFilter::default();
    if let Some(raw) = query.status {
        match JobStatus::try_from(raw) {
            Ok(status) => filter.status = Some(status),
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ApiResponse::error(e)),
                );
            }
        }
    }
    if let Some(limit) = query.limit {
        filter.limit = limit.clamp(1, 1000);
    }
    if let Some(offset) = query.offset {
        filter.offset = offset.max(0);
    }

    match ctx.orchestrator.list_jobs(&filter).await {
        Ok(jobs) => (StatusCode::OK, Json(ApiResponse::success(jobs))),
        Err(e) => {
            error!("Failed to list tasks: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(e.to_string())),
            )
        }
    }
}
