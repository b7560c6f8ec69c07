use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::error;

use crate::pipeline::types::{JobKind, SummaryResult};
use crate::providers::ProviderKind;
use crate::storage::meeting::MeetingPatch;
use crate::web::handlers::{error_status, transcription, ApiResponse, UploadForm};
use crate::AppContext;

pub fn summary_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/", post(summarize_text))
        .route("/process", post(process_upload))
        .route("/process/:task_id", get(get_process_job))
        .route("/process/:task_id/cancel", post(cancel_process_job))
        .route("/providers/status", get(provider_status))
        .with_state(ctx)
}

#[derive(Debug, Deserialize)]
struct SummarizeRequest {
    text: String,
    model: Option<String>,
    provider: Option<ProviderKind>,
    meeting_id: Option<String>,
}

/// Summarize text that the caller already has, without going through the
/// transcription pipeline.
async fn summarize_text(
    State(ctx): State<Arc<AppContext>>,
    Json(req): Json<SummarizeRequest>,
) -> impl IntoResponse {
    if req.text.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<SummaryResult>::error(
                "text must not be empty".to_string(),
            )),
        );
    }

    let provider = match ctx.providers.resolve(req.provider).await {
        Ok(provider) => provider,
        Err(e) => {
            return (error_status(&e), Json(ApiResponse::error(e.to_string())));
        }
    };

    match provider.summarize(&req.text, req.model.as_deref()).await {
        Ok(summary) => {
            if let Some(meeting_id) = &req.meeting_id {
                let patch = MeetingPatch::default().summary(summary.clone());
                if let Err(e) = ctx.meetings.update(meeting_id, &patch).await {
                    error!("Failed to attach summary to meeting {}: {}", meeting_id, e);
                }
            }
            (StatusCode::OK, Json(ApiResponse::success(summary)))
        }
        Err(e) => {
            error!("Summary generation failed: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                Json(ApiResponse::error(e.to_string())),
            )
        }
    }
}

/// Upload audio and run the full transcribe-then-summarize pipeline.
async fn process_upload(
    State(ctx): State<Arc<AppContext>>,
    multipart: Multipart,
) -> impl IntoResponse {
    let form = match UploadForm::from_multipart(multipart).await {
        Ok(form) => form,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::error(e.to_string())),
            );
        }
    };

    transcription::submit_upload(&ctx, form, JobKind::Process).await
}

async fn get_process_job(
    State(ctx): State<Arc<AppContext>>,
    Path(task_id): Path<String>,
) -> impl IntoResponse {
    transcription::job_status(ctx, task_id).await
}

async fn cancel_process_job(
    State(ctx): State<Arc<AppContext>>,
    Path(task_id): Path<String>,
) -> impl IntoResponse {
    transcription::cancel(ctx, task_id).await
}

async fn provider_status(State(ctx): State<Arc<AppContext>>) -> impl IntoResponse {
    let statuses = ctx.providers.status().await;
    (StatusCode::OK, Json(ApiResponse::success(statuses)))
}
