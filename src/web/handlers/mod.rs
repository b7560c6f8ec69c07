use std::sync::Arc;

use axum::extract::multipart::Multipart;
use axum::http::StatusCode;
use axum::Router;
use serde::Serialize;

use crate::engines::EngineKind;
use crate::pipeline::PipelineError;
use crate::providers::ProviderKind;
use crate::AppContext;

pub mod engine;
pub mod meeting;
pub mod summary;
pub mod transcription;


pub fn router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .nest("/api/meetings", meeting::meeting_router(ctx.clone()))
        .nest("/api/transcription", transcription::transcription_router(ctx.clone()))
        .nest("/api/summary", summary::summary_router(ctx.clone()))
        .nest("/api/engine", engine::engine_router(ctx))
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(error: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
        }
    }
}

pub fn error_status(err: &PipelineError) -> StatusCode {
    match err {
        PipelineError::EmptyInput => StatusCode::BAD_REQUEST,
        PipelineError::EngineUnavailable(_) | PipelineError::ProviderUnavailable(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        PipelineError::Busy => StatusCode::TOO_MANY_REQUESTS,
        PipelineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Fields shared by the two multipart upload endpoints.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub audio: Vec<u8>,
    pub filename: String,
    pub meeting_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub language: Option<String>,
    pub model: Option<String>,
    pub engine: Option<EngineKind>,
    pub provider: Option<ProviderKind>,
}

impl UploadForm {
    pub async fn from_multipart(mut multipart: Multipart) -> anyhow::Result<Self> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "file" => {
                    form.filename = field
                        .file_name()
                        .map(|name| name.to_string())
                        .unwrap_or_else(|| "upload.wav".to_string());
                    form.audio = field.bytes().await?.to_vec();
                }
                "meeting_id" => form.meeting_id = Some(field.text().await?),
                "title" => form.title = Some(field.text().await?),
                "description" => form.description = Some(field.text().await?),
                "language" => form.language = Some(field.text().await?),
                "model" => form.model = Some(field.text().await?),
                "engine" => {
                    let raw = field.text().await?;
                    form.engine = Some(
                        raw.parse()
                            .map_err(|e: String| anyhow::anyhow!(e))?,
                    );
                }
                "provider" => {
                    let raw = field.text().await?;
                    form.provider = Some(
                        raw.parse()
                            .map_err(|e: String| anyhow::anyhow!(e))?,
                    );
                }
                other => {
                    tracing::warn!("Ignoring unknown multipart field {:?}", other);
                    let _ = field.bytes().await;
                }
            }
        }
        Ok(form)
    }
}
