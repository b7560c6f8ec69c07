use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

use crate::pipeline::types::{TranscriptResult, TranscriptSegment};
use crate::utils::http::{probe_url, HTTP};

use super::{EngineDescriptor, EngineKind, TranscribeOptions, TranscriptionEngine, PROBE_TIMEOUT};

const POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Deserialize)]
struct RawSegment {
    #[serde(default)]
    text: String,
    #[serde(default)]
    start: f64,
    #[serde(default)]
    end: f64,
}

#[derive(Debug, Deserialize)]
struct InferenceResponse {
    task_id: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    segments: Vec<RawSegment>,
    language: Option<String>,
    detected_language: Option<String>,
}

impl InferenceResponse {
    fn into_transcript(self) -> TranscriptResult {
        TranscriptResult {
            text: self.text.unwrap_or_default(),
            segments: self
                .segments
                .into_iter()
                .map(|s| TranscriptSegment {
                    text: s.text,
                    start: s.start,
                    end: s.end,
                })
                .collect(),
            language: self.detected_language.or(self.language),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    progress: Option<u8>,
    result: Option<InferenceResponse>,
    error: Option<String>,
}

fn inference_form(audio: &[u8], filename: &str, language: Option<&str>) -> reqwest::multipart::Form {
    let part = reqwest::multipart::Part::bytes(audio.to_vec()).file_name(filename.to_string());
    let mut form = reqwest::multipart::Form::new()
        .part("file", part)
        .text("word_timestamps", "true")
        .text("response_format", "verbose_json");
    if let Some(language) = language {
        form = form.text("language", language.to_string());
    }
    form
}

/// faster-whisper style server: `/inference` hands back a task id which is
/// then polled on `/status/:id` for progress and the final result.
pub struct FasterWhisperEngine {
    descriptor: EngineDescriptor,
    endpoint: String,
}

impl FasterWhisperEngine {
    pub fn new(endpoint: String) -> Self {
        Self {
            descriptor: EngineDescriptor {
                kind: EngineKind::FasterWhisper,
                multiplier: 1.0,
                endpoint: Some(endpoint.clone()),
                local: true,
            },
            endpoint,
        }
    }

    async fn poll_task(
        &self,
        task_id: &str,
        progress: &UnboundedSender<u8>,
    ) -> anyhow::Result<TranscriptResult> {
        info!("Engine task {}, polling for progress", task_id);
        loop {
            let url = format!("{}/status/{}", self.endpoint, task_id);
            match HTTP.get(&url).send().await {
                Ok(resp) => {
                    let status: StatusResponse = resp.json().await?;
                    if let Some(percent) = status.progress {
                        let _ = progress.send(percent);
                    }
                    match status.status.as_str() {
                        "completed" => {
                            let result = status
                                .result
                                .ok_or_else(|| anyhow::anyhow!("completed without a result"))?;
                            return Ok(result.into_transcript());
                        }
                        "error" => {
                            anyhow::bail!(
                                "engine reported failure: {}",
                                status.error.unwrap_or_else(|| "unknown error".to_string())
                            );
                        }
                        _ => {}
                    }
                }
                Err(e) => {
                    // transient; the deadline around us has the final word
                    warn!("Polling engine task {} failed: {}", task_id, e);
                }
            }
            sleep(POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl TranscriptionEngine for FasterWhisperEngine {
    fn descriptor(&self) -> &EngineDescriptor {
        &self.descriptor
    }

    async fn probe(&self) -> bool {
        probe_url(&format!("{}/", self.endpoint), PROBE_TIMEOUT).await
    }

    async fn transcribe(
        &self,
        audio: &[u8],
        filename: &str,
        options: &TranscribeOptions,
        progress: UnboundedSender<u8>,
    ) -> anyhow::Result<TranscriptResult> {
        let form = inference_form(audio, filename, options.language.as_deref());
        let resp = HTTP
            .post(format!("{}/inference", self.endpoint))
            .multipart(form)
            .send()
            .await?
            .error_for_status()?;

        let body: InferenceResponse = resp.json().await?;
        match body.task_id {
            Some(task_id) => self.poll_task(&task_id, &progress).await,
            // older servers answer inline
            None => Ok(body.into_transcript()),
        }
    }
}

/// whisper.cpp style server: `/inference` blocks and answers with the full
/// transcript in one round trip.
pub struct WhisperCppEngine {
    descriptor: EngineDescriptor,
    endpoint: String,
}

impl WhisperCppEngine {
    pub fn new(endpoint: String) -> Self {
        Self {
            descriptor: EngineDescriptor {
                kind: EngineKind::WhisperCpp,
                multiplier: 2.0,
                endpoint: Some(endpoint.clone()),
                local: true,
            },
            endpoint,
        }
    }

    /// whisper.cpp only understands ISO 639-1 codes.
    fn normalize_language(language: &str) -> &str {
        match language {
            "zh-cn" | "zh-CN" => "zh",
            other => other,
        }
    }
}

#[async_trait]
impl TranscriptionEngine for WhisperCppEngine {
    fn descriptor(&self) -> &EngineDescriptor {
        &self.descriptor
    }

    async fn probe(&self) -> bool {
        probe_url(&format!("{}/", self.endpoint), PROBE_TIMEOUT).await
    }

    async fn transcribe(
        &self,
        audio: &[u8],
        filename: &str,
        options: &TranscribeOptions,
        _progress: UnboundedSender<u8>,
    ) -> anyhow::Result<TranscriptResult> {
        let language = options
            .language
            .as_deref()
            .map(Self::normalize_language);
        let form = inference_form(audio, filename, language);
        debug!("Sending {} bytes to {}", audio.len(), self.endpoint);

        let resp = HTTP
            .post(format!("{}/inference", self.endpoint))
            .multipart(form)
            .send()
            .await?
            .error_for_status()?;

        let body: InferenceResponse = resp.json().await?;
        Ok(body.into_transcript())
    }
}
