use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::pipeline::types::{TranscriptResult, TranscriptSegment};
use crate::utils::http::HTTP;

use super::{EngineDescriptor, EngineKind, TranscribeOptions, TranscriptionEngine};

const TRANSCRIPTION_URL: &str = "https://api.openai.com/v1/audio/transcriptions";

#[derive(Debug, Deserialize)]
struct ApiSegment {
    #[serde(default)]
    text: String,
    #[serde(default)]
    start: f64,
    #[serde(default)]
    end: f64,
}

#[derive(Debug, Deserialize)]
struct ApiTranscription {
    text: String,
    #[serde(default)]
    segments: Vec<ApiSegment>,
    language: Option<String>,
}

/// Hosted Whisper API. Availability is credential presence; the call itself
/// is a single bounded request with no server-side progress to report.
pub struct OpenAiEngine {
    descriptor: EngineDescriptor,
    api_key: Option<String>,
}

impl OpenAiEngine {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            descriptor: EngineDescriptor {
                kind: EngineKind::Openai,
                multiplier: 0.5,
                endpoint: None,
                local: false,
            },
            api_key,
        }
    }
}

#[async_trait]
impl TranscriptionEngine for OpenAiEngine {
    fn descriptor(&self) -> &EngineDescriptor {
        &self.descriptor
    }

    async fn probe(&self) -> bool {
        self.api_key.is_some()
    }

    async fn transcribe(
        &self,
        audio: &[u8],
        filename: &str,
        options: &TranscribeOptions,
        _progress: UnboundedSender<u8>,
    ) -> anyhow::Result<TranscriptResult> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("no OpenAI API key configured"))?;

        let part = reqwest::multipart::Part::bytes(audio.to_vec()).file_name(filename.to_string());
        let mut form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", "whisper-1")
            .text("response_format", "verbose_json");
        if let Some(language) = &options.language {
            form = form.text("language", language.clone());
        }

        let resp = HTTP
            .post(TRANSCRIPTION_URL)
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI transcription failed: {} {}", status, body);
        }

        let body: ApiTranscription = resp.json().await?;
        Ok(TranscriptResult {
            text: body.text,
            segments: body
                .segments
                .into_iter()
                .map(|s| TranscriptSegment {
                    text: s.text,
                    start: s.start,
                    end: s.end,
                })
                .collect(),
            language: body.language,
        })
    }
}
