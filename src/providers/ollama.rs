use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::pipeline::types::SummaryResult;
use crate::utils::http::{probe_url, HTTP};

use super::{summary_prompt, ProviderKind, SummaryProvider};

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_MODEL: &str = "llama3.2:1b";

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Local LLM server speaking the Ollama generate API.
pub struct OllamaProvider {
    base_url: String,
}

impl OllamaProvider {
    pub fn new(base_url: String) -> Self {
        Self { base_url }
    }
}

#[async_trait]
impl SummaryProvider for OllamaProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    async fn probe(&self) -> bool {
        probe_url(&format!("{}/api/tags", self.base_url), PROBE_TIMEOUT).await
    }

    async fn summarize(&self, text: &str, model: Option<&str>) -> anyhow::Result<SummaryResult> {
        let model = model.unwrap_or(DEFAULT_MODEL);
        let request = json!({
            "model": model,
            "prompt": summary_prompt(text),
            "stream": false,
            "options": {
                "temperature": 0.7,
                "top_p": 0.9,
                "num_predict": 1000,
            },
        });

        let resp = HTTP
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !resp.status().is_success() {
            anyhow::bail!("Ollama API error: {}", resp.status());
        }

        let body: GenerateResponse = resp.json().await?;
        Ok(SummaryResult {
            text: body.response,
            model: model.to_string(),
            provider: ProviderKind::Ollama.to_string(),
            created_at: Utc::now(),
        })
    }
}
