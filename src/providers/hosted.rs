use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::pipeline::types::SummaryResult;
use crate::utils::http::HTTP;

use super::{summary_prompt, ProviderKind, SummaryProvider};

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
const OPENAI_DEFAULT_MODEL: &str = "gpt-3.5-turbo";
const ANTHROPIC_MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const ANTHROPIC_DEFAULT_MODEL: &str = "claude-3-haiku-20240307";
const MAX_TOKENS: u32 = 1000;

pub struct OpenAiProvider {
    api_key: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String) -> Self {
        Self { api_key }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[async_trait]
impl SummaryProvider for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Openai
    }

    async fn probe(&self) -> bool {
        // hosted provider: availability is credential presence
        !self.api_key.is_empty()
    }

    async fn summarize(&self, text: &str, model: Option<&str>) -> anyhow::Result<SummaryResult> {
        let model = model.unwrap_or(OPENAI_DEFAULT_MODEL);
        let request = json!({
            "model": model,
            "messages": [{ "role": "user", "content": summary_prompt(text) }],
            "max_tokens": MAX_TOKENS,
            "temperature": 0.7,
        });

        let resp = HTTP
            .post(OPENAI_CHAT_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI API error: {} {}", status, body);
        }

        let body: ChatResponse = resp.json().await?;
        let summary = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| anyhow::anyhow!("OpenAI returned no completion"))?;

        Ok(SummaryResult {
            text: summary,
            model: model.to_string(),
            provider: ProviderKind::Openai.to_string(),
            created_at: Utc::now(),
        })
    }
}

pub struct ClaudeProvider {
    api_key: String,
}

impl ClaudeProvider {
    pub fn new(api_key: String) -> Self {
        Self { api_key }
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[async_trait]
impl SummaryProvider for ClaudeProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Claude
    }

    async fn probe(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn summarize(&self, text: &str, model: Option<&str>) -> anyhow::Result<SummaryResult> {
        let model = model.unwrap_or(ANTHROPIC_DEFAULT_MODEL);
        let request = json!({
            "model": model,
            "max_tokens": MAX_TOKENS,
            "messages": [{ "role": "user", "content": summary_prompt(text) }],
        });

        let resp = HTTP
            .post(ANTHROPIC_MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Claude API error: {} {}", status, body);
        }

        let body: MessagesResponse = resp.json().await?;
        let summary = body
            .content
            .into_iter()
            .next()
            .map(|b| b.text)
            .ok_or_else(|| anyhow::anyhow!("Claude returned no content"))?;

        Ok(SummaryResult {
            text: summary,
            model: model.to_string(),
            provider: ProviderKind::Claude.to_string(),
            created_at: Utc::now(),
        })
    }
}
