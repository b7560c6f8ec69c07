pub mod hosted;
pub mod ollama;

use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::pipeline::error::PipelineError;
use crate::pipeline::types::SummaryResult;

pub use hosted::{ClaudeProvider, OpenAiProvider};
pub use ollama::OllamaProvider;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Ollama,
    Openai,
    Claude,
}

impl Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::Ollama => write!(f, "ollama"),
            ProviderKind::Openai => write!(f, "openai"),
            ProviderKind::Claude => write!(f, "claude"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ollama" => Ok(ProviderKind::Ollama),
            "openai" => Ok(ProviderKind::Openai),
            "claude" => Ok(ProviderKind::Claude),
            _ => Err(format!("Invalid provider: {}", s)),
        }
    }
}

#[async_trait]
pub trait SummaryProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Liveness or credential check. Never errors.
    async fn probe(&self) -> bool;

    async fn summarize(&self, text: &str, model: Option<&str>) -> anyhow::Result<SummaryResult>;
}

#[derive(Debug, Serialize)]
pub struct ProviderStatus {
    pub name: ProviderKind,
    pub available: bool,
}

/// Known summary providers in priority order. Hosted providers are only
/// registered when their credentials are configured.
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn SummaryProvider>>,
}

impl ProviderRegistry {
    pub fn new(config: &Config) -> Self {
        let mut providers: Vec<Arc<dyn SummaryProvider>> =
            vec![Arc::new(OllamaProvider::new(config.ollama_url.clone()))];
        if let Some(key) = &config.openai_api_key {
            providers.push(Arc::new(OpenAiProvider::new(key.clone())));
        }
        if let Some(key) = &config.anthropic_api_key {
            providers.push(Arc::new(ClaudeProvider::new(key.clone())));
        }
        Self { providers }
    }

    pub fn from_providers(providers: Vec<Arc<dyn SummaryProvider>>) -> Self {
        Self { providers }
    }

    /// Resolve the provider for a submission. An explicit preference that is
    /// down is an error; with no preference the first available provider in
    /// priority order wins. The choice binds at submission time.
    pub async fn resolve(
        &self,
        preferred: Option<ProviderKind>,
    ) -> Result<Arc<dyn SummaryProvider>, PipelineError> {
        match preferred {
            Some(kind) => {
                let provider = self
                    .providers
                    .iter()
                    .find(|p| p.kind() == kind)
                    .cloned()
                    .ok_or_else(|| PipelineError::ProviderUnavailable(kind.to_string()))?;
                if provider.probe().await {
                    Ok(provider)
                } else {
                    Err(PipelineError::ProviderUnavailable(kind.to_string()))
                }
            }
            None => {
                for provider in &self.providers {
                    if provider.probe().await {
                        return Ok(provider.clone());
                    }
                }
                Err(PipelineError::ProviderUnavailable(
                    "no summary provider".to_string(),
                ))
            }
        }
    }

    pub async fn status(&self) -> Vec<ProviderStatus> {
        let mut statuses = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            statuses.push(ProviderStatus {
                name: provider.kind(),
                available: provider.probe().await,
            });
        }
        statuses
    }
}

/// Prompt shared by every provider.
pub(crate) fn summary_prompt(transcript: &str) -> String {
    format!(
        "You are a meeting summarization assistant. Summarize the following \
meeting transcript, extracting the key points, the decisions made and the \
action items.\n\nTranscript:\n\"{}\"\n\nAnswer strictly in this format:\n\n\
## Meeting Summary\n\n### Key Points\n- ...\n\n### Decisions\n- ...\n\n\
### Action Items\n- ...\n\nKeep the language concise and lead with the most \
important information.",
        transcript
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    struct FixedProvider {
        kind: ProviderKind,
        available: bool,
    }

    #[async_trait]
    impl SummaryProvider for FixedProvider {
        fn kind(&self) -> ProviderKind {
            self.kind
        }

        async fn probe(&self) -> bool {
            self.available
        }

        async fn summarize(
            &self,
            _text: &str,
            model: Option<&str>,
        ) -> anyhow::Result<SummaryResult> {
            Ok(SummaryResult {
                text: "summary".to_string(),
                model: model.unwrap_or("default").to_string(),
                provider: self.kind.to_string(),
                created_at: Utc::now(),
            })
        }
    }

    fn registry(entries: &[(ProviderKind, bool)]) -> ProviderRegistry {
        ProviderRegistry::from_providers(
            entries
                .iter()
                .map(|&(kind, available)| {
                    Arc::new(FixedProvider { kind, available }) as Arc<dyn SummaryProvider>
                })
                .collect(),
        )
    }

    #[tokio::test]
    async fn explicit_preference_must_be_available() {
        let registry = registry(&[(ProviderKind::Ollama, false), (ProviderKind::Openai, true)]);
        let err = registry
            .resolve(Some(ProviderKind::Ollama))
            .await
            .err()
            .expect("down provider must not resolve");
        assert!(matches!(err, PipelineError::ProviderUnavailable(_)));
    }

    #[tokio::test]
    async fn auto_selection_takes_first_available() {
        let registry = registry(&[(ProviderKind::Ollama, false), (ProviderKind::Claude, true)]);
        let provider = registry.resolve(None).await.unwrap();
        assert_eq!(provider.kind(), ProviderKind::Claude);
    }

    #[tokio::test]
    async fn no_provider_available_is_an_error() {
        let registry = registry(&[(ProviderKind::Ollama, false)]);
        assert!(registry.resolve(None).await.is_err());
    }
}
