pub mod cloud;
pub mod local;

use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc::UnboundedSender, Mutex};
use tracing::info;

use crate::config::Config;
use crate::pipeline::error::PipelineError;
use crate::pipeline::types::TranscriptResult;

pub use cloud::OpenAiEngine;
pub use local::{FasterWhisperEngine, WhisperCppEngine};

/// Liveness checks must answer quickly or not at all.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(4);
/// Probe results are cached briefly so a burst of submissions does not
/// hammer the engines.
const PROBE_CACHE_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EngineKind {
    FasterWhisper,
    WhisperCpp,
    Openai,
}

impl Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineKind::FasterWhisper => write!(f, "faster-whisper"),
            EngineKind::WhisperCpp => write!(f, "whisper-cpp"),
            EngineKind::Openai => write!(f, "openai"),
        }
    }
}

impl FromStr for EngineKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "faster-whisper" => Ok(EngineKind::FasterWhisper),
            "whisper-cpp" => Ok(EngineKind::WhisperCpp),
            "openai" => Ok(EngineKind::Openai),
            _ => Err(format!("Invalid engine type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    Available,
    Unavailable,
}

impl From<bool> for Availability {
    fn from(available: bool) -> Self {
        if available {
            Availability::Available
        } else {
            Availability::Unavailable
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineDescriptor {
    pub kind: EngineKind,
    /// Relative slowness vs. the baseline engine, feeds the timeout policy.
    pub multiplier: f64,
    pub endpoint: Option<String>,
    pub local: bool,
}

#[derive(Debug, Clone, Default)]
pub struct TranscribeOptions {
    pub language: Option<String>,
}

#[async_trait]
pub trait TranscriptionEngine: Send + Sync {
    fn descriptor(&self) -> &EngineDescriptor;

    /// Liveness check. Never errors; any failure is `false`.
    async fn probe(&self) -> bool;

    /// Convert audio to text. Engines that track server-side progress push
    /// raw percentages into `progress`; others may ignore it. The caller
    /// bounds this future with the computed deadline, so implementations
    /// are free to poll indefinitely.
    async fn transcribe(
        &self,
        audio: &[u8],
        filename: &str,
        options: &TranscribeOptions,
        progress: UnboundedSender<u8>,
    ) -> anyhow::Result<TranscriptResult>;
}

/// Holds the known engines, the process-wide default selection and a
/// short-lived availability cache. All writes to the default go through
/// one mutex so concurrent operator requests cannot tear it.
pub struct EngineRegistry {
    engines: Vec<Arc<dyn TranscriptionEngine>>,
    default: Mutex<EngineKind>,
    probe_cache: Mutex<HashMap<EngineKind, (bool, Instant)>>,
}

impl EngineRegistry {
    pub fn new(config: &Config) -> Self {
        let engines: Vec<Arc<dyn TranscriptionEngine>> = vec![
            Arc::new(FasterWhisperEngine::new(config.streaming_engine_url.clone())),
            Arc::new(WhisperCppEngine::new(config.compiled_engine_url.clone())),
            Arc::new(OpenAiEngine::new(config.openai_api_key.clone())),
        ];
        Self::from_engines(engines, EngineKind::FasterWhisper)
    }

    pub fn from_engines(
        engines: Vec<Arc<dyn TranscriptionEngine>>,
        default: EngineKind,
    ) -> Self {
        Self {
            engines,
            default: Mutex::new(default),
            probe_cache: Mutex::new(HashMap::new()),
        }
    }

    fn get(&self, kind: EngineKind) -> Option<Arc<dyn TranscriptionEngine>> {
        self.engines
            .iter()
            .find(|e| e.descriptor().kind == kind)
            .cloned()
    }

    pub async fn current(&self) -> EngineKind {
        *self.default.lock().await
    }

    /// Operator action: change the process-wide default engine.
    pub async fn select_default(&self, kind: EngineKind) -> EngineKind {
        let mut default = self.default.lock().await;
        *default = kind;
        info!("Default transcription engine switched to {}", kind);
        kind
    }

    pub async fn availability(&self, kind: EngineKind) -> bool {
        {
            let cache = self.probe_cache.lock().await;
            if let Some((available, at)) = cache.get(&kind) {
                if at.elapsed() < PROBE_CACHE_TTL {
                    return *available;
                }
            }
        }

        let available = match self.get(kind) {
            Some(engine) => engine.probe().await,
            None => false,
        };

        self.probe_cache
            .lock()
            .await
            .insert(kind, (available, Instant::now()));
        available
    }

    /// Resolve the engine for a submission: the preference if one is named,
    /// the process-wide default otherwise. An unavailable engine is an
    /// error, never a silent substitution -- a swap would change the
    /// timeout and cost assumptions the caller made.
    pub async fn resolve(
        &self,
        preferred: Option<EngineKind>,
    ) -> Result<Arc<dyn TranscriptionEngine>, PipelineError> {
        let kind = match preferred {
            Some(kind) => kind,
            None => self.current().await,
        };
        let engine = self
            .get(kind)
            .ok_or_else(|| PipelineError::EngineUnavailable(kind.to_string()))?;
        if self.availability(kind).await {
            Ok(engine)
        } else {
            Err(PipelineError::EngineUnavailable(kind.to_string()))
        }
    }

    pub async fn status(&self) -> HashMap<EngineKind, Availability> {
        let mut statuses = HashMap::new();
        for engine in &self.engines {
            let kind = engine.descriptor().kind;
            statuses.insert(kind, self.availability(kind).await.into());
        }
        statuses
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedEngine {
        descriptor: EngineDescriptor,
        available: bool,
    }

    impl FixedEngine {
        fn new(kind: EngineKind, available: bool) -> Arc<dyn TranscriptionEngine> {
            Arc::new(Self {
                descriptor: EngineDescriptor {
                    kind,
                    multiplier: 1.0,
                    endpoint: None,
                    local: true,
                },
                available,
            })
        }
    }

    #[async_trait]
    impl TranscriptionEngine for FixedEngine {
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
            _progress: UnboundedSender<u8>,
        ) -> anyhow::Result<TranscriptResult> {
            anyhow::bail!("not under test")
        }
    }

    #[test]
    fn engine_names_round_trip() {
        for kind in [
            EngineKind::FasterWhisper,
            EngineKind::WhisperCpp,
            EngineKind::Openai,
        ] {
            assert_eq!(kind.to_string().parse::<EngineKind>().unwrap(), kind);
        }
        assert!("whisperx".parse::<EngineKind>().is_err());
        assert!("".parse::<EngineKind>().is_err());
    }

    #[tokio::test]
    async fn select_default_changes_current() {
        let registry = EngineRegistry::from_engines(
            vec![
                FixedEngine::new(EngineKind::FasterWhisper, true),
                FixedEngine::new(EngineKind::WhisperCpp, true),
            ],
            EngineKind::FasterWhisper,
        );
        assert_eq!(registry.current().await, EngineKind::FasterWhisper);
        registry.select_default(EngineKind::WhisperCpp).await;
        assert_eq!(registry.current().await, EngineKind::WhisperCpp);
    }

    #[tokio::test]
    async fn rejected_name_leaves_selection_unchanged() {
        let registry = EngineRegistry::from_engines(
            vec![
                FixedEngine::new(EngineKind::FasterWhisper, true),
                FixedEngine::new(EngineKind::WhisperCpp, true),
            ],
            EngineKind::FasterWhisper,
        );

        // the operator path parses first, so a bad name never reaches
        // select_default
        let parsed = "whisperx".parse::<EngineKind>();
        assert!(parsed.is_err());
        assert_eq!(registry.current().await, EngineKind::FasterWhisper);
    }

    #[tokio::test]
    async fn resolve_rejects_unavailable_preference() {
        let registry = EngineRegistry::from_engines(
            vec![
                FixedEngine::new(EngineKind::FasterWhisper, true),
                FixedEngine::new(EngineKind::WhisperCpp, false),
            ],
            EngineKind::FasterWhisper,
        );
        let err = registry
            .resolve(Some(EngineKind::WhisperCpp))
            .await
            .err()
            .expect("unavailable engine must not resolve");
        assert!(matches!(err, PipelineError::EngineUnavailable(_)));

        // no silent substitution either: the default resolves on its own
        let engine = registry.resolve(None).await.unwrap();
        assert_eq!(engine.descriptor().kind, EngineKind::FasterWhisper);
    }

    #[tokio::test]
    async fn status_covers_every_engine() {
        let registry = EngineRegistry::from_engines(
            vec![
                FixedEngine::new(EngineKind::FasterWhisper, true),
                FixedEngine::new(EngineKind::WhisperCpp, false),
                FixedEngine::new(EngineKind::Openai, false),
            ],
            EngineKind::FasterWhisper,
        );
        let statuses = registry.status().await;
        assert_eq!(statuses.len(), 3);
        assert_eq!(
            statuses[&EngineKind::FasterWhisper],
            Availability::Available
        );
        assert_eq!(statuses[&EngineKind::WhisperCpp], Availability::Unavailable);
    }
}
