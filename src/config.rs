use std::env;
use std::path::PathBuf;

const DEFAULT_DATABASE_URL: &str = "sqlite://./data/database/minutes.db?mode=rwc";
const DEFAULT_UPLOAD_DIR: &str = "./data/uploads";
const DEFAULT_STREAMING_ENGINE_URL: &str = "http://localhost:8178";
const DEFAULT_COMPILED_ENGINE_URL: &str = "http://localhost:8081";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub upload_dir: PathBuf,
    pub port: u16,
    /// faster-whisper style HTTP server (submits a task, polled for progress)
    pub streaming_engine_url: String,
    /// whisper.cpp style HTTP server (answers inference synchronously)
    pub compiled_engine_url: String,
    pub ollama_url: String,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub max_concurrent_jobs: usize,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            database_url: env_or("DATABASE_URL", DEFAULT_DATABASE_URL),
            upload_dir: PathBuf::from(env_or("UPLOAD_DIR", DEFAULT_UPLOAD_DIR)),
            port: env_or("PORT", "3000").parse().unwrap_or(3000),
            streaming_engine_url: env_or("FASTER_WHISPER_URL", DEFAULT_STREAMING_ENGINE_URL),
            compiled_engine_url: env_or("WHISPER_CPP_URL", DEFAULT_COMPILED_ENGINE_URL),
            ollama_url: env_or("OLLAMA_BASE_URL", DEFAULT_OLLAMA_URL),
            openai_api_key: env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
            anthropic_api_key: env::var("ANTHROPIC_API_KEY").ok().filter(|k| !k.is_empty()),
            max_concurrent_jobs: env_or("MAX_CONCURRENT_JOBS", "4").parse().unwrap_or(4),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
