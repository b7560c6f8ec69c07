pub mod config;
pub mod engines;
pub mod pipeline;
pub mod providers;
pub mod storage;
pub mod utils;
pub mod web;

use std::sync::Arc;

use config::Config;
use engines::EngineRegistry;
use pipeline::Orchestrator;
use providers::ProviderRegistry;
use storage::meeting::MeetingStore;

pub struct AppContext {
    pub config: Config,
    pub orchestrator: Arc<Orchestrator>,
    pub engines: Arc<EngineRegistry>,
    pub providers: Arc<ProviderRegistry>,
    pub meetings: Arc<dyn MeetingStore>,
}

pub fn init_env(config: &Config) {
    // make sure the database and upload directories exist before anything opens them
    if let Some(db_path) = config.database_url.strip_prefix("sqlite://") {
        let db_path = db_path.split('?').next().unwrap_or(db_path);
        if let Some(dir) = std::path::Path::new(db_path).parent() {
            std::fs::create_dir_all(dir).unwrap_or_else(|e| {
                eprintln!("Failed to create database directory: {}", e);
            });
        }
    }
    std::fs::create_dir_all(&config.upload_dir).unwrap_or_else(|e| {
        eprintln!("Failed to create upload directory: {}", e);
    });
}
