use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use minutes_rs::config::Config;
use minutes_rs::engines::EngineRegistry;
use minutes_rs::pipeline::Orchestrator;
use minutes_rs::providers::ProviderRegistry;
use minutes_rs::storage;
use minutes_rs::storage::job::SqliteJobStore;
use minutes_rs::storage::meeting::SqliteMeetingStore;
use minutes_rs::utils::logger;
use minutes_rs::web::start_server;
use minutes_rs::{init_env, AppContext};

#[tokio::main]
async fn main() -> Result<()> {
    let _guard = logger::init("./logs".to_string())?;

    let config = Config::from_env();
    init_env(&config);

    info!("Starting meeting minutes service...");

    info!("Initializing Storage...");
    let pool = storage::connect(&config.database_url).await?;
    let jobs = Arc::new(SqliteJobStore::new(pool.clone()));
    let meetings = Arc::new(SqliteMeetingStore::new(pool));

    info!("Initializing Engine Registry...");
    let engines = Arc::new(EngineRegistry::new(&config));

    info!("Initializing Provider Registry...");
    let providers = Arc::new(ProviderRegistry::new(&config));

    info!("Initializing Orchestrator...");
    let orchestrator = Arc::new(Orchestrator::new(
        jobs,
        meetings.clone(),
        engines.clone(),
        providers.clone(),
        config.max_concurrent_jobs,
    ));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let ctx = Arc::new(AppContext {
        config,
        orchestrator,
        engines,
        providers,
        meetings,
    });

    start_server(ctx, addr).await
}
