use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use tokio::net::TcpListener;
use tracing::info;

pub mod handlers;

use crate::AppContext;

// meeting recordings run long, allow up to 512 MiB per upload
const MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

pub async fn start_server(ctx: Arc<AppContext>, addr: SocketAddr) -> anyhow::Result<()> {
    let app = handlers::router(ctx).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES));

    info!("Starting server on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
