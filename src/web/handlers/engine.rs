use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::engines::{Availability, EngineKind};
use crate::web::handlers::ApiResponse;
use crate::AppContext;

pub fn engine_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/current", get(current_engine))
        .route("/select", post(select_engine))
        .route("/status", get(engine_status))
        .with_state(ctx)
}

async fn current_engine(State(ctx): State<Arc<AppContext>>) -> impl IntoResponse {
    let current = ctx.engines.current().await;
    (StatusCode::OK, Json(ApiResponse::success(current)))
}

#[derive(Debug, Deserialize)]
pub(super) struct SelectRequest {
    pub(super) engine: String,
}

pub(super) async fn select_engine(
    State(ctx): State<Arc<AppContext>>,
    Json(req): Json<SelectRequest>,
) -> impl IntoResponse {
    match req.engine.parse::<EngineKind>() {
        Ok(kind) => {
            let selected = ctx.engines.select_default(kind).await;
            (StatusCode::OK, Json(ApiResponse::success(selected)))
        }
        Err(e) => (StatusCode::BAD_REQUEST, Json(ApiResponse::error(e))),
    }
}

#[derive(Debug, Serialize)]
struct EngineStatusResponse {
    engines: HashMap<EngineKind, Availability>,
    current_engine: EngineKind,
}

pub(super) async fn engine_status(State(ctx): State<Arc<AppContext>>) -> impl IntoResponse {
    let response = EngineStatusResponse {
        engines: ctx.engines.status().await,
        current_engine: ctx.engines.current().await,
    };
    (StatusCode::OK, Json(ApiResponse::success(response)))
}
