use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::error;

use crate::storage::meeting::{Meeting, MeetingPatch};
use crate::web::handlers::ApiResponse;
use crate::AppContext;

pub fn meeting_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/", get(list_meetings).post(create_meeting))
        .route(
            "/:id",
            get(get_meeting).put(update_meeting).delete(delete_meeting),
        )
        .with_state(ctx)
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct ListQuery {
    pub(super) limit: Option<i64>,
    pub(super) offset: Option<i64>,
}

pub(super) async fn list_meetings(
    State(ctx): State<Arc<AppContext>>,
    Query(query): Query<ListQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(50).clamp(1, 1000);
    let offset = query.offset.unwrap_or(0).max(0);

    match ctx.meetings.list(limit, offset).await {
        Ok(meetings) => (StatusCode::OK, Json(ApiResponse::success(meetings))),
        Err(e) => {
            error!("Failed to list meetings: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(e.to_string())),
            )
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateMeetingRequest {
    pub(super) title: String,
    pub(super) description: Option<String>,
}

pub(super) async fn create_meeting(
    State(ctx): State<Arc<AppContext>>,
    Json(req): Json<CreateMeetingRequest>,
) -> impl IntoResponse {
    if req.title.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<Meeting>::error(
                "title must not be empty".to_string(),
            )),
        );
    }

    let meeting = Meeting::new(req.title, req.description);
    match ctx.meetings.create(&meeting).await {
        Ok(()) => (StatusCode::CREATED, Json(ApiResponse::success(meeting))),
        Err(e) => {
            error!("Failed to create meeting: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(e.to_string())),
            )
        }
    }
}

pub(super) async fn get_meeting(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match ctx.meetings.get(&id).await {
        Ok(Some(meeting)) => (StatusCode::OK, Json(ApiResponse::success(meeting))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("Meeting not found".to_string())),
        ),
        Err(e) => {
            error!("Failed to get meeting {}: {}", id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(e.to_string())),
            )
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct UpdateMeetingRequest {
    pub(super) title: Option<String>,
    pub(super) description: Option<String>,
}

pub(super) async fn update_meeting(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateMeetingRequest>,
) -> impl IntoResponse {
    match ctx.meetings.get(&id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::error("Meeting not found".to_string())),
            );
        }
        Err(e) => {
            error!("Failed to get meeting {}: {}", id, e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(e.to_string())),
            );
        }
    }

    let mut patch = MeetingPatch::default();
    if let Some(title) = req.title {
        patch = patch.title(title);
    }
    if let Some(description) = req.description {
        patch = patch.description(description);
    }

    if let Err(e) = ctx.meetings.update(&id, &patch).await {
        error!("Failed to update meeting {}: {}", id, e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(e.to_string())),
        );
    }

    match ctx.meetings.get(&id).await {
        Ok(Some(meeting)) => (StatusCode::OK, Json(ApiResponse::success(meeting))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("Meeting not found".to_string())),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(e.to_string())),
        ),
    }
}

pub(super) async fn delete_meeting(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match ctx.meetings.get(&id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::<String>::error(
                    "Meeting not found".to_string(),
                )),
            );
        }
        Err(e) => {
            error!("Failed to get meeting {}: {}", id, e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(e.to_string())),
            );
        }
    }

    match ctx.meetings.delete(&id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::success("deleted".to_string())),
        ),
        Err(e) => {
            error!("Failed to delete meeting {}: {}", id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(e.to_string())),
            )
        }
    }
}
