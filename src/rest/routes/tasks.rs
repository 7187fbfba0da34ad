// rest/routes/tasks.rs — Task CRUD routes under /api/task.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::rest::error::ApiError;
use crate::tasks::{Task, TaskDraft};
use crate::AppContext;

pub async fn list_tasks(
    State(ctx): State<Arc<AppContext>>,
) -> Result<Json<Vec<Task>>, ApiError> {
    Ok(Json(ctx.storage.list_tasks().await?))
}

pub async fn get_task(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
) -> Result<Json<Task>, ApiError> {
    match ctx.storage.get_task(&id).await? {
        Some(task) => Ok(Json(task)),
        None => Err(ApiError::NotFound),
    }
}

pub async fn create_task(
    State(ctx): State<Arc<AppContext>>,
    Json(draft): Json<TaskDraft>,
) -> Result<impl IntoResponse, ApiError> {
    let task = ctx.storage.insert_task(draft).await?;
    let location = format!("/api/task/{}", task.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(task),
    ))
}

/// Full-record replacement. The body must carry the same id as the path;
/// a mismatch is a 400 before the store is touched.
pub async fn update_task(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
    Json(task): Json<Task>,
) -> Result<StatusCode, ApiError> {
    if id != task.id {
        return Err(ApiError::IdMismatch);
    }
    ctx.storage.update_task(&id, &task).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_task(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    ctx.storage.delete_task(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
