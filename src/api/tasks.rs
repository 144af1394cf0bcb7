//! Task API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use super::{success, ApiResult};
use crate::models::{CreateTaskRequest, Task, UpdateTaskRequest};
use crate::AppState;

/// GET /api/tasks - List all tasks.
pub async fn list_tasks(State(state): State<AppState>) -> ApiResult<Vec<Task>> {
    success(state.tasks.list().await?)
}

/// GET /api/tasks/{id}
pub async fn get_task(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Task> {
    success(state.tasks.get(&id).await?)
}

/// POST /api/tasks - Create a task.
pub async fn create_task(
    State(state): State<AppState>,
    Json(request): Json<CreateTaskRequest>,
) -> ApiResult<Task> {
    success(state.tasks.create(request).await?)
}

/// PUT /api/tasks/{id} - Patch a task.
pub async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateTaskRequest>,
) -> ApiResult<Task> {
    success(state.tasks.update(&id, request).await?)
}

/// DELETE /api/tasks/{id}
pub async fn delete_task(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Value> {
    state.tasks.remove(&id).await?;
    success(json!({ "id": id }))
}
