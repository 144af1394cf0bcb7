//! Team API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use super::{success, ApiResult};
use crate::models::{CreateMemberRequest, TeamMember, UpdateMemberRequest};
use crate::AppState;

/// GET /api/team - List all team members.
pub async fn list_team(State(state): State<AppState>) -> ApiResult<Vec<TeamMember>> {
    success(state.team.list().await?)
}

/// GET /api/team/{id} - Get a single member.
pub async fn get_member(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<TeamMember> {
    success(state.team.get(&id).await?)
}

/// POST /api/team - Add a member.
pub async fn create_member(
    State(state): State<AppState>,
    Json(request): Json<CreateMemberRequest>,
) -> ApiResult<TeamMember> {
    success(state.team.create(request).await?)
}

/// PUT /api/team/{id} - Update a member.
pub async fn update_member(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateMemberRequest>,
) -> ApiResult<TeamMember> {
    success(state.team.update(&id, request).await?)
}

/// DELETE /api/team/{id} - Remove a member.
pub async fn delete_member(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    state.team.remove(&id).await?;
    success(json!({ "id": id }))
}
