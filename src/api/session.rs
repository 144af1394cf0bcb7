//! Provider session endpoints.

use axum::{extract::State, Json};
use serde::Deserialize;

use super::{success, ApiResult};
use crate::auth::SessionView;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub token: String,
}

/// GET /api/session - Current session, without the token.
pub async fn get_session(State(state): State<AppState>) -> ApiResult<SessionView> {
    success(state.session.view())
}

/// POST /api/session/login - Validate a provider token and keep it.
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<SessionView> {
    success(
        state
            .session
            .login(state.sync.store().as_ref(), &request.token)
            .await?,
    )
}

/// POST /api/session/logout
pub async fn logout(State(state): State<AppState>) -> ApiResult<SessionView> {
    state.session.logout().await?;
    success(state.session.view())
}
