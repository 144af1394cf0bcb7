//! Whole-collection pull/push endpoints for clients that edit a local copy.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use super::{success, ApiResult};
use crate::codec::RawCollection;
use crate::errors::AppError;
use crate::sync::{MutateOutcome, Snapshot};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct PullQuery {
    /// Serve the mirror cache without touching the remote
    #[serde(default)]
    pub cached: bool,
}

/// GET /api/collections/{*path} - Pull a collection (`?cached=true` for the mirror).
pub async fn pull_collection(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(query): Query<PullQuery>,
) -> ApiResult<Snapshot<RawCollection>> {
    let full = collection_path(&state, &path)?;
    if query.cached {
        let snapshot = state
            .sync
            .cached::<RawCollection>(&full)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Nothing cached for {path}")))?;
        return success(snapshot);
    }
    success(state.sync.read_or_cached(&full).await?)
}

/// PUT /api/collections/{*path} - Replace a collection with the request body
/// (an array, or an object with an `items` array).
pub async fn push_collection(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Json(items): Json<RawCollection>,
) -> ApiResult<MutateOutcome<RawCollection>> {
    let full = collection_path(&state, &path)?;
    let _guard = state.locks.lock(&full).await;
    let message = format!("chore: sync {path}");
    success(state.sync.push(&full, items, &message).await?)
}

/// Resolve a client-supplied path under the data directory.
fn collection_path(state: &AppState, relative: &str) -> Result<String, AppError> {
    let relative = relative.trim_start_matches('/');
    let valid = relative.ends_with(".json")
        && relative
            .split('/')
            .all(|seg| !seg.is_empty() && seg != "." && seg != "..");
    if !valid {
        return Err(AppError::Validation(format!(
            "Invalid collection path: {relative:?}"
        )));
    }
    Ok(state.paths.resolve(relative))
}
