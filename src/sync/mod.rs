//! Optimistic-concurrency synchronization of JSON documents with the remote store.
//!
//! [`CollectionSync::mutate`] is the only writer of collection blobs:
//!
//! 1. read the blob and decode it,
//! 2. apply the transform (its errors abort with nothing written),
//! 3. encode canonically and skip the write when nothing changed,
//! 4. write with the token that was read,
//! 5. on a version conflict, re-read and re-apply once; a second conflict is
//!    returned to the caller,
//! 6. on success, write the result through to the mirror cache.
//!
//! The mutator does not serialize calls on the same path; callers in one
//! process hold a [`PathLocks`] guard around each mutation.

mod locks;

pub use locks::PathLocks;

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::MirrorCache;
use crate::codec::{self, Document};
use crate::errors::AppError;
use crate::store::{Blob, BlobStore};

/// Where a snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotSource {
    Remote,
    Cache,
}

/// A decoded document together with the token it was read at.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot<D> {
    pub items: D,
    pub version_token: Option<String>,
    pub source: SnapshotSource,
}

/// Result of a mutation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MutateOutcome<D> {
    /// Nothing was written because the remote already held this content
    pub skipped: bool,
    /// The first write hit a version conflict and the retry path ran
    pub retried: bool,
    pub items: D,
    pub version_token: Option<String>,
}

#[derive(Clone)]
pub struct CollectionSync {
    store: Arc<dyn BlobStore>,
    cache: MirrorCache,
}

impl CollectionSync {
    pub fn new(store: Arc<dyn BlobStore>, cache: MirrorCache) -> Self {
        Self { store, cache }
    }

    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }

    /// Read and strictly decode the document at `path`, refreshing the cache.
    pub async fn read<D: Document>(&self, path: &str) -> Result<Snapshot<D>, AppError> {
        let (blob, items) = self.load::<D>(path).await?;
        self.remember(path, &items, blob.version_token.as_deref()).await;
        Ok(Snapshot {
            items,
            version_token: blob.version_token,
            source: SnapshotSource::Remote,
        })
    }

    /// Like [`read`](Self::read), but serve the cached snapshot when the
    /// remote cannot be reached. Credential and decode failures still surface.
    pub async fn read_or_cached<D: Document>(&self, path: &str) -> Result<Snapshot<D>, AppError> {
        match self.read::<D>(path).await {
            Ok(snapshot) => Ok(snapshot),
            Err(err @ AppError::Transport { .. }) => match self.cache.entry(path).await {
                Ok(Some(entry)) => {
                    warn!(path, error = %err, "remote read failed, serving cached snapshot");
                    Ok(Snapshot {
                        items: codec::decode_lenient(&entry.content),
                        version_token: entry.version_token,
                        source: SnapshotSource::Cache,
                    })
                }
                _ => Err(err),
            },
            Err(err) => Err(err),
        }
    }

    /// Cached snapshot only; never touches the network.
    pub async fn cached<D: Document>(&self, path: &str) -> Result<Option<Snapshot<D>>, AppError> {
        Ok(self.cache.entry(path).await?.map(|entry| Snapshot {
            items: codec::decode_lenient(&entry.content),
            version_token: entry.version_token,
            source: SnapshotSource::Cache,
        }))
    }

    /// Alias of [`read`](Self::read) for whole-collection editors.
    pub async fn pull<D: Document>(&self, path: &str) -> Result<Snapshot<D>, AppError> {
        self.read(path).await
    }

    /// Replace the whole document at `path` with `doc`.
    pub async fn push<D>(&self, path: &str, doc: D, message: &str) -> Result<MutateOutcome<D>, AppError>
    where
        D: Document + Clone,
    {
        self.mutate(path, message, move |_| Ok(doc.clone())).await
    }

    /// Read-transform-compare-write with a single retry on version conflict.
    ///
    /// `transform` may run twice (once per attempt) and must derive its
    /// result only from the document it is given.
    pub async fn mutate<D, F>(
        &self,
        path: &str,
        message: &str,
        mut transform: F,
    ) -> Result<MutateOutcome<D>, AppError>
    where
        D: Document,
        F: FnMut(D) -> Result<D, AppError> + Send,
    {
        let (blob, current) = self.load::<D>(path).await?;
        let next = transform(current)?;
        let content = encode_at(path, &next)?;

        if unchanged::<D>(&blob, &content) {
            debug!(path, "no changes, skipping write");
            return Ok(self.finish(path, next, blob.version_token, true, false).await);
        }

        match self
            .store
            .put(path, &content, blob.version_token.as_deref(), message)
            .await
        {
            Ok(token) => {
                info!(path, commit = message, "collection written");
                Ok(self.finish(path, next, Some(token), false, false).await)
            }
            Err(AppError::Conflict(reason)) => {
                warn!(path, %reason, "version conflict, retrying against the latest copy");
                self.retry(path, message, &mut transform).await
            }
            Err(err) => Err(err),
        }
    }

    /// Delete the blob at `path` at whatever version it currently has.
    pub async fn delete(&self, path: &str, message: &str) -> Result<(), AppError> {
        let blob = self.store.get(path).await?;
        let Some(token) = blob.version_token else {
            return Err(AppError::NotFound(format!("File not found: {path}")));
        };
        self.store.delete(path, &token, message).await?;
        info!(path, commit = message, "file deleted");
        if let Err(e) = self.cache.clear(path).await {
            warn!(path, "failed to clear mirror cache: {}", e);
        }
        Ok(())
    }

    async fn retry<D, F>(
        &self,
        path: &str,
        message: &str,
        transform: &mut F,
    ) -> Result<MutateOutcome<D>, AppError>
    where
        D: Document,
        F: FnMut(D) -> Result<D, AppError> + Send,
    {
        let (fresh, current) = self.load::<D>(path).await?;
        let next = transform(current)?;
        let content = encode_at(path, &next)?;

        if unchanged::<D>(&fresh, &content) {
            info!(path, "remote already holds the desired content, skipping write");
            return Ok(self.finish(path, next, fresh.version_token, true, true).await);
        }

        // A second conflict is not retried.
        let token = self
            .store
            .put(path, &content, fresh.version_token.as_deref(), message)
            .await?;
        info!(path, commit = message, "collection written after retry");
        Ok(self.finish(path, next, Some(token), false, true).await)
    }

    async fn load<D: Document>(&self, path: &str) -> Result<(Blob, D), AppError> {
        let blob = self.store.get(path).await?;
        let items = codec::decode(&blob.content)
            .map_err(|e| AppError::Decode(format!("Failed to parse JSON at {path}: {e}")))?;
        Ok((blob, items))
    }

    async fn finish<D: Document>(
        &self,
        path: &str,
        items: D,
        version_token: Option<String>,
        skipped: bool,
        retried: bool,
    ) -> MutateOutcome<D> {
        self.remember(path, &items, version_token.as_deref()).await;
        MutateOutcome {
            skipped,
            retried,
            items,
            version_token,
        }
    }

    /// Write-through to the mirror. The remote already succeeded, so a cache
    /// failure is logged rather than returned.
    async fn remember<D: Document>(&self, path: &str, items: &D, version_token: Option<&str>) {
        if let Err(e) = self.cache.set(path, items, version_token).await {
            warn!(path, "failed to update mirror cache: {}", e);
        }
    }
}

/// Nothing to write: the blob already holds `content`, or it is missing and
/// `content` is just the empty document.
fn unchanged<D: Document>(blob: &Blob, content: &str) -> bool {
    if codec::same_content(content, &blob.content) {
        return true;
    }
    !blob.exists()
        && codec::encode(&D::empty()).is_ok_and(|empty| codec::same_content(content, &empty))
}

fn encode_at<D: Document>(path: &str, doc: &D) -> Result<String, AppError> {
    codec::encode(doc).map_err(|e| AppError::Internal(format!("Failed to encode {path}: {e}")))
}
