//! In-process blob store with the same conflict rules as the GitHub contents API.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use super::{Blob, BlobStore};
use crate::errors::AppError;

#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Blob>>,
    writes: AtomicUsize,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Git-style content hash: `sha256("blob <len>\0<content>")`.
    pub fn content_token(content: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!("blob {}\0", content.len()).as_bytes());
        hasher.update(content.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Number of successful `put`/`delete` calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Place content directly, bypassing token checks and the write counter.
    pub async fn seed(&self, path: &str, content: &str) -> String {
        let token = Self::content_token(content);
        self.blobs.lock().await.insert(
            path.to_string(),
            Blob {
                content: content.to_string(),
                version_token: Some(token.clone()),
            },
        );
        token
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, path: &str) -> Result<Blob, AppError> {
        Ok(self
            .blobs
            .lock()
            .await
            .get(path)
            .cloned()
            .unwrap_or_else(Blob::missing))
    }

    async fn put(
        &self,
        path: &str,
        content: &str,
        expected: Option<&str>,
        message: &str,
    ) -> Result<String, AppError> {
        let mut blobs = self.blobs.lock().await;
        let current = blobs.get(path).and_then(|b| b.version_token.as_deref());

        match (current, expected) {
            (Some(current), Some(expected)) if current != expected => {
                return Err(AppError::Conflict(format!(
                    "{path} is at {current}, not {expected}"
                )));
            }
            (Some(_), None) => {
                return Err(AppError::Conflict(format!(
                    "{path} already exists and no version token was supplied"
                )));
            }
            (None, Some(expected)) => {
                return Err(AppError::Conflict(format!(
                    "{path} does not exist, cannot update from {expected}"
                )));
            }
            _ => {}
        }

        let token = Self::content_token(content);
        blobs.insert(
            path.to_string(),
            Blob {
                content: content.to_string(),
                version_token: Some(token.clone()),
            },
        );
        self.writes.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(path, commit = message, token = %token, "memory store write");
        Ok(token)
    }

    async fn delete(&self, path: &str, version_token: &str, message: &str) -> Result<(), AppError> {
        let mut blobs = self.blobs.lock().await;
        match blobs.get(path).and_then(|b| b.version_token.as_deref()) {
            Some(current) if current == version_token => {
                blobs.remove(path);
                self.writes.fetch_add(1, Ordering::SeqCst);
                tracing::debug!(path, commit = message, "memory store delete");
                Ok(())
            }
            Some(_) => Err(AppError::NotFound(format!(
                "{path} changed since it was read"
            ))),
            None => Err(AppError::NotFound(format!("{path} does not exist"))),
        }
    }

    async fn whoami(&self, token: &str) -> Result<String, AppError> {
        if token.trim().is_empty() {
            return Err(AppError::Auth("Empty token".to_string()));
        }
        Ok("local".to_string())
    }
}
