//! Remote blob store: whole-file reads and writes keyed by path, guarded by
//! an opaque version token.

mod github;
mod memory;

pub use github::GithubContents;
pub use memory::MemoryBlobStore;

use async_trait::async_trait;

use crate::errors::AppError;

/// A file as last seen on the remote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blob {
    pub content: String,
    /// `None` when the file does not exist
    pub version_token: Option<String>,
}

impl Blob {
    /// A path with nothing stored at it.
    pub fn missing() -> Self {
        Self::default()
    }

    pub fn exists(&self) -> bool {
        self.version_token.is_some()
    }
}

/// Contract every remote file provider implements.
///
/// Failures use the shared taxonomy: `Auth` for a rejected credential,
/// `Conflict` for a version token mismatch on `put`, `NotFound` for a
/// missing or stale blob on `delete`, `Transport` for anything else.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetch the blob at `path`. A missing file is not an error.
    async fn get(&self, path: &str) -> Result<Blob, AppError>;

    /// Create or update the blob at `path` and return its new version token.
    ///
    /// `expected` must be the token the caller read; `None` means the caller
    /// believes the file does not exist yet.
    async fn put(
        &self,
        path: &str,
        content: &str,
        expected: Option<&str>,
        message: &str,
    ) -> Result<String, AppError>;

    /// Remove the blob at `path`, which must currently carry `version_token`.
    async fn delete(&self, path: &str, version_token: &str, message: &str) -> Result<(), AppError>;

    /// Resolve the account name a candidate token belongs to.
    async fn whoami(&self, token: &str) -> Result<String, AppError>;
}
