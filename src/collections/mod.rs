//! Typed collection APIs over the mutator: team members, tasks and reports.
//!
//! Every mutation takes the per-path lock before running, so two requests in
//! this process never race on one file; the version token covers everyone else.

mod reports;
mod tasks;
mod team;

pub use reports::ReportsApi;
pub use tasks::TasksApi;
pub use team::TeamApi;

use uuid::Uuid;

use crate::config::join_path;
use crate::errors::AppError;

pub const TEAM_FILE: &str = "team.json";
pub const TASKS_FILE: &str = "tasks.json";
pub const REPORTS_INDEX_FILE: &str = "reports/index.json";

/// Resolves collection file names against the repository base path.
#[derive(Debug, Clone)]
pub struct DataPaths {
    base: String,
}

impl DataPaths {
    pub fn new(base: impl Into<String>) -> Self {
        Self { base: base.into() }
    }

    pub fn resolve(&self, relative: &str) -> String {
        join_path(&[&self.base, relative])
    }

    pub fn team(&self) -> String {
        self.resolve(TEAM_FILE)
    }

    pub fn tasks(&self) -> String {
        self.resolve(TASKS_FILE)
    }

    pub fn reports_index(&self) -> String {
        self.resolve(REPORTS_INDEX_FILE)
    }

    pub fn report(&self, id: &str) -> String {
        self.resolve(&format!("reports/{id}.json"))
    }
}

/// Caller-supplied id, or a fresh UUID v4.
fn resolve_id(requested: Option<&str>) -> Result<String, AppError> {
    match requested {
        Some(id) if id.trim().is_empty() => {
            Err(AppError::Validation("id must not be empty".to_string()))
        }
        Some(id) => Ok(id.trim().to_string()),
        None => Ok(Uuid::new_v4().to_string()),
    }
}

fn require_text(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use async_trait::async_trait;
    use sqlx::SqlitePool;
    use tempfile::TempDir;

    use crate::cache::MirrorCache;
    use crate::db::init_database;
    use crate::errors::AppError;
    use crate::store::{Blob, BlobStore, MemoryBlobStore};
    use crate::sync::CollectionSync;

    pub struct Harness {
        pub store: Arc<MemoryBlobStore>,
        pub sync: CollectionSync,
        pub pool: SqlitePool,
        pub _temp_dir: TempDir,
    }

    impl Harness {
        /// A sync over the same mirror whose remote is unreachable.
        pub fn offline(&self) -> CollectionSync {
            CollectionSync::new(Arc::new(Unreachable), MirrorCache::new(self.pool.clone()))
        }
    }

    struct Unreachable;

    fn refused() -> AppError {
        AppError::Transport {
            status: None,
            message: "connection refused".to_string(),
        }
    }

    #[async_trait]
    impl BlobStore for Unreachable {
        async fn get(&self, _path: &str) -> Result<Blob, AppError> {
            Err(refused())
        }

        async fn put(
            &self,
            _path: &str,
            _content: &str,
            _expected: Option<&str>,
            _message: &str,
        ) -> Result<String, AppError> {
            Err(refused())
        }

        async fn delete(&self, _path: &str, _version_token: &str, _message: &str) -> Result<(), AppError> {
            Err(refused())
        }

        async fn whoami(&self, _token: &str) -> Result<String, AppError> {
            Err(refused())
        }
    }

    pub async fn harness() -> Harness {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_database(&temp_dir.path().join("cache.sqlite")).await.unwrap();
        let store = Arc::new(MemoryBlobStore::new());
        let sync = CollectionSync::new(store.clone(), MirrorCache::new(pool.clone()));
        Harness {
            store,
            sync,
            pool,
            _temp_dir: temp_dir,
        }
    }
}
