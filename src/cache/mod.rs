//! Local mirror cache.
//!
//! Keeps the last known snapshot of every collection path in SQLite so a UI
//! can render instantly and fall back when the remote is unreachable. Each
//! `set` replaces the previous snapshot for that path outright; the cache is
//! never a write authority.

use serde::Serialize;
use sqlx::{Row, SqlitePool};

use crate::codec::{self, Document};
use crate::errors::AppError;
use crate::models::now_iso;

/// Raw cached snapshot of one path.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorEntry {
    pub path: String,
    pub content: String,
    pub version_token: Option<String>,
    pub updated_at: String,
}

#[derive(Clone)]
pub struct MirrorCache {
    pool: SqlitePool,
}

impl MirrorCache {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Raw snapshot for `path`, if one was ever stored.
    pub async fn entry(&self, path: &str) -> Result<Option<MirrorEntry>, AppError> {
        let row = sqlx::query(
            "SELECT path, content, version_token, updated_at FROM mirror WHERE path = ?",
        )
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| MirrorEntry {
            path: row.get("path"),
            content: row.get("content"),
            version_token: row.get("version_token"),
            updated_at: row.get("updated_at"),
        }))
    }

    /// Cached document for `path`. Malformed cache content reads as empty.
    pub async fn get<D: Document>(&self, path: &str) -> Result<Option<D>, AppError> {
        Ok(self
            .entry(path)
            .await?
            .map(|entry| codec::decode_lenient(&entry.content)))
    }

    /// Replace the snapshot for `path`.
    pub async fn set<D: Document>(
        &self,
        path: &str,
        doc: &D,
        version_token: Option<&str>,
    ) -> Result<(), AppError> {
        let content = codec::encode(doc)?;
        self.set_raw(path, &content, version_token).await
    }

    pub(crate) async fn set_raw(
        &self,
        path: &str,
        content: &str,
        version_token: Option<&str>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO mirror (path, content, version_token, updated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(path) DO UPDATE SET content = excluded.content, version_token = excluded.version_token, updated_at = excluded.updated_at",
        )
        .bind(path)
        .bind(content)
        .bind(version_token)
        .bind(now_iso())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Forget `path`. Returns whether anything was cached.
    pub async fn clear(&self, path: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM mirror WHERE path = ?")
            .bind(path)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    async fn cache() -> (MirrorCache, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_database(&temp_dir.path().join("cache.sqlite")).await.unwrap();
        (MirrorCache::new(pool), temp_dir)
    }

    #[tokio::test]
    async fn test_absent_path() {
        let (cache, _dir) = cache().await;
        let items: Option<Vec<Value>> = cache.get("team.json").await.unwrap();
        assert!(items.is_none());
    }

    #[tokio::test]
    async fn test_set_replaces_snapshot() {
        let (cache, _dir) = cache().await;
        cache
            .set("team.json", &vec![json!({"id": "a"}), json!({"id": "b"})], Some("t1"))
            .await
            .unwrap();
        cache
            .set("team.json", &vec![json!({"id": "c"})], Some("t2"))
            .await
            .unwrap();

        let items: Vec<Value> = cache.get("team.json").await.unwrap().unwrap();
        assert_eq!(items, vec![json!({"id": "c"})]);

        let entry = cache.entry("team.json").await.unwrap().unwrap();
        assert_eq!(entry.version_token.as_deref(), Some("t2"));
        assert!(entry.content.ends_with("]\n"));
    }

    #[tokio::test]
    async fn test_malformed_cache_reads_as_empty() {
        let (cache, _dir) = cache().await;
        cache.set_raw("tasks.json", "<html>oops</html>", None).await.unwrap();

        let items: Vec<Value> = cache.get("tasks.json").await.unwrap().unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_clear() {
        let (cache, _dir) = cache().await;
        cache.set("a.json", &Vec::<Value>::new(), None).await.unwrap();
        assert!(cache.clear("a.json").await.unwrap());
        assert!(!cache.clear("a.json").await.unwrap());
        assert!(cache.entry("a.json").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("cache.sqlite");

        let pool = init_database(&db_path).await.unwrap();
        MirrorCache::new(pool.clone())
            .set("team.json", &vec![json!({"id": "anna"})], Some("t1"))
            .await
            .unwrap();
        pool.close().await;

        let pool = init_database(&db_path).await.unwrap();
        let items: Vec<Value> = MirrorCache::new(pool).get("team.json").await.unwrap().unwrap();
        assert_eq!(items, vec![json!({"id": "anna"})]);
    }
}
