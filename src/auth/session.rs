//! Credential store for the provider bearer token.
//!
//! The session is an explicit object handed to the blob store client. UI
//! layers observe it through a `watch` receiver instead of global callbacks.

use serde::Serialize;
use sqlx::{Row, SqlitePool};
use tokio::sync::watch;

use crate::errors::AppError;
use crate::store::BlobStore;

/// Snapshot of the credential state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub provider: String,
    pub token: Option<String>,
    pub username: Option<String>,
}

impl SessionState {
    fn signed_out(provider: &str) -> Self {
        Self {
            provider: provider.to_string(),
            token: None,
            username: None,
        }
    }
}

/// Public view of the session; never carries the token itself.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub provider: String,
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl From<&SessionState> for SessionView {
    fn from(state: &SessionState) -> Self {
        Self {
            provider: state.provider.clone(),
            authenticated: state.token.is_some(),
            username: state.username.clone(),
        }
    }
}

/// Holds the bearer token, persists it, and notifies subscribers on change.
pub struct Session {
    tx: watch::Sender<SessionState>,
    pool: Option<SqlitePool>,
}

impl Session {
    /// Session that lives only in memory.
    pub fn in_memory(provider: &str) -> Self {
        let (tx, _rx) = watch::channel(SessionState::signed_out(provider));
        Self { tx, pool: None }
    }

    /// Load the persisted session, if any, from the cache database.
    pub async fn load(pool: SqlitePool, provider: &str) -> Result<Self, AppError> {
        let row = sqlx::query("SELECT provider, token, username FROM session WHERE id = 1")
            .fetch_optional(&pool)
            .await?;

        let state = match row {
            Some(row) if row.get::<String, _>("provider") == provider => SessionState {
                provider: provider.to_string(),
                token: row.get("token"),
                username: row.get("username"),
            },
            _ => SessionState::signed_out(provider),
        };

        let (tx, _rx) = watch::channel(state);
        Ok(Self {
            tx,
            pool: Some(pool),
        })
    }

    /// Subscribe to session changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    pub fn state(&self) -> SessionState {
        self.tx.borrow().clone()
    }

    pub fn view(&self) -> SessionView {
        SessionView::from(&*self.tx.borrow())
    }

    pub fn token(&self) -> Option<String> {
        self.tx.borrow().token.clone()
    }

    pub fn is_authed(&self) -> bool {
        self.tx.borrow().token.is_some()
    }

    /// Validate `token` against the provider's identity endpoint and store it.
    pub async fn login(&self, store: &dyn BlobStore, token: &str) -> Result<SessionView, AppError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AppError::Validation("Token is required".to_string()));
        }

        let username = store.whoami(token).await?;
        tracing::info!(username = %username, "session login");

        let state = SessionState {
            provider: self.tx.borrow().provider.clone(),
            token: Some(token.to_string()),
            username: Some(username),
        };
        self.replace(state).await?;
        Ok(self.view())
    }

    /// Install a token without validating it (e.g. one supplied by configuration).
    pub async fn restore(&self, token: &str) -> Result<(), AppError> {
        let mut state = self.state();
        state.token = Some(token.to_string());
        self.replace(state).await
    }

    pub async fn logout(&self) -> Result<(), AppError> {
        let provider = self.tx.borrow().provider.clone();
        self.replace(SessionState::signed_out(&provider)).await
    }

    /// Called by the blob store client when the provider rejects the credential.
    pub async fn auth_failure(&self) {
        if !self.is_authed() {
            return;
        }
        tracing::warn!("provider rejected the credential, signing out");
        if let Err(e) = self.logout().await {
            tracing::error!("failed to persist sign-out: {}", e);
        }
    }

    async fn replace(&self, state: SessionState) -> Result<(), AppError> {
        if let Some(pool) = &self.pool {
            sqlx::query(
                "INSERT INTO session (id, provider, token, username) VALUES (1, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET provider = excluded.provider, token = excluded.token, username = excluded.username",
            )
            .bind(&state.provider)
            .bind(&state.token)
            .bind(&state.username)
            .execute(pool)
            .await?;
        }
        self.tx.send_replace(state);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database;
    use crate::store::MemoryBlobStore;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_login_rejects_blank_token() {
        let session = Session::in_memory("memory");
        let store = MemoryBlobStore::new();
        let err = session.login(&store, "   ").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(!session.is_authed());
    }

    #[tokio::test]
    async fn test_login_and_logout_notify_subscribers() {
        let session = Session::in_memory("memory");
        let store = MemoryBlobStore::new();
        let mut rx = session.subscribe();

        let view = session.login(&store, "tok-1").await.unwrap();
        assert!(view.authenticated);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().token.as_deref(), Some("tok-1"));

        session.logout().await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().token.is_none());
    }

    #[tokio::test]
    async fn test_auth_failure_clears_token() {
        let session = Session::in_memory("github");
        session.restore("stale").await.unwrap();
        assert!(session.is_authed());

        session.auth_failure().await;
        assert!(!session.is_authed());
        assert_eq!(session.state().provider, "github");
    }

    #[tokio::test]
    async fn test_session_survives_reload() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("cache.sqlite");

        let pool = init_database(&db_path).await.unwrap();
        let session = Session::load(pool.clone(), "memory").await.unwrap();
        let store = MemoryBlobStore::new();
        session.login(&store, "persisted").await.unwrap();
        pool.close().await;

        let pool = init_database(&db_path).await.unwrap();
        let reloaded = Session::load(pool, "memory").await.unwrap();
        assert_eq!(reloaded.token().as_deref(), Some("persisted"));
        assert_eq!(reloaded.state().username.as_deref(), Some("local"));
    }

    #[tokio::test]
    async fn test_session_for_other_provider_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_database(&temp_dir.path().join("cache.sqlite")).await.unwrap();

        let session = Session::load(pool.clone(), "memory").await.unwrap();
        session.restore("memory-token").await.unwrap();

        let other = Session::load(pool, "github").await.unwrap();
        assert!(!other.is_authed());
    }
}
