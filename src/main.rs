//! Repo Tracker
//!
//! Team, task and report collections kept as JSON files in a remote
//! repository, edited through optimistic-concurrency writes and served over a
//! small REST API with a local SQLite mirror.

mod api;
mod auth;
mod cache;
mod codec;
mod collections;
mod config;
mod db;
mod errors;
mod models;
mod report;
mod store;
mod sync;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use sqlx::SqlitePool;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use auth::Session;
use cache::MirrorCache;
use collections::{DataPaths, ReportsApi, TasksApi, TeamApi};
use config::{Config, Provider};
use store::{BlobStore, GithubContents, MemoryBlobStore};
use sync::{CollectionSync, PathLocks};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub team: TeamApi,
    pub tasks: TasksApi,
    pub reports: ReportsApi,
    pub sync: CollectionSync,
    pub locks: PathLocks,
    pub paths: DataPaths,
    pub session: Arc<Session>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wire the collection APIs over `store`.
    pub fn new(
        config: Config,
        pool: SqlitePool,
        store: Arc<dyn BlobStore>,
        session: Arc<Session>,
    ) -> Self {
        let sync = CollectionSync::new(store, MirrorCache::new(pool));
        let locks = PathLocks::new();
        let paths = DataPaths::new(config.base_path.clone());

        Self {
            team: TeamApi::new(sync.clone(), locks.clone(), &paths),
            tasks: TasksApi::new(sync.clone(), locks.clone(), &paths),
            reports: ReportsApi::new(sync.clone(), locks.clone(), &paths),
            sync,
            locks,
            paths,
            session,
            config: Arc::new(config),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Repo Tracker");
    tracing::info!("Provider: {}", config.provider.as_str());
    tracing::info!("Data path: {}", config.base_path);
    tracing::info!("Cache path: {:?}", config.cache_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    if config.api_psk.is_none() {
        tracing::warn!("No API PSK configured (REPO_API_PSK). Authentication is disabled!");
    }

    // Mirror cache and persisted session
    let pool = db::init_database(&config.cache_path).await?;
    let session = Arc::new(Session::load(pool.clone(), config.provider.as_str()).await?);
    watch_session(&session);
    if let Some(token) = &config.token {
        session.restore(token).await?;
    }

    let store: Arc<dyn BlobStore> = match config.provider {
        Provider::Github => {
            tracing::info!("Repository: {}/{}@{}", config.owner, config.repo, config.branch);
            Arc::new(GithubContents::new(&config, session.clone())?)
        }
        Provider::Memory => {
            tracing::warn!("Using the in-memory provider; nothing is persisted remotely");
            Arc::new(MemoryBlobStore::new())
        }
    };

    let bind_addr = config.bind_addr;
    let state = AppState::new(config, pool, store, session);

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Log every session transition.
fn watch_session(session: &Session) {
    let mut rx = session.subscribe();
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let state = rx.borrow_and_update().clone();
            match state.username {
                Some(user) if state.token.is_some() => {
                    tracing::info!(user = %user, "session signed in")
                }
                _ if state.token.is_some() => tracing::info!("session token restored"),
                _ => tracing::info!("session signed out"),
            }
        }
    });
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Clone PSK for the auth layer
    let psk = state.config.api_psk.clone();

    // API routes
    let api_routes = Router::new()
        // Team
        .route("/team", get(api::list_team).post(api::create_member))
        .route(
            "/team/{id}",
            get(api::get_member)
                .put(api::update_member)
                .delete(api::delete_member),
        )
        // Tasks
        .route("/tasks", get(api::list_tasks).post(api::create_task))
        .route(
            "/tasks/{id}",
            get(api::get_task)
                .put(api::update_task)
                .delete(api::delete_task),
        )
        // Reports
        .route("/reports", get(api::list_reports).post(api::generate_report))
        .route("/reports/monthly", post(api::generate_monthly_report))
        .route(
            "/reports/{id}",
            get(api::get_report).delete(api::delete_report),
        )
        // Raw collections
        .route(
            "/collections/{*path}",
            get(api::pull_collection).put(api::push_collection),
        )
        // Session
        .route("/session", get(api::get_session))
        .route("/session/login", post(api::login))
        .route("/session/logout", post(api::logout))
        // Apply PSK auth middleware
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
