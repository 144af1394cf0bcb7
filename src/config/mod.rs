//! Configuration module for the tracker.
//!
//! All configuration is loaded from environment variables with sensible defaults
//! and is static for the lifetime of the process.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Which remote blob store backs the collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// GitHub contents API
    Github,
    /// In-process store, nothing leaves the machine
    Memory,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Github => "github",
            Provider::Memory => "memory",
        }
    }
}

impl FromStr for Provider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "github" => Ok(Provider::Github),
            "memory" => Ok(Provider::Memory),
            _ => Err(ConfigError::Invalid {
                name: "REPO_PROVIDER",
                value: s.to_string(),
            }),
        }
    }
}

/// Configuration loading failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
    #[error("{0} must be set when REPO_PROVIDER=github")]
    Missing(&'static str),
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Remote blob store provider
    pub provider: Provider,
    /// Repository owner (user or organisation)
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// Branch every read and commit targets
    pub branch: String,
    /// Directory inside the repository holding the JSON files, without slashes at either end
    pub base_path: String,
    /// Provider API root
    pub api_url: String,
    /// Initial bearer token, restored into the session on startup
    pub token: Option<String>,
    /// Per-request HTTP timeout
    pub http_timeout: Duration,
    /// Path to the SQLite file holding the mirror cache and session
    pub cache_path: PathBuf,
    /// Pre-shared key for the REST surface
    pub api_psk: Option<String>,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables (and `.env`, if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let provider = match var("REPO_PROVIDER") {
            Some(raw) => raw.parse()?,
            None => Provider::Github,
        };

        let owner = var("REPO_OWNER").unwrap_or_default();
        let repo = var("REPO_NAME").unwrap_or_default();
        if provider == Provider::Github {
            if owner.is_empty() {
                return Err(ConfigError::Missing("REPO_OWNER"));
            }
            if repo.is_empty() {
                return Err(ConfigError::Missing("REPO_NAME"));
            }
        }

        let branch = var("REPO_BRANCH").unwrap_or_else(|| "main".to_string());

        let base_path = var("REPO_BASEPATH")
            .unwrap_or_else(|| "public/data".to_string())
            .trim_matches('/')
            .to_string();

        let api_url = var("REPO_API_URL")
            .unwrap_or_else(|| "https://api.github.com".to_string())
            .trim_end_matches('/')
            .to_string();

        let http_timeout = match var("REPO_HTTP_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| ConfigError::Invalid {
                    name: "REPO_HTTP_TIMEOUT_SECS",
                    value: raw,
                })?,
            None => Duration::from_secs(30),
        };

        let cache_path = var("REPO_CACHE_PATH")
            .unwrap_or_else(|| "./data/cache.sqlite".to_string())
            .into();

        let bind_raw = var("REPO_BIND_ADDR").unwrap_or_else(|| "127.0.0.1:8080".to_string());
        let bind_addr = bind_raw.parse().map_err(|_| ConfigError::Invalid {
            name: "REPO_BIND_ADDR",
            value: bind_raw.clone(),
        })?;

        let log_level = var("REPO_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        Ok(Self {
            provider,
            owner,
            repo,
            branch,
            base_path,
            api_url,
            token: var("REPO_TOKEN"),
            http_timeout,
            cache_path,
            api_psk: var("REPO_API_PSK"),
            bind_addr,
            log_level,
        })
    }
}

/// Join path fragments with single slashes, dropping empty parts.
pub fn join_path(parts: &[&str]) -> String {
    parts
        .iter()
        .flat_map(|p| p.split('/'))
        .filter(|seg| !seg.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = load(&[("REPO_OWNER", "acme"), ("REPO_NAME", "tracker")]).unwrap();

        assert_eq!(config.provider, Provider::Github);
        assert_eq!(config.branch, "main");
        assert_eq!(config.base_path, "public/data");
        assert_eq!(config.api_url, "https://api.github.com");
        assert!(config.token.is_none());
        assert!(config.api_psk.is_none());
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(config.cache_path, PathBuf::from("./data/cache.sqlite"));
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_github_requires_owner_and_repo() {
        let err = load(&[("REPO_NAME", "tracker")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("REPO_OWNER")));

        let err = load(&[("REPO_OWNER", "acme")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("REPO_NAME")));
    }

    #[test]
    fn test_memory_provider_needs_no_repo() {
        let config = load(&[("REPO_PROVIDER", "Memory")]).unwrap();
        assert_eq!(config.provider, Provider::Memory);
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let err = load(&[("REPO_PROVIDER", "gitea")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "REPO_PROVIDER", .. }));
    }

    #[test]
    fn test_base_path_slashes_trimmed() {
        let config = load(&[("REPO_PROVIDER", "memory"), ("REPO_BASEPATH", "/data/tracker/")]).unwrap();
        assert_eq!(config.base_path, "data/tracker");
        assert_eq!(
            join_path(&[&config.base_path, "/reports//index.json"]),
            "data/tracker/reports/index.json"
        );
    }

    #[test]
    fn test_invalid_bind_addr() {
        let err = load(&[("REPO_PROVIDER", "memory"), ("REPO_BIND_ADDR", "nowhere")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "REPO_BIND_ADDR", .. }));
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path(&["", "team.json"]), "team.json");
        assert_eq!(join_path(&["a/", "/b", "c.json"]), "a/b/c.json");
    }
}
