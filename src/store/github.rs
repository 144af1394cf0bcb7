//! GitHub contents API client.

use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use super::{Blob, BlobStore};
use crate::auth::Session;
use crate::config::Config;
use crate::errors::AppError;

const API_VERSION: &str = "2022-11-28";

/// Characters `encodeURIComponent` leaves alone.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

#[derive(Debug, Deserialize)]
struct ContentsFile {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
    sha: String,
}

#[derive(Debug, Serialize)]
struct PutBody<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct PutResponse {
    content: Option<PutContent>,
}

#[derive(Debug, Deserialize)]
struct PutContent {
    sha: String,
}

#[derive(Debug, Serialize)]
struct DeleteBody<'a> {
    message: &'a str,
    sha: &'a str,
    branch: &'a str,
}

#[derive(Debug, Deserialize)]
struct GithubUser {
    login: String,
}

/// Blob store backed by `/repos/{owner}/{repo}/contents`.
pub struct GithubContents {
    client: Client,
    api_url: String,
    owner: String,
    repo: String,
    branch: String,
    session: Arc<Session>,
}

impl GithubContents {
    pub fn new(config: &Config, session: Arc<Session>) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .user_agent(concat!("repo-tracker/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(config, session, client))
    }

    /// Use a caller-provided HTTP client.
    pub fn with_client(config: &Config, session: Arc<Session>, client: Client) -> Self {
        Self {
            client,
            api_url: config.api_url.clone(),
            owner: config.owner.clone(),
            repo: config.repo.clone(),
            branch: config.branch.clone(),
            session,
        }
    }

    fn contents_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_url,
            self.owner,
            self.repo,
            encode_path(path)
        )
    }

    fn request(&self, method: Method, url: &str, token: Option<&str>) -> RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION);
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Turn a non-success response into an error. A rejected credential
    /// signs the session out.
    async fn failure(&self, response: Response, context: &str) -> AppError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            warn!(status = status.as_u16(), "{} rejected the credential", context);
            self.session.auth_failure().await;
            return AppError::Auth(format!(
                "Access denied: {} (HTTP {})",
                context,
                status.as_u16()
            ));
        }

        AppError::Transport {
            status: Some(status.as_u16()),
            message: format!("{} failed: {}", context, body),
        }
    }
}

#[async_trait]
impl BlobStore for GithubContents {
    #[instrument(skip(self), fields(provider = "github"))]
    async fn get(&self, path: &str) -> Result<Blob, AppError> {
        let url = format!(
            "{}?ref={}",
            self.contents_url(path),
            utf8_percent_encode(&self.branch, COMPONENT)
        );
        debug!("GET {}", url);

        let token = self.session.token();
        let response = self.request(Method::GET, &url, token.as_deref()).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Blob::missing());
        }
        if !response.status().is_success() {
            return Err(self.failure(response, &format!("GET {path}")).await);
        }

        let file: ContentsFile = response.json().await?;
        let raw = file.content.unwrap_or_default();
        let content = match file.encoding.as_deref() {
            Some("base64") => decode_base64(&raw)
                .map_err(|e| AppError::Decode(format!("{path}: invalid base64 content: {e}")))?,
            _ => raw,
        };

        Ok(Blob {
            content,
            version_token: Some(file.sha),
        })
    }

    #[instrument(skip(self, content), fields(provider = "github", bytes = content.len()))]
    async fn put(
        &self,
        path: &str,
        content: &str,
        expected: Option<&str>,
        message: &str,
    ) -> Result<String, AppError> {
        let url = self.contents_url(path);
        let body = PutBody {
            message,
            content: STANDARD.encode(content.as_bytes()),
            branch: &self.branch,
            sha: expected,
        };

        let token = self.session.token();
        let response = self
            .request(Method::PUT, &url, token.as_deref())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        // 409: sha does not match; 422 naming `sha`: sha missing for an existing file.
        if status == StatusCode::CONFLICT || status == StatusCode::UNPROCESSABLE_ENTITY {
            let detail = response.text().await.unwrap_or_default();
            if status == StatusCode::CONFLICT || mentions_sha(&detail) {
                return Err(AppError::Conflict(format!(
                    "PUT {path} rejected (HTTP {}): {detail}",
                    status.as_u16()
                )));
            }
            return Err(AppError::Transport {
                status: Some(status.as_u16()),
                message: format!("PUT {path} failed: {detail}"),
            });
        }
        if !status.is_success() {
            return Err(self.failure(response, &format!("PUT {path}")).await);
        }

        let written: PutResponse = response.json().await?;
        written
            .content
            .map(|c| c.sha)
            .ok_or_else(|| AppError::Decode(format!("PUT {path}: response carried no sha")))
    }

    #[instrument(skip(self), fields(provider = "github"))]
    async fn delete(&self, path: &str, version_token: &str, message: &str) -> Result<(), AppError> {
        let url = self.contents_url(path);
        let body = DeleteBody {
            message,
            sha: version_token,
            branch: &self.branch,
        };

        let token = self.session.token();
        let response = self
            .request(Method::DELETE, &url, token.as_deref())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND
            || status == StatusCode::CONFLICT
            || status == StatusCode::UNPROCESSABLE_ENTITY
        {
            return Err(AppError::NotFound(format!(
                "{path} is missing or changed since it was read (HTTP {})",
                status.as_u16()
            )));
        }
        if !status.is_success() {
            return Err(self.failure(response, &format!("DELETE {path}")).await);
        }
        Ok(())
    }

    async fn whoami(&self, token: &str) -> Result<String, AppError> {
        let url = format!("{}/user", self.api_url);
        let response = self.request(Method::GET, &url, Some(token)).send().await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AppError::Auth("Invalid GitHub token".to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Transport {
                status: Some(status.as_u16()),
                message: format!("GET /user failed: {body}"),
            });
        }

        let user: GithubUser = response.json().await?;
        Ok(user.login)
    }
}

/// Percent-encode each path segment, keeping the slashes.
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|seg| utf8_percent_encode(seg, COMPONENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// GitHub wraps base64 content at 60 columns.
/// Whether a validation failure is about the `sha` field.
fn mentions_sha(body: &str) -> bool {
    body.to_ascii_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .any(|word| word == "sha")
}

fn decode_base64(raw: &str) -> Result<String, String> {
    let compact: String = raw.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = STANDARD.decode(compact).map_err(|e| e.to_string())?;
    String::from_utf8(bytes).map_err(|e| e.to_string())
}
