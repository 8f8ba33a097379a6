//! GitHub repository used as a file store.
//!
//! Reads and writes `material_lib_<fingerprint>.csv` at the repository root
//! through the [contents API](https://docs.github.com/en/rest/repos/contents):
//!
//! | Operation | Request |
//! |-----------|---------|
//! | read | `GET /repos/{owner}/{repo}/contents/{path}` → base64 `content` + blob `sha` |
//! | create | `PUT /repos/{owner}/{repo}/contents/{path}` without `sha` |
//! | update | `PUT /repos/{owner}/{repo}/contents/{path}` with the last-read `sha` |
//! | list dir | `GET /repos/{owner}/{repo}/contents/{dir}` → array of entries |
//!
//! The blob `sha` is the version token. GitHub refuses an update whose
//! `sha` is stale (409) and a create over an existing file (422); both map
//! to [`StoreError::Conflict`].
//!
//! Files above the API's inline size limit come back with an empty
//! `content`; those are fetched again from `download_url`.
//!
//! # Environment Variables
//!
//! The access token is read from the variable named by
//! `store.github.token_env` (default `GH_TOKEN`).

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use material_library_core::codec;
use material_library_core::models::Library;
use material_library_core::store::{
    LibraryStore, ReadOutcome, StoreError, VersionToken, WriteReason,
};
use material_library_core::user::UserId;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::config::GitHubConfig;

const USER_AGENT: &str = concat!("material-library/", env!("CARGO_PKG_VERSION"));

pub struct GitHubStore {
    http: reqwest::Client,
    api_base: String,
    repo: String,
    branch: Option<String>,
    token: String,
}

impl fmt::Debug for GitHubStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubStore")
            .field("api_base", &self.api_base)
            .field("repo", &self.repo)
            .field("branch", &self.branch)
            .finish_non_exhaustive()
    }
}

/// Single-file response of the contents API.
#[derive(Deserialize)]
struct ContentFile {
    sha: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: Option<String>,
    #[serde(default)]
    download_url: Option<String>,
}

/// Entry of a directory listing.
#[derive(Deserialize)]
struct DirEntry {
    name: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Serialize)]
struct PutRequest<'a> {
    message: &'a str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<&'a str>,
}

#[derive(Deserialize)]
struct PutResponse {
    content: PutContent,
}

#[derive(Deserialize)]
struct PutContent {
    sha: String,
}

impl GitHubStore {
    /// Build a store from config, reading the token from the environment.
    pub fn from_config(config: &GitHubConfig) -> Result<Self> {
        let token = std::env::var(&config.token_env)
            .with_context(|| format!("{} environment variable not set", config.token_env))?;
        Self::new(config, token)
    }

    pub fn new(config: &GitHubConfig, token: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            repo: config.repo.clone(),
            branch: config.branch.clone(),
            token,
        })
    }

    fn contents_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/contents/{}",
            self.api_base,
            self.repo,
            path.trim_matches('/')
        )
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let mut req = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json");
        if let Some(branch) = &self.branch {
            req = req.query(&[("ref", branch.as_str())]);
        }
        req
    }

    async fn read_file(&self, path: &str) -> Result<Option<(Vec<u8>, String)>, StoreError> {
        let url = self.contents_url(path);
        log::debug!("GET {}", url);
        let resp = self.get(&url).send().await.map_err(transport)?;
        match resp.status() {
            StatusCode::NOT_FOUND => return Ok(None),
            s if s.is_success() => {}
            s => return Err(status_error(s, resp.text().await.unwrap_or_default())),
        }

        let file: ContentFile = resp.json().await.map_err(transport)?;
        let bytes = if file.content.is_empty() || file.encoding.as_deref() == Some("none") {
            self.download(file.download_url.as_deref()).await?
        } else {
            decode_content(&file.content)?
        };
        Ok(Some((bytes, file.sha)))
    }

    async fn download(&self, url: Option<&str>) -> Result<Vec<u8>, StoreError> {
        let Some(url) = url else {
            // Empty file with no download link.
            return Ok(Vec::new());
        };
        let resp = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(transport)?;
        if !resp.status().is_success() {
            let status = resp.status();
            return Err(status_error(status, resp.text().await.unwrap_or_default()));
        }
        Ok(resp.bytes().await.map_err(transport)?.to_vec())
    }

    /// Names of the files directly inside `dir`.
    pub async fn list_directory(&self, dir: &str) -> Result<Vec<String>, StoreError> {
        let url = self.contents_url(dir);
        log::debug!("GET {}", url);
        let resp = self.get(&url).send().await.map_err(transport)?;
        if !resp.status().is_success() {
            let status = resp.status();
            return Err(status_error(status, resp.text().await.unwrap_or_default()));
        }
        let entries: Vec<DirEntry> = resp.json().await.map_err(transport)?;
        Ok(entries
            .into_iter()
            .filter(|e| e.kind == "file")
            .map(|e| e.name)
            .collect())
    }
}

fn decode_content(content: &str) -> Result<Vec<u8>, StoreError> {
    // The API wraps base64 at 60 columns.
    let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(compact)
        .map_err(|e| StoreError::Transport(format!("invalid base64 content: {}", e)))
}

fn transport(err: reqwest::Error) -> StoreError {
    StoreError::Transport(err.to_string())
}

fn status_error(status: StatusCode, body: String) -> StoreError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            StoreError::Unauthorized(format!("{}: {}", status, body))
        }
        _ => StoreError::Transport(format!("GitHub API error {}: {}", status, body)),
    }
}

#[async_trait]
impl LibraryStore for GitHubStore {
    fn backend(&self) -> &str {
        "github"
    }

    async fn fetch(&self, user: &UserId) -> ReadOutcome {
        match self.read_file(&user.file_name()).await {
            Ok(None) => ReadOutcome::NotFound,
            Ok(Some((bytes, sha))) => match codec::decode_library(&bytes) {
                Ok(library) => ReadOutcome::Found {
                    library,
                    token: VersionToken::new(sha),
                },
                Err(e) => ReadOutcome::TransportError(e.to_string()),
            },
            Err(e) => ReadOutcome::TransportError(e.to_string()),
        }
    }

    async fn write(
        &self,
        user: &UserId,
        library: &Library,
        token: Option<&VersionToken>,
        reason: WriteReason,
    ) -> Result<VersionToken, StoreError> {
        let path = user.file_name();
        let bytes = codec::encode(library)?;
        let body = PutRequest {
            message: reason.message(token),
            content: STANDARD.encode(&bytes),
            sha: token.map(|t| t.as_str()),
            branch: self.branch.as_deref(),
        };

        let url = self.contents_url(&path);
        log::debug!("PUT {} ({})", url, body.message);
        let resp = self
            .http
            .put(&url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .json(&body)
            .send()
            .await
            .map_err(transport)?;

        match resp.status() {
            StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
                Err(StoreError::Conflict { file: path })
            }
            s if s.is_success() => {
                let put: PutResponse = resp.json().await.map_err(transport)?;
                log::info!(
                    "github: wrote {}/{} ({} rows)",
                    self.repo,
                    path,
                    library.len()
                );
                Ok(VersionToken::new(put.content.sha))
            }
            s => Err(status_error(s, resp.text().await.unwrap_or_default())),
        }
    }
}
