//! TOML configuration.
//!
//! Every section is optional; a missing file yields [`Config::minimal`],
//! which stores libraries under `./data` and talks to the DeepSeek API.
//! The LLM API key is never read from the config file.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub bookshelf: BookshelfConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_llm_base_url() -> String {
    "https://api.deepseek.com".to_string()
}
fn default_llm_model() -> String {
    "deepseek-chat".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// `"local"` or `"github"`.
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Directory holding library files for the local backend.
    #[serde(default = "default_data_dir")]
    pub dir: PathBuf,
    #[serde(default)]
    pub github: Option<GitHubConfig>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            dir: default_data_dir(),
            github: None,
        }
    }
}

fn default_backend() -> String {
    "local".to_string()
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

#[derive(Debug, Deserialize, Clone)]
pub struct GitHubConfig {
    /// Repository in `owner/name` form.
    pub repo: String,
    #[serde(default)]
    pub branch: Option<String>,
    /// Environment variable holding the access token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_store_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_token_env() -> String {
    "GH_TOKEN".to_string()
}
fn default_api_base() -> String {
    "https://api.github.com".to_string()
}
fn default_store_timeout_secs() -> u64 {
    15
}

#[derive(Debug, Deserialize, Clone)]
pub struct BookshelfConfig {
    /// Local directory of reference documents. With the github backend the
    /// same path is listed inside the repository instead.
    #[serde(default = "default_data_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_extension")]
    pub extension: String,
    /// Substrings removed from document names.
    #[serde(default)]
    pub strip: Vec<String>,
    #[serde(default = "default_fallback")]
    pub fallback: Vec<String>,
}

impl Default for BookshelfConfig {
    fn default() -> Self {
        Self {
            dir: default_data_dir(),
            extension: default_extension(),
            strip: Vec::new(),
            fallback: default_fallback(),
        }
    }
}

fn default_extension() -> String {
    "pdf".to_string()
}
fn default_fallback() -> Vec<String> {
    ["必修1", "必修2", "必修3", "必修4"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8420".to_string()
}

impl Config {
    /// Local-disk configuration with all defaults.
    pub fn minimal() -> Self {
        Self::default()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.llm.timeout_secs == 0 {
        bail!("llm.timeout_secs must be > 0");
    }
    if config.llm.model.trim().is_empty() {
        bail!("llm.model must not be empty");
    }

    match config.store.backend.as_str() {
        "local" => {}
        "github" => {
            let gh = config.store.github.as_ref().ok_or_else(|| {
                anyhow::anyhow!("[store.github] must be configured when store.backend = 'github'")
            })?;
            let parts: Vec<&str> = gh.repo.split('/').collect();
            if parts.len() != 2 || parts.iter().any(|p| p.is_empty()) {
                bail!("store.github.repo must be 'owner/name', got '{}'", gh.repo);
            }
            if gh.timeout_secs == 0 {
                bail!("store.github.timeout_secs must be > 0");
            }
        }
        other => bail!(
            "Unknown store backend: '{}'. Must be local or github.",
            other
        ),
    }

    if config.bookshelf.fallback.is_empty() {
        bail!("bookshelf.fallback must not be empty");
    }
    if config.bookshelf.extension.trim().is_empty() {
        bail!("bookshelf.extension must not be empty");
    }

    Ok(())
}
