use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::auth::Token;
use crate::engine::{EngineSettings, RetryConfig};
use crate::error::SweeperError;

/// Configuration file structure for pipeline-sweeper.
///
/// Every value can also be given on the command line or through the
/// environment; those take precedence over the file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub gitlab: GitLabConfig,

    #[serde(default)]
    pub webhook: WebhookConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GitLabConfig {
    /// GitLab access token with `api` scope
    pub token: Option<String>,

    /// GitLab instance base URL
    #[serde(default = "default_gitlab_base_url")]
    pub base_url: String,

    /// Project path (e.g., 'group/project') or numeric id
    pub project: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WebhookConfig {
    /// Shared secret GitLab sends in `X-Gitlab-Token`
    pub secret: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EngineConfig {
    /// Seconds to wait after an event before listing pipelines
    #[serde(default = "default_grace_delay_secs")]
    pub grace_delay_secs: u64,

    #[serde(default = "default_cancel_attempts")]
    pub cancel_attempts: u32,

    #[serde(default = "default_cancel_initial_delay_secs")]
    pub cancel_initial_delay_secs: u64,

    /// Attempts for the whole pipeline listing; 1 disables fetch retries
    #[serde(default = "default_fetch_attempts")]
    pub fetch_attempts: u32,

    #[serde(default = "default_fetch_initial_delay_secs")]
    pub fetch_initial_delay_secs: u64,

    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Events fetching and cancelling at the same time
    #[serde(default = "default_max_concurrent_events")]
    pub max_concurrent_events: usize,

    /// Accepted events not yet finished, including those in their grace delay
    #[serde(default = "default_max_pending_events")]
    pub max_pending_events: usize,
}

impl Default for GitLabConfig {
    fn default() -> Self {
        Self {
            token: None,
            base_url: default_gitlab_base_url(),
            project: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            grace_delay_secs: default_grace_delay_secs(),
            cancel_attempts: default_cancel_attempts(),
            cancel_initial_delay_secs: default_cancel_initial_delay_secs(),
            fetch_attempts: default_fetch_attempts(),
            fetch_initial_delay_secs: default_fetch_initial_delay_secs(),
            page_size: default_page_size(),
            max_concurrent_events: default_max_concurrent_events(),
            max_pending_events: default_max_pending_events(),
        }
    }
}

fn default_gitlab_base_url() -> String {
    "https://gitlab.com".to_string()
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 5001))
}

fn default_grace_delay_secs() -> u64 {
    80
}

fn default_cancel_attempts() -> u32 {
    3
}

fn default_cancel_initial_delay_secs() -> u64 {
    4
}

fn default_fetch_attempts() -> u32 {
    1
}

fn default_fetch_initial_delay_secs() -> u64 {
    4
}

fn default_page_size() -> u32 {
    100
}

fn default_max_concurrent_events() -> usize {
    64
}

fn default_max_pending_events() -> usize {
    4096
}

/// Loads `KEY=value` pairs from `dir/.env` into the process environment.
///
/// Variables that are already set keep their values. Returns the file that
/// was loaded, or `None` when there is no `.env` in `dir`.
pub fn load_dotenv(dir: &Path) -> Result<Option<PathBuf>> {
    let path = dir.join(".env");

    match dotenvy::from_path(&path) {
        Ok(()) => Ok(Some(path)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to load {}", path.display())),
    }
}

/// Values supplied on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub token: Option<String>,
    pub base_url: Option<String>,
    pub project: Option<String>,
    pub webhook_secret: Option<String>,
    pub listen: Option<SocketAddr>,
    pub grace_delay_secs: Option<u64>,
    pub max_concurrent_events: Option<usize>,
    pub max_pending_events: Option<usize>,
}

/// Connection settings that passed validation.
#[derive(Debug, Clone)]
pub struct GitLabSettings {
    pub base_url: String,
    pub token: Token,
    pub project: String,
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./pipeline-sweeper.toml
    /// 3. ./pipeline-sweeper.json
    /// 4. ./pipeline-sweeper.yaml
    /// 5. ./pipeline-sweeper.yml
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        let candidates = [
            "pipeline-sweeper.toml",
            "pipeline-sweeper.json",
            "pipeline-sweeper.yaml",
            "pipeline-sweeper.yml",
        ];

        for candidate in &candidates {
            let path = Path::new(candidate);
            if path.exists() {
                return Self::load_from_path(path);
            }
        }

        Ok(Self::default())
    }

    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => toml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| serde_yaml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display())),
        }
    }

    /// Applies command line and environment values on top of the file.
    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        if let Some(token) = overrides.token {
            self.gitlab.token = Some(token);
        }
        if let Some(base_url) = overrides.base_url {
            self.gitlab.base_url = base_url;
        }
        if let Some(project) = overrides.project {
            self.gitlab.project = Some(project);
        }
        if let Some(secret) = overrides.webhook_secret {
            self.webhook.secret = Some(secret);
        }
        if let Some(listen) = overrides.listen {
            self.server.listen = listen;
        }
        if let Some(grace) = overrides.grace_delay_secs {
            self.engine.grace_delay_secs = grace;
        }
        if let Some(max) = overrides.max_concurrent_events {
            self.engine.max_concurrent_events = max;
        }
        if let Some(max) = overrides.max_pending_events {
            self.engine.max_pending_events = max;
        }
        self
    }

    /// Returns the GitLab connection settings, failing on missing values.
    pub fn gitlab_settings(&self) -> crate::error::Result<GitLabSettings> {
        let token = required(self.gitlab.token.as_deref(), "GitLab API token")?;
        let project = required(self.gitlab.project.as_deref(), "GitLab project")?;
        let base_url = required(Some(self.gitlab.base_url.as_str()), "GitLab URL")?;

        Ok(GitLabSettings {
            base_url: base_url.to_string(),
            token: Token::from(token),
            project: project.to_string(),
        })
    }

    /// Returns the webhook shared secret, failing when it is missing.
    pub fn webhook_secret(&self) -> crate::error::Result<Token> {
        required(self.webhook.secret.as_deref(), "webhook secret").map(Token::from)
    }

    /// Converts the engine section, rejecting zero counts.
    pub fn engine_settings(&self) -> crate::error::Result<EngineSettings> {
        let engine = &self.engine;

        if engine.cancel_attempts == 0 || engine.fetch_attempts == 0 {
            return Err(SweeperError::Config(
                "attempt counts must be at least 1".to_string(),
            ));
        }
        if engine.page_size == 0 || engine.page_size > 100 {
            return Err(SweeperError::Config(format!(
                "page size must be between 1 and 100, got {}",
                engine.page_size
            )));
        }
        if engine.max_concurrent_events == 0 || engine.max_pending_events == 0 {
            return Err(SweeperError::Config(
                "event limits must be at least 1".to_string(),
            ));
        }

        Ok(EngineSettings {
            grace_delay: Duration::from_secs(engine.grace_delay_secs),
            cancel_retry: RetryConfig::new(
                engine.cancel_attempts,
                Duration::from_secs(engine.cancel_initial_delay_secs),
            ),
            fetch_retry: RetryConfig::new(
                engine.fetch_attempts,
                Duration::from_secs(engine.fetch_initial_delay_secs),
            ),
            page_size: engine.page_size,
            max_concurrent_events: engine.max_concurrent_events,
            max_pending_events: engine.max_pending_events,
        })
    }
}

fn required<'a>(value: Option<&'a str>, name: &str) -> crate::error::Result<&'a str> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| SweeperError::Config(format!("missing required {name}")))
}
