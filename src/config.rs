use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::chunk::DEFAULT_CHUNK_CHARS;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_CHUNK_CHARS,
        }
    }
}

fn default_max_chars() -> usize {
    DEFAULT_CHUNK_CHARS
}

/// Hosted chat-completion endpoint settings.
///
/// Requests go to
/// `{endpoint}/openai/deployments/{deployment}/chat/completions?api-version={api_version}`
/// with the key from the `api_key_env` environment variable in an `api-key` header.
#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default)]
    pub endpoint: String,
    #[serde(default = "default_deployment")]
    pub deployment: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_extraction_temperature")]
    pub extraction_temperature: f32,
    #[serde(default = "default_requirements_temperature")]
    pub requirements_temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            deployment: default_deployment(),
            api_version: default_api_version(),
            api_key_env: default_api_key_env(),
            max_tokens: default_max_tokens(),
            extraction_temperature: default_extraction_temperature(),
            requirements_temperature: default_requirements_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_deployment() -> String {
    "gpt-4o".to_string()
}
fn default_api_version() -> String {
    "2025-01-01-preview".to_string()
}
fn default_api_key_env() -> String {
    "AZURE_OPENAI_API_KEY".to_string()
}
fn default_max_tokens() -> u32 {
    4000
}
fn default_extraction_temperature() -> f32 {
    0.3
}
fn default_requirements_temperature() -> f32 {
    0.7
}
fn default_timeout_secs() -> u64 {
    120
}

impl LlmConfig {
    pub fn is_configured(&self) -> bool {
        !self.endpoint.trim().is_empty()
    }

    pub fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions",
            self.endpoint.trim_end_matches('/'),
            self.deployment
        )
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Root directory of the object store.
    pub root: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Refresh interval for `mact watch`.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7340".to_string()
}
fn default_poll_interval_secs() -> u64 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` overrides it.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.chunking.max_chars == 0 {
        anyhow::bail!("chunking.max_chars must be > 0");
    }

    if !(0.0..=2.0).contains(&config.llm.extraction_temperature) {
        anyhow::bail!("llm.extraction_temperature must be in [0.0, 2.0]");
    }
    if !(0.0..=2.0).contains(&config.llm.requirements_temperature) {
        anyhow::bail!("llm.requirements_temperature must be in [0.0, 2.0]");
    }
    if config.llm.max_tokens == 0 {
        anyhow::bail!("llm.max_tokens must be > 0");
    }
    if config.llm.is_configured()
        && !(config.llm.endpoint.starts_with("http://")
            || config.llm.endpoint.starts_with("https://"))
    {
        anyhow::bail!(
            "llm.endpoint must be an http(s) URL, got '{}'",
            config.llm.endpoint
        );
    }

    if config.server.poll_interval_secs == 0 {
        anyhow::bail!("server.poll_interval_secs must be >= 1");
    }

    Ok(())
}
