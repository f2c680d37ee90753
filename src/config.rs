use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use photodesk_core::caption::CaptionConfig;
use photodesk_core::scoring::RankingConfig;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub caption: CaptionConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub watcher: WatcherConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_per_provider_limit")]
    pub per_provider_limit: usize,
    #[serde(default = "default_top")]
    pub top: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            per_provider_limit: default_per_provider_limit(),
            top: default_top(),
        }
    }
}

fn default_per_provider_limit() -> usize {
    8
}
fn default_top() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.openai.com".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_output_tokens() -> u32 {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct WatcherConfig {
    #[serde(default = "default_downloads_dir")]
    pub downloads_dir: PathBuf,
    #[serde(default = "default_pending_path")]
    pub pending_path: PathBuf,
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
    #[serde(default = "default_poll_secs")]
    pub poll_secs: f64,
    #[serde(default = "default_max_file_age_hours")]
    pub max_file_age_hours: u64,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            downloads_dir: default_downloads_dir(),
            pending_path: default_pending_path(),
            state_path: default_state_path(),
            poll_secs: default_poll_secs(),
            max_file_age_hours: default_max_file_age_hours(),
            extensions: default_extensions(),
        }
    }
}

/// Lower bound for the poll interval.
pub const MIN_POLL_SECS: f64 = 0.5;

impl WatcherConfig {
    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.poll_secs.max(MIN_POLL_SECS))
    }
}

fn default_downloads_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join("Downloads")))
        .unwrap_or_else(|| PathBuf::from("Downloads"))
}
fn default_pending_path() -> PathBuf {
    PathBuf::from("pending_downloads.json")
}
fn default_state_path() -> PathBuf {
    PathBuf::from("captioner_state.json")
}
fn default_poll_secs() -> f64 {
    2.0
}
fn default_max_file_age_hours() -> u64 {
    6
}
fn default_extensions() -> Vec<String> {
    vec!["jpg".to_string(), "jpeg".to_string(), "png".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_api_token_env")]
    pub api_token_env: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            api_token_env: default_api_token_env(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:5051".to_string()
}
fn default_api_token_env() -> String {
    "REWRITE_API_TOKEN".to_string()
}

/// Load configuration from `path`, or built-in defaults when `path` is `None`.
pub fn load_or_default(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(p) => load_config(p),
        None => Ok(Config::default()),
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.search.per_provider_limit == 0 {
        anyhow::bail!("search.per_provider_limit must be > 0");
    }

    if config.caption.max_words == 0 {
        anyhow::bail!("caption.max_words must be > 0");
    }

    if !(0.0..=1.0).contains(&config.ranking.min_overlap_ratio) {
        anyhow::bail!("ranking.min_overlap_ratio must be in [0.0, 1.0]");
    }

    if config.ranking.freshness_half_life_days == 0 {
        anyhow::bail!("ranking.freshness_half_life_days must be > 0");
    }

    if config.watcher.extensions.is_empty() {
        anyhow::bail!("watcher.extensions must list at least one extension");
    }

    Ok(())
}
