//! Bot configuration, loaded from `config.yaml`.
//!
//! Every recognized option is an explicit field with a default; unknown keys
//! are rejected at load time. API credentials are not configuration; they
//! come from the environment via the CLI and are validated where the clients
//! are constructed.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_norway::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub site: SiteConfig,
    pub generator: GeneratorConfig,
    pub poster: PosterConfig,
    pub monitor: MonitorConfig,
    pub rate_limits: RateLimits,
    pub state: StateConfig,
    /// Optional catalog override (same JSON shape as the embedded catalog).
    pub catalog_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Base URL the calculator links point at.
    pub url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self { url: "https://boring-math.com".to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorConfig {
    /// LLM provider. Only "openai" (OpenAI-compatible chat completions).
    pub provider: String,
    pub model: String,
    pub style: StyleConfig,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            style: StyleConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StyleConfig {
    pub tone: String,
    pub include_emoji: bool,
    pub max_hashtags: usize,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            tone: "helpful and slightly witty".to_string(),
            include_emoji: true,
            max_hashtags: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PosterConfig {
    /// Minimum spacing between any two posts, in hours.
    pub min_hours_between_posts: f64,
    /// Local times ("HH:MM") the run loop posts at.
    pub schedule: Vec<String>,
    /// Allowed posting weekdays, 0 = Monday .. 6 = Sunday.
    pub days: Vec<u8>,
}

impl Default for PosterConfig {
    fn default() -> Self {
        Self {
            min_hours_between_posts: 4.0,
            schedule: vec!["09:00".to_string(), "14:00".to_string(), "19:00".to_string()],
            days: vec![0, 1, 2, 3, 4],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MonitorConfig {
    /// Keywords to search. Empty means every catalog keyword.
    pub keywords: Vec<String>,
    pub min_likes: u64,
    pub min_retweets: u64,
    pub min_follower_count: u64,
    /// Author handles to never engage with.
    pub blacklist: Vec<String>,
    /// Minutes between monitor runs in the scheduling loop.
    pub check_interval: u64,
    /// Search results considered per keyword.
    pub max_per_keyword: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            keywords: Vec::new(),
            min_likes: 0,
            min_retweets: 0,
            min_follower_count: 10,
            blacklist: Vec::new(),
            check_interval: 15,
            max_per_keyword: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RateLimits {
    pub max_posts_per_day: u32,
    pub max_searches_per_15min: u32,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self { max_posts_per_day: 10, max_searches_per_15min: 15 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StateConfig {
    pub backend: StateBackend,
    /// Data directory. Defaults to the platform data dir under `xbot/`.
    pub dir: Option<PathBuf>,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self { backend: StateBackend::File, dir: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateBackend {
    File,
    Sqlite,
}

impl Config {
    /// Load and validate a config file. Missing file is fatal; the caller
    /// should point the user at an example config rather than guess.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let raw = std::fs::read_to_string(path)?;
        let config: Config = serde_norway::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.poster.min_hours_between_posts < 0.0 {
            return Err(ConfigError::Invalid(
                "poster.min_hours_between_posts must be non-negative".to_string(),
            ));
        }
        if let Some(day) = self.poster.days.iter().find(|d| **d > 6) {
            return Err(ConfigError::Invalid(format!(
                "poster.days entries must be 0-6 (Monday-Sunday), got {day}"
            )));
        }
        for slot in &self.poster.schedule {
            if chrono::NaiveTime::parse_from_str(slot, "%H:%M").is_err() {
                return Err(ConfigError::Invalid(format!(
                    "poster.schedule entry {slot:?} is not HH:MM"
                )));
            }
        }
        if self.rate_limits.max_posts_per_day == 0 {
            return Err(ConfigError::Invalid(
                "rate_limits.max_posts_per_day must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolved state directory.
    pub fn state_dir(&self) -> PathBuf {
        self.state.dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("xbot")
        })
    }
}
