//! Configuration management for Fanout

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};

pub const DEFAULT_GRAPH_URL: &str = "https://graph.facebook.com/v19.0";
pub const DEFAULT_LINKEDIN_API_URL: &str = "https://api.linkedin.com";
pub const DEFAULT_YOUTUBE_API_URL: &str = "https://www.googleapis.com";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub publishing: PublishingConfig,
    #[serde(default)]
    pub scheduling: SchedulingConfig,
    #[serde(default)]
    pub platforms: PlatformsConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishingConfig {
    /// Upper bound on a single adapter publish call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// How many links of one post are attempted at the same time
    #[serde(default = "default_max_concurrent_links")]
    pub max_concurrent_links: usize,
}

impl Default for PublishingConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_concurrent_links: default_max_concurrent_links(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_concurrent_links() -> usize {
    8
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingConfig {
    /// Seconds between scans for due scheduled posts
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
        }
    }
}

fn default_poll_interval() -> u64 {
    60
}

/// Per-platform settings handed to adapters when the registry is built
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformsConfig {
    #[serde(default)]
    pub facebook: FacebookConfig,
    #[serde(default)]
    pub instagram: InstagramConfig,
    #[serde(default)]
    pub linkedin: LinkedInConfig,
    #[serde(default)]
    pub youtube: YouTubeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacebookConfig {
    /// Page token for business posting; takes precedence over the account token
    pub page_access_token: Option<String>,
    #[serde(default = "default_graph_url")]
    pub graph_url: String,
}

impl Default for FacebookConfig {
    fn default() -> Self {
        Self {
            page_access_token: None,
            graph_url: default_graph_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstagramConfig {
    #[serde(default)]
    pub business_id: String,
    #[serde(default = "default_graph_url")]
    pub graph_url: String,
}

impl Default for InstagramConfig {
    fn default() -> Self {
        Self {
            business_id: String::new(),
            graph_url: default_graph_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedInConfig {
    #[serde(default = "default_linkedin_api_url")]
    pub api_url: String,
}

impl Default for LinkedInConfig {
    fn default() -> Self {
        Self {
            api_url: default_linkedin_api_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YouTubeConfig {
    #[serde(default = "default_youtube_api_url")]
    pub api_url: String,
    #[serde(default = "default_youtube_api_url")]
    pub upload_url: String,
    /// HTTP timeout for video download and upload requests.
    ///
    /// The whole publish call is still bounded by `[publishing] timeout_secs`,
    /// so raise that too when posting to YouTube.
    #[serde(default = "default_upload_timeout_secs")]
    pub upload_timeout_secs: u64,
}

impl Default for YouTubeConfig {
    fn default() -> Self {
        Self {
            api_url: default_youtube_api_url(),
            upload_url: default_youtube_api_url(),
            upload_timeout_secs: default_upload_timeout_secs(),
        }
    }
}

fn default_graph_url() -> String {
    DEFAULT_GRAPH_URL.to_string()
}

fn default_linkedin_api_url() -> String {
    DEFAULT_LINKEDIN_API_URL.to_string()
}

fn default_youtube_api_url() -> String {
    DEFAULT_YOUTUBE_API_URL.to_string()
}

fn default_upload_timeout_secs() -> u64 {
    600
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Owner recorded on posts and accounts created from the CLI
    #[serde(default = "default_user")]
    pub user: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            user: default_user(),
        }
    }
}

fn default_user() -> String {
    "local".to_string()
}

impl Config {
    /// Load configuration from the default location
    ///
    /// A missing config file is not an error; the built-in defaults apply.
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        if !config_path.exists() {
            tracing::debug!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default_config());
        }
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            database: DatabaseConfig {
                path: "~/.local/share/fanout/fanout.db".to_string(),
            },
            publishing: PublishingConfig::default(),
            scheduling: SchedulingConfig::default(),
            platforms: PlatformsConfig::default(),
            defaults: DefaultsConfig::default(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.database.path.trim().is_empty() {
            return Err(ConfigError::MissingField("database.path".to_string()).into());
        }
        if self.publishing.timeout_secs == 0 {
            return Err(
                ConfigError::MissingField("publishing.timeout_secs must be > 0".to_string()).into(),
            );
        }
        if self.publishing.max_concurrent_links == 0 {
            return Err(ConfigError::MissingField(
                "publishing.max_concurrent_links must be > 0".to_string(),
            )
            .into());
        }
        if self.platforms.youtube.upload_timeout_secs == 0 {
            return Err(ConfigError::MissingField(
                "platforms.youtube.upload_timeout_secs must be > 0".to_string(),
            )
            .into());
        }
        Ok(())
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("FANOUT_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("fanout").join("config.toml"))
}

/// Resolve the database path
///
/// `FANOUT_DB_PATH` wins over the configured path. `":memory:"` is passed
/// through untouched.
pub fn resolve_db_path(configured: Option<&str>) -> Result<String> {
    if let Ok(path) = std::env::var("FANOUT_DB_PATH") {
        return Ok(expand(&path));
    }

    match configured {
        Some(path) => Ok(expand(path)),
        None => {
            let data_dir = dirs::data_dir()
                .ok_or_else(|| ConfigError::MissingField("data directory".to_string()))?;
            Ok(data_dir
                .join("fanout")
                .join("fanout.db")
                .to_string_lossy()
                .to_string())
        }
    }
}

fn expand(path: &str) -> String {
    if path == ":memory:" {
        return path.to_string();
    }
    shellexpand::tilde(path).to_string()
}
