use std::path::{Path, PathBuf};
use std::time::Duration;

use color_eyre::{
    Result,
    eyre::{Context, eyre},
};
use serde::{Deserialize, Serialize};

use crate::services::fetch::FetchOptions;
use crate::soulseek::client::SessionConfig;
use crate::soulseek::types::PreferredFormat;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub download_directory: String,
    /// Sort downloads into `{artist}/{album}` folders.
    pub organize: bool,
    pub preferred_format: PreferredFormat,
    pub soulseek: SoulseekConfig,
    pub fetch: FetchConfig,
    pub lastfm: LastFmConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoulseekConfig {
    pub username: String,
    pub password: String,
    pub searches_per_time: u32,
    pub renew_time_secs: u64,
    pub remove_special_chars: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub max_track_attempts: usize,
    pub max_album_attempts: usize,
    /// Durations are humantime strings, e.g. "2s" or "1m 30s".
    pub retry_backoff: String,
    pub search_timeout: String,
    pub album_search_timeout: String,
    pub overwrite_existing: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LastFmConfig {
    pub api_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            download_directory: "~/Music".to_string(),
            organize: false,
            preferred_format: PreferredFormat::Any,
            soulseek: SoulseekConfig::default(),
            fetch: FetchConfig::default(),
            lastfm: LastFmConfig::default(),
        }
    }
}

impl Default for SoulseekConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            searches_per_time: 34,
            renew_time_secs: 220,
            remove_special_chars: false,
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_track_attempts: 3,
            max_album_attempts: 3,
            retry_backoff: "2s".to_string(),
            search_timeout: "10s".to_string(),
            album_search_timeout: "15s".to_string(),
            overwrite_existing: false,
        }
    }
}

fn parse_duration(field: &str, value: &str) -> Result<Duration> {
    humantime::parse_duration(value)
        .with_context(|| format!("Invalid duration for `{}`: '{}'", field, value))
}

/// Expand a leading `~/` to the home directory
fn expand_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Load config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|path| path.join("music-fetcher").join("config.toml"))
    }

    /// Load the default config file, or built-in defaults if there is none
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            Some(path) => {
                log::debug!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    /// Write a default config to `path` unless one already exists
    pub fn create_default_at(path: &Path) -> Result<bool> {
        if path.exists() {
            log::info!("Config already exists at {}", path.display());
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let contents =
            toml::to_string_pretty(&Self::default()).wrap_err("Failed to serialize config")?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(true)
    }

    pub fn create_default() -> Result<PathBuf> {
        let path = Self::config_path().ok_or_else(|| eyre!("No config directory on this system"))?;
        Self::create_default_at(&path)?;
        Ok(path)
    }

    pub fn download_directory_path(&self) -> PathBuf {
        expand_path(&self.download_directory)
    }

    /// Credentials come from the file, falling back to `SOULSEEK_USERNAME`
    /// and `SOULSEEK_PASSWORD`.
    pub fn session_config(&self) -> Result<SessionConfig> {
        let username = Some(self.soulseek.username.clone())
            .filter(|u| !u.trim().is_empty())
            .or_else(|| non_empty_env("SOULSEEK_USERNAME"))
            .ok_or_else(|| eyre!("No SoulSeek username configured"))?;
        let password = Some(self.soulseek.password.clone())
            .filter(|p| !p.is_empty())
            .or_else(|| non_empty_env("SOULSEEK_PASSWORD"))
            .ok_or_else(|| eyre!("No SoulSeek password configured"))?;

        Ok(SessionConfig {
            username,
            password,
            searches_per_time: self.soulseek.searches_per_time,
            renew_time: Duration::from_secs(self.soulseek.renew_time_secs),
        })
    }

    pub fn fetch_options(&self) -> Result<FetchOptions> {
        Ok(FetchOptions {
            max_track_attempts: self.fetch.max_track_attempts.max(1),
            max_album_attempts: self.fetch.max_album_attempts.max(1),
            retry_backoff: parse_duration("fetch.retry_backoff", &self.fetch.retry_backoff)?,
            search_timeout: parse_duration("fetch.search_timeout", &self.fetch.search_timeout)?,
            album_search_timeout: parse_duration(
                "fetch.album_search_timeout",
                &self.fetch.album_search_timeout,
            )?,
            overwrite_existing: self.fetch.overwrite_existing,
            remove_special_chars: self.soulseek.remove_special_chars,
        })
    }

    /// From the file, falling back to `LASTFM_API_KEY`
    pub fn lastfm_api_key(&self) -> Option<String> {
        self.lastfm
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| non_empty_env("LASTFM_API_KEY"))
    }
}
