use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::retry::RetryPolicy;
use crate::scheduler::PollSettings;
use crate::timeline::EndBehavior;

/// Backoff for failed status checks and artifact saves (`[retry]` in config.toml).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Base delay in milliseconds; doubled per failed attempt.
    pub base_delay_ms: u64,
    /// Maximum backoff delay in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms.max(self.base_delay_ms)),
        }
    }
}

/// Global configuration loaded from `~/.config/reel/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReelConfig {
    /// Base URL of the rendering service.
    pub renderer_url: String,
    /// Delay between status checks in milliseconds.
    pub poll_interval_ms: u64,
    /// Give up polling after this many seconds; 0 = poll until terminal.
    pub max_poll_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
    /// What preview playback does on reaching the end: "stop", "loop" or "hold".
    #[serde(default)]
    pub end_of_timeline: EndBehavior,
    /// Where saved artifacts land. None = XDG download dir, else current dir.
    #[serde(default)]
    pub download_dir: Option<PathBuf>,
}

impl Default for ReelConfig {
    fn default() -> Self {
        Self {
            renderer_url: "http://localhost:8000".to_string(),
            poll_interval_ms: 2_000,
            max_poll_secs: 900,
            retry: RetryConfig::default(),
            end_of_timeline: EndBehavior::default(),
            download_dir: None,
        }
    }
}

impl ReelConfig {
    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            retry: self.retry.policy(),
            max_duration: (self.max_poll_secs > 0).then(|| Duration::from_secs(self.max_poll_secs)),
        }
    }

    /// Directory for saved artifacts.
    pub fn download_dir(&self) -> PathBuf {
        if let Some(dir) = &self.download_dir {
            return dir.clone();
        }
        std::env::var_os("XDG_DOWNLOAD_DIR")
            .map(PathBuf::from)
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    fn validate(&self) -> Result<()> {
        if self.renderer_url.trim().is_empty() {
            bail!("renderer_url must not be empty");
        }
        if self.poll_interval_ms == 0 {
            bail!("poll_interval_ms must be positive");
        }
        Ok(())
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("reel")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<ReelConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = ReelConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: ReelConfig = toml::from_str(&data)?;
    cfg.validate()?;
    Ok(cfg)
}
