//! Runtime configuration loaded from `~/.config/embed-dl/config.toml`.
//!
//! Every field has a default, so the file is optional and may be partial:
//!
//! ```toml
//! max_redirect_depth = 3
//!
//! [endpoints]
//! sandbox = "https://piston.internal/api/v2"
//!
//! [download]
//! forbidden_cdns = ["slow-cdn.example"]
//!
//! [download.stall]
//! size_stall_secs = 45
//!
//! [browser]
//! max_attempts = 3
//! ```
//!
//! `DOWNLOADERS_CODE_RUNNER_ENDPOINT` and
//! `DOWNLOADERS_PLAYER_DEOBFUSCATOR_ENDPOINT` override the endpoints.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::download::progress::StallThresholds;
use crate::retry::RetryPolicy;
use crate::{deobfuscator, sandbox};

pub const SANDBOX_ENDPOINT_ENV: &str = "DOWNLOADERS_CODE_RUNNER_ENDPOINT";
pub const DEOBFUSCATOR_ENDPOINT_ENV: &str = "DOWNLOADERS_PLAYER_DEOBFUSCATOR_ENDPOINT";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub sandbox: String,
    pub deobfuscator: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            sandbox: sandbox::DEFAULT_ENDPOINT.to_string(),
            deobfuscator: deobfuscator::DEFAULT_ENDPOINT.to_string(),
        }
    }
}

/// External programs. Unset paths are looked up in `PATH`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tools {
    pub ytdlp: Option<PathBuf>,
    pub ffmpeg: Option<PathBuf>,
}

impl Tools {
    pub fn ytdlp(&self) -> PathBuf {
        resolve_tool(self.ytdlp.as_deref(), "yt-dlp")
    }

    pub fn ffmpeg(&self) -> PathBuf {
        resolve_tool(self.ffmpeg.as_deref(), "ffmpeg")
    }
}

fn resolve_tool(configured: Option<&Path>, name: &str) -> PathBuf {
    configured.map_or_else(
        || which::which(name).unwrap_or_else(|_| PathBuf::from(name)),
        Path::to_path_buf,
    )
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadSettings {
    /// Media hosts that are never downloaded from.
    pub forbidden_cdns: Vec<String>,
    pub stall: StallThresholds,
}

/// Headless browser limits for manifest capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    pub max_attempts: u32,
    pub attempt_timeout_secs: u64,
    pub click_timeout_secs: u64,
    pub executable: Option<PathBuf>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            attempt_timeout_secs: 30,
            click_timeout_secs: 10,
            executable: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub endpoints: Endpoints,
    pub tools: Tools,
    pub download: DownloadSettings,
    pub browser: BrowserSettings,
    pub retry: RetryPolicy,
    pub max_redirect_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoints: Endpoints::default(),
            tools: Tools::default(),
            download: DownloadSettings::default(),
            browser: BrowserSettings::default(),
            retry: RetryPolicy::default(),
            max_redirect_depth: 3,
        }
    }
}

impl Config {
    /// Load the user config file (if any) and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&config_path())?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Defaults if `path` does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("invalid TOML in {}", path.display()))
    }

    /// Apply endpoint overrides from `lookup` (normally the process env).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup(SANDBOX_ENDPOINT_ENV).filter(|v| !v.is_empty()) {
            self.endpoints.sandbox = v;
        }
        if let Some(v) = lookup(DEOBFUSCATOR_ENDPOINT_ENV).filter(|v| !v.is_empty()) {
            self.endpoints.deobfuscator = v;
        }
    }
}

/// Return the path to the config file.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("embed-dl")
        .join("config.toml")
}
