//! Coach configuration stored at `.coach/config.toml`.

use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::io::history_store::HISTORY_KEY;
use crate::io::storage::is_valid_key;

/// Environment variable overriding `service.base_url`.
pub const BASE_URL_ENV: &str = "COACH_API_BASE_URL";

/// Coach configuration (TOML).
///
/// Missing fields default to values that work against a local service.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CoachConfig {
    pub service: ServiceConfig,
    pub history: HistoryConfig,
    pub clipboard: ClipboardConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServiceConfig {
    /// Scheme, host, and port of the improvement service.
    pub base_url: String,
    /// Path of the improvement endpoint, joined onto `base_url`.
    pub endpoint_path: String,
    /// Total wall-clock budget for one improvement call.
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HistoryConfig {
    /// Storage key the serialized history lives under.
    pub storage_key: String,
    /// Storage capacity; writes past it fail and are logged.
    pub capacity_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClipboardConfig {
    /// Command that reads the text to copy from stdin (e.g. `["pbcopy"]`).
    pub command: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            endpoint_path: "/api/improve-feedback".to_string(),
            timeout_secs: 60,
            connect_timeout_secs: 10,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            storage_key: HISTORY_KEY.to_string(),
            capacity_bytes: 5 * 1024 * 1024,
        }
    }
}

impl Default for ClipboardConfig {
    fn default() -> Self {
        Self {
            command: vec![
                "xclip".to_string(),
                "-selection".to_string(),
                "clipboard".to_string(),
            ],
            timeout_secs: 5,
        }
    }
}

impl ServiceConfig {
    /// Full URL of the improvement endpoint.
    pub fn endpoint_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.endpoint_path.trim_start_matches('/')
        )
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl ClipboardConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl CoachConfig {
    pub fn validate(&self) -> Result<()> {
        let base_url = self.service.base_url.trim();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(anyhow!(
                "service.base_url must start with http:// or https:// (got '{}')",
                self.service.base_url
            ));
        }
        if self.service.timeout_secs == 0 {
            return Err(anyhow!("service.timeout_secs must be > 0"));
        }
        if self.service.connect_timeout_secs == 0 {
            return Err(anyhow!("service.connect_timeout_secs must be > 0"));
        }
        if !is_valid_key(&self.history.storage_key) {
            return Err(anyhow!(
                "history.storage_key may only use ASCII letters, digits, '-' and '_' (got '{}')",
                self.history.storage_key
            ));
        }
        if self.history.capacity_bytes == 0 {
            return Err(anyhow!("history.capacity_bytes must be > 0"));
        }
        if self.clipboard.command.is_empty() || self.clipboard.command[0].trim().is_empty() {
            return Err(anyhow!("clipboard.command must be a non-empty array"));
        }
        if self.clipboard.timeout_secs == 0 {
            return Err(anyhow!("clipboard.timeout_secs must be > 0"));
        }
        Ok(())
    }

    /// Apply a base URL override when one is given and non-blank.
    pub fn apply_base_url_override(&mut self, value: Option<String>) {
        if let Some(url) = value
            && !url.trim().is_empty()
        {
            debug!(base_url = %url, "overriding service base url");
            self.service.base_url = url.trim().to_string();
        }
    }

    /// Apply overrides from the process environment ([`BASE_URL_ENV`]).
    pub fn with_env_overrides(mut self) -> Result<Self> {
        self.apply_base_url_override(env::var(BASE_URL_ENV).ok());
        self.validate()?;
        Ok(self)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `CoachConfig::default()`.
pub fn load_config(path: &Path) -> Result<CoachConfig> {
    if !path.exists() {
        let cfg = CoachConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: CoachConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &CoachConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
