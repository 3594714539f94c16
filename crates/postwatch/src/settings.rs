//! Client configuration.
//!
//! Sources, lowest priority first: built-in defaults, the TOML config file,
//! then `POSTWATCH__*` environment variables (`__` separates nesting, e.g.
//! `POSTWATCH__SERVER__BASE_URL`).

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::session::SessionConfig;

pub const APP_NAME: &str = "postwatch";

const DEFAULT_BASE_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub session: SessionSettings,
    pub logging: LoggingConfig,
}

/// Backend location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL for the HTTP endpoints.
    pub base_url: String,
    /// Explicit streaming endpoint. Derived from `base_url` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ws_url: Option<String>,
    /// Path appended to the derived streaming endpoint.
    pub ws_path: String,
    /// Timeout for the one-shot process/list calls.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            ws_url: None,
            ws_path: postwatch_protocol::STREAM_PATH.to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Live-session timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Wait this long for the channel to open before dispatching the
    /// request. 0 dispatches immediately.
    pub open_timeout_ms: u64,
    /// Force teardown if the prediction has not settled by then. 0 disables.
    pub response_timeout_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            open_timeout_ms: 3_000,
            response_timeout_secs: 600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl AppConfig {
    /// Replace the base URL, e.g. from `--server`.
    pub fn with_server_override(mut self, server: Option<String>) -> Self {
        if let Some(server) = server {
            self.server.base_url = server;
        }
        self
    }

    pub fn base_url(&self) -> &str {
        self.server.base_url.trim_end_matches('/')
    }

    /// Streaming endpoint: `ws_url` if set, otherwise `base_url` with its
    /// scheme switched to ws/wss and `ws_path` appended.
    pub fn stream_endpoint(&self) -> String {
        if let Some(url) = &self.server.ws_url {
            return url.clone();
        }
        let base = self.base_url();
        let base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            base.to_string()
        };
        let path = &self.server.ws_path;
        if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    pub fn session_config(&self) -> SessionConfig {
        let response_timeout = match self.session.response_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        SessionConfig {
            endpoint: self.stream_endpoint(),
            open_timeout: Duration::from_millis(self.session.open_timeout_ms),
            response_timeout,
        }
    }
}

/// Load the effective configuration. A missing file is not an error.
pub fn load_config(path: &Path) -> Result<AppConfig> {
    load_with_env(path, None)
}

fn load_with_env(path: &Path, env_source: Option<HashMap<String, String>>) -> Result<AppConfig> {
    let defaults = AppConfig::default();
    let built = Config::builder()
        .set_default("server.base_url", defaults.server.base_url)?
        .set_default("server.ws_path", defaults.server.ws_path)?
        .set_default(
            "server.request_timeout_secs",
            defaults.server.request_timeout_secs as i64,
        )?
        .set_default(
            "session.open_timeout_ms",
            defaults.session.open_timeout_ms as i64,
        )?
        .set_default(
            "session.response_timeout_secs",
            defaults.session.response_timeout_secs as i64,
        )?
        .set_default("logging.level", defaults.logging.level)?
        .set_default("logging.format", "text")?
        .add_source(File::from(path).format(FileFormat::Toml).required(false))
        .add_source(
            Environment::with_prefix(&env_prefix())
                .separator("__")
                .source(env_source),
        )
        .build()
        .with_context(|| format!("loading config from {}", path.display()))?;

    built
        .try_deserialize()
        .with_context(|| format!("parsing config from {}", path.display()))
}

/// Write the default configuration to `path`.
pub fn write_default_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "config file {} already exists (use --force to overwrite)",
            path.display()
        );
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating config directory {}", parent.display()))?;
    }

    let toml = toml::to_string_pretty(&AppConfig::default())
        .context("serializing default config to TOML")?;
    let mut body = String::new();
    body.push_str("# Configuration for ");
    body.push_str(APP_NAME);
    body.push('\n');
    body.push_str("# File: ");
    body.push_str(&path.display().to_string());
    body.push_str("\n\n");
    body.push_str(&toml);
    fs::write(path, body).with_context(|| format!("writing config file to {}", path.display()))
}

/// Config file path: the explicit override (shell-expanded) or the default
/// location under the user's config directory.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => expand_path(path),
        None => Ok(default_config_dir()?.join("config.toml")),
    }
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    match path.to_str() {
        Some(text) => {
            let expanded = shellexpand::full(text).context("expanding path")?;
            Ok(PathBuf::from(expanded.to_string()))
        }
        None => Ok(path.to_path_buf()),
    }
}

fn default_config_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir).join(APP_NAME));
    }

    if let Some(dir) = dirs::config_dir() {
        return Ok(dir.join(APP_NAME));
    }

    dirs::home_dir()
        .map(|home| home.join(".config").join(APP_NAME))
        .ok_or_else(|| anyhow!("unable to determine configuration directory"))
}

fn env_prefix() -> String {
    APP_NAME.to_ascii_uppercase()
}
