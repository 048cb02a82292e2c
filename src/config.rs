//! Configuration management.
//!
//! A config file is optional. When present it is found with `prefer`
//! (`lexacquire.toml`, `.yaml` or `.json` in the usual config locations) or
//! named with `--config`, and its values are laid over [`Settings`] defaults.
//! Environment variables win over both.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scrapers::{BrowserEngineConfig, RetryPolicy, RunSettings, SiteConfig};

/// Directory under the documents folder holding every country's downloads.
const DATA_SUBDIR: &str = "lexacquire";

/// Metadata file written next to a country's downloads.
pub const METADATA_FILENAME: &str = "metadata.json";

/// Configuration failures; these end the process with a non-zero status.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {format} config {path}: {message}")]
    Parse {
        path: PathBuf,
        format: &'static str,
        message: String,
    },
    #[error("driver {name} conflicts with a built-in driver")]
    ShadowedDriver { name: String },
    #[error("invalid link_pattern for driver {name}: {source}")]
    InvalidPattern {
        name: String,
        #[source]
        source: regex::Error,
    },
}

/// Resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Root under which every country gets its own directory.
    pub download_root: PathBuf,
    /// Request timeout in seconds.
    pub request_timeout: u64,
    /// Attempts per URL before it is skipped.
    pub max_attempts: u32,
    /// Delay after the first failed attempt, in milliseconds.
    pub retry_delay_ms: u64,
    /// Delay between requests to the same host, in milliseconds.
    pub request_delay_ms: u64,
    /// `None` = crate user agent, `"impersonate"` = browser user agent, else custom.
    pub user_agent: Option<String>,
    pub workers: usize,
    /// Serialize the ledger after every listing section.
    pub checkpoint: bool,
    pub browser: BrowserEngineConfig,
    /// wkhtmltopdf binary; looked up on PATH when unset.
    pub renderer_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        let download_root = dirs::document_dir()
            .map(|dir| dir.join(DATA_SUBDIR))
            .unwrap_or_else(|| PathBuf::from("./lexacquire-data"));

        Self {
            download_root,
            request_timeout: 10,
            max_attempts: 9,
            retry_delay_ms: 1000,
            request_delay_ms: 500,
            user_agent: None,
            workers: 1,
            checkpoint: false,
            browser: BrowserEngineConfig::default(),
            renderer_path: None,
        }
    }
}

impl Settings {
    /// Directory holding one country's downloads and metadata.
    pub fn country_dir(&self, country: &str) -> PathBuf {
        self.download_root.join(country)
    }

    /// Default metadata path for a country.
    pub fn metadata_path(&self, country: &str) -> PathBuf {
        self.country_dir(country).join(METADATA_FILENAME)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }

    /// Run settings for one driver.
    pub fn run_settings(&self, country: &str) -> RunSettings {
        RunSettings {
            workers: self.workers.max(1),
            checkpoint: self.checkpoint,
            ..RunSettings::new(self.metadata_path(country))
        }
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Download root; relative paths resolve against the config file.
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "target")]
    pub download_root: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser: Option<BrowserEngineConfig>,
    #[serde(default, skip_serializing_if = "RendererConfig::is_default")]
    pub renderer: RendererConfig,
    /// Sites described entirely in the config file.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub drivers: HashMap<String, SiteConfig>,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

/// `[renderer]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RendererConfig {
    /// Path to the wkhtmltopdf binary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl RendererConfig {
    pub fn is_default(&self) -> bool {
        self == &Self::default()
    }
}

impl Config {
    /// Discover a config file with `prefer`; defaults when none exists.
    pub async fn load() -> Result<Self, ConfigError> {
        match prefer::load("lexacquire").await {
            Ok(found) => match found.source_path() {
                Some(path) => Self::load_from_path(path).await,
                None => Ok(Self::default()),
            },
            Err(e) => {
                tracing::debug!("No config file discovered: {}", e);
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from a specific file, parsed by its extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
        let mut config = Self::parse(path, &contents)?;
        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    fn parse(path: &Path, contents: &str) -> Result<Self, ConfigError> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
        let parse_error = |format: &'static str, message: String| ConfigError::Parse {
            path: path.to_path_buf(),
            format,
            message,
        };
        match ext {
            "json" => {
                serde_json::from_str(contents).map_err(|e| parse_error("JSON", e.to_string()))
            }
            "yaml" | "yml" => {
                serde_yaml::from_str(contents).map_err(|e| parse_error("YAML", e.to_string()))
            }
            _ => toml::from_str(contents).map_err(|e| parse_error("TOML", e.to_string())),
        }
    }

    /// Directory relative paths in this config resolve against.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Expand `~` and resolve relative paths against `base_dir`.
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Lay this config over `settings`.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref root) = self.download_root {
            settings.download_root = self.resolve_path(root, base_dir);
        }
        if let Some(timeout) = self.request_timeout {
            settings.request_timeout = timeout;
        }
        if let Some(attempts) = self.max_attempts {
            settings.max_attempts = attempts;
        }
        if let Some(delay) = self.retry_delay_ms {
            settings.retry_delay_ms = delay;
        }
        if let Some(delay) = self.request_delay_ms {
            settings.request_delay_ms = delay;
        }
        if let Some(ref user_agent) = self.user_agent {
            settings.user_agent = Some(user_agent.clone());
        }
        if let Some(workers) = self.workers {
            settings.workers = workers.max(1);
        }
        if let Some(checkpoint) = self.checkpoint {
            settings.checkpoint = checkpoint;
        }
        if let Some(ref browser) = self.browser {
            settings.browser = browser.clone();
        }
        if let Some(ref path) = self.renderer.path {
            settings.renderer_path = Some(self.resolve_path(path, base_dir));
        }
    }

    /// Reject configured drivers that reuse a built-in name or carry a bad pattern.
    pub fn validate(&self, builtin: &[&str]) -> Result<(), ConfigError> {
        for (name, site) in &self.drivers {
            if builtin.contains(&name.as_str()) {
                return Err(ConfigError::ShadowedDriver { name: name.clone() });
            }
            if let Some(ref pattern) = site.link_pattern {
                regex::Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
                    name: name.clone(),
                    source,
                })?;
            }
        }
        Ok(())
    }
}

/// Environment variable value, ignoring empty strings.
fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

/// Apply environment overrides on top of file configuration.
pub fn apply_env_overrides(settings: &mut Settings) {
    if let Some(root) = env_value("LEXACQUIRE_DOWNLOAD_ROOT") {
        tracing::debug!("Using LEXACQUIRE_DOWNLOAD_ROOT from environment: {}", root);
        settings.download_root = PathBuf::from(shellexpand::tilde(&root).as_ref());
    }
    if let Some(path) = env_value("WKHTMLTOPDF_PATH") {
        settings.renderer_path = Some(PathBuf::from(shellexpand::tilde(&path).as_ref()));
    }
    settings.browser = std::mem::take(&mut settings.browser).with_env_overrides();
}

/// Options from the command line that shape settings loading.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file; skips discovery.
    pub config_path: Option<PathBuf>,
    /// `--target` download root; wins over config and environment.
    pub download_root: Option<PathBuf>,
}

/// Load settings with explicit options.
pub async fn load_settings_with_options(
    options: LoadOptions,
) -> Result<(Settings, Config), ConfigError> {
    let config = match options.config_path {
        Some(ref path) => {
            let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
            Config::load_from_path(Path::new(&expanded)).await?
        }
        None => Config::load().await?,
    };

    let mut settings = Settings::default();
    let base_dir = config
        .base_dir()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    config.apply_to_settings(&mut settings, &base_dir);
    apply_env_overrides(&mut settings);

    if let Some(root) = options.download_root {
        settings.download_root = root;
    }

    Ok((settings, config))
}
