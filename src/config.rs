//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MSGPEEK_CONFIG` (environment variable)
//! 2. `~/.config/msgpeek/config.toml` (Linux/macOS)
//!    `%APPDATA%\msgpeek\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::cfb::{CfbOptions, DEFAULT_MAX_CHAIN_STEPS, DEFAULT_MAX_SECTOR_SHIFT};
use crate::error::{MsgError, Result};
use crate::reader::{ReaderOptions, DEFAULT_CODEPAGE};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Parser limits and fallbacks.
    pub reader: ReaderConfig,
    /// How `show` prints a message.
    pub output: OutputConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

/// Parser limits and fallbacks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Maximum hops along one sector chain.
    pub max_chain_steps: usize,
    /// Largest accepted sector shift.
    pub max_sector_shift: u16,
    /// Windows codepage for 8-bit strings without a declared one.
    pub default_codepage: u32,
    /// Scrape UTF-16 text from compound files that cannot be parsed.
    pub enable_scrape: bool,
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Default output format: "text" or "json".
    pub format: String,
    /// Truncate the printed body to this many characters (0 = no limit).
    pub body_preview_chars: usize,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            log_level: "warn".to_string(),
        }
    }
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            max_chain_steps: DEFAULT_MAX_CHAIN_STEPS,
            max_sector_shift: DEFAULT_MAX_SECTOR_SHIFT,
            default_codepage: DEFAULT_CODEPAGE,
            enable_scrape: true,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: "text".to_string(),
            body_preview_chars: 0,
        }
    }
}

impl ReaderConfig {
    /// Convert to reader options, rejecting values the reader cannot use.
    pub fn to_options(&self) -> Result<ReaderOptions> {
        if self.max_chain_steps == 0 {
            return Err(MsgError::Config("max_chain_steps must be positive".into()));
        }
        if crate::codec::text::encoding_for_codepage(self.default_codepage).is_none() {
            return Err(MsgError::Config(format!(
                "unsupported default_codepage {}",
                self.default_codepage
            )));
        }
        Ok(ReaderOptions {
            cfb: CfbOptions {
                max_chain_steps: self.max_chain_steps,
                max_sector_shift: self.max_sector_shift,
            },
            default_codepage: self.default_codepage,
            enable_scrape: self.enable_scrape,
        })
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    match config_file_path() {
        Some(path) if path.exists() => load_config_from(&path),
        _ => Config::default(),
    }
}

/// Load configuration from a specific file, falling back to defaults.
pub fn load_config_from(path: &std::path::Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str::<Config>(&contents) {
            Ok(cfg) => {
                tracing::info!(path = %path.display(), "Loaded config");
                cfg
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to parse config, using defaults"
                );
                Config::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to read config file, using defaults"
            );
            Config::default()
        }
    }
}

/// Save configuration to the standard location and return the path written.
pub fn save_config(config: &Config) -> anyhow::Result<PathBuf> {
    let path = config_file_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config file path"))?;
    save_config_to(config, &path)?;
    Ok(path)
}

/// Save configuration to `path`, creating parent directories.
pub fn save_config_to(config: &Config, path: &std::path::Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    tracing::info!(path = %path.display(), "Saved config");
    Ok(())
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MSGPEEK_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("msgpeek").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("msgpeek")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("msgpeek.log")
}
