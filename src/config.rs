//! Sorter configuration.
//!
//! Configuration is read from a TOML file and controls which identifier rule
//! a batch uses and where the persistent state lives.
//!
//! # Configuration File Format
//!
//! ```toml
//! [identifier]
//! rule = "strict"      # "strict", "legacy" or "custom"
//! pattern = ""         # only read when rule = "custom"
//!
//! [storage]
//! state_dir = "/home/me/.config/file-sorter"
//! ```

use crate::identifier::{IdentifierMatcher, IdentifierRule};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the per-directory configuration file.
pub const LOCAL_CONFIG_FILE: &str = ".filesorterrc.toml";

/// Errors that can occur during configuration loading.
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    ConfigNotFound(PathBuf),
    /// Invalid TOML syntax or structure.
    ConfigInvalid(String),
    /// Invalid regex pattern provided with the actual error reason.
    InvalidRegexPattern {
        /// The regex pattern that failed to compile.
        pattern: String,
        /// The reason why the pattern is invalid.
        reason: String,
    },
    /// IO error while reading configuration.
    IoError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ConfigNotFound(path) => {
                write!(f, "Configuration file not found: {}", path.display())
            }
            ConfigError::ConfigInvalid(msg) => write!(f, "Invalid configuration: {}", msg),
            ConfigError::InvalidRegexPattern { pattern, reason } => {
                write!(f, "Invalid regex pattern '{}': {}", pattern, reason)
            }
            ConfigError::IoError(msg) => write!(f, "IO error reading configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SorterConfig {
    /// Identifier rule selection.
    #[serde(default)]
    pub identifier: IdentifierRule,

    /// Persistence settings.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Where the counters and error log are kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Overrides the default state directory.
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
}

impl SorterConfig {
    /// Load configuration from a file, with fallback to defaults.
    ///
    /// Attempts to load configuration in the following order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. Look for `.filesorterrc.toml` in the current directory
    /// 3. Look for `~/.config/file-sorter/config.toml` in home directory
    /// 4. Fall back to default configuration
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is explicitly provided but cannot be read,
    /// or if any discovered file is malformed.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Some(home_config) = default_config_dir().map(|dir| dir.join("config.toml"))
            && home_config.exists()
        {
            return Self::load_from_file(&home_config);
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        log::debug!("loading configuration from {}", path.display());
        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Self::parse(&content)
    }

    /// Parses configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))
    }

    /// Builds the matcher selected by `[identifier]`.
    ///
    /// # Errors
    ///
    /// Returns an error if a custom pattern is empty or does not compile.
    pub fn matcher(&self) -> Result<Box<dyn IdentifierMatcher + Send + Sync>, ConfigError> {
        self.identifier.compile()
    }

    /// The state directory to use, falling back to `~/.config/file-sorter`.
    pub fn state_dir(&self) -> Result<PathBuf, ConfigError> {
        self.storage
            .state_dir
            .clone()
            .or_else(default_config_dir)
            .ok_or_else(|| {
                ConfigError::ConfigInvalid(
                    "HOME is not set; pass --state-dir or set storage.state_dir".to_string(),
                )
            })
    }
}

/// `$HOME/.config/file-sorter`, if `HOME` is set.
pub fn default_config_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| {
        PathBuf::from(home)
            .join(".config")
            .join("file-sorter")
    })
}
