//! Shell configuration.
//!
//! # Responsibility
//! - Parse the JSON shell configuration (logging + module descriptors).
//! - Build the validated module registry from it.
//!
//! # Invariants
//! - Unknown configuration keys are rejected instead of ignored.

use crate::logging::default_log_level;
use crate::registry::{ModuleDescriptor, ModuleRegistry, RegistryError};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Logging settings for `init_logging`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// One of `trace|debug|info|warn|error`.
    #[serde(default = "default_level")]
    pub level: String,
    /// Absolute directory for rolling log files; stderr when absent.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_level() -> String {
    default_log_level().to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            log_dir: None,
        }
    }
}

/// Root configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShellConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub modules: Vec<ModuleDescriptor>,
}

impl ShellConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(raw).map_err(ConfigError::Parse)
    }

    /// Reads and parses a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Validates every descriptor and builds the registry.
    pub fn build_registry(&self) -> Result<ModuleRegistry, ConfigError> {
        ModuleRegistry::from_descriptors(self.modules.iter().cloned())
            .map_err(ConfigError::Registry)
    }
}

/// Configuration loading errors.
#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    Registry(RegistryError),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config document: {err}"),
            Self::Registry(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Registry(err) => Some(err),
        }
    }
}
