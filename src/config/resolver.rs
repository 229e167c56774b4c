//! Precedence resolution for configuration files.
//!
//! ## Search order (highest to lowest)
//!
//! 1. `DELPHI_CONFIG` environment variable - explicit override, used even if
//!    the file does not exist so a typo surfaces as a clear error instead of
//!    silently falling back
//! 2. Platform-specific file (`delphi_config_win64.toml`, ...)
//! 3. Generic file (`delphi_config.toml`)
//!
//! Each level is an independent candidate resolver returning either a hit or
//! "not applicable"; resolution walks the ordered list instead of nesting
//! conditionals.

use crate::models::Platform;
use std::fmt;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file override.
pub const CONFIG_ENV_VAR: &str = "DELPHI_CONFIG";

/// Generic configuration file name.
pub const DEFAULT_CONFIG_NAME: &str = "delphi_config.toml";

/// Tracks which precedence level satisfied a config lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSource {
    /// Caller passed a path directly
    Explicit,
    /// `DELPHI_CONFIG` environment variable
    Env,
    /// Platform-specific file
    Platform,
    /// Generic fallback file
    Generic,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConfigSource::Explicit => "explicit",
            ConfigSource::Env => "env",
            ConfigSource::Platform => "platform",
            ConfigSource::Generic => "generic",
        };
        write!(f, "{}", s)
    }
}

/// A resolved config file with its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfigFile {
    /// Path to the configuration file
    pub path: PathBuf,
    /// Which precedence level produced it
    pub source: ConfigSource,
}

impl ResolvedConfigFile {
    /// Create a new resolved file.
    pub fn new(path: impl Into<PathBuf>, source: ConfigSource) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }
}

/// Get the platform-specific config filename (e.g. `delphi_config_win64x.toml`).
pub fn platform_config_filename(platform: Platform) -> String {
    format!("delphi_config_{}.toml", platform.key())
}

/// Find the appropriate config file for a platform.
///
/// Returns `None` when no candidate exists at any precedence level; the
/// loader maps that to [`crate::Error::ConfigNotFound`].
pub fn find_config_file(platform: Option<Platform>, base_dir: &Path) -> Option<ResolvedConfigFile> {
    let env_override = || -> Option<ResolvedConfigFile> {
        let path = std::env::var(CONFIG_ENV_VAR).ok().filter(|v| !v.is_empty())?;
        Some(ResolvedConfigFile::new(path, ConfigSource::Env))
    };

    let platform_file = || -> Option<ResolvedConfigFile> {
        let platform = platform?;
        let candidate = base_dir.join(platform_config_filename(platform));
        candidate
            .exists()
            .then(|| ResolvedConfigFile::new(candidate, ConfigSource::Platform))
    };

    let generic_file = || -> Option<ResolvedConfigFile> {
        let candidate = base_dir.join(DEFAULT_CONFIG_NAME);
        candidate
            .exists()
            .then(|| ResolvedConfigFile::new(candidate, ConfigSource::Generic))
    };

    let candidates: [&dyn Fn() -> Option<ResolvedConfigFile>; 3] =
        [&env_override, &platform_file, &generic_file];

    candidates.iter().find_map(|candidate| candidate())
}
