//! Data models for dcbuild entities.
//!
//! This module defines the core data structures:
//! - `Platform` / `BuildConfig` - the two-axis key settings are scoped under
//! - `Diagnostic` - a single structured compiler message
//! - `CompilationResult` - outcome of one compile operation
//! - `VersionInfo` - version-resource metadata from a project descriptor
//! - Result types for config generation and extension operations

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Target platform for compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Platform {
    Win32,
    Win64,
    /// Modern Win64 toolchain variant; shares dcc64.exe with Win64
    Win64x,
    Linux64,
    Android,
    Android64,
}

impl Platform {
    /// All platforms with a config-file naming convention.
    pub const ALL: [Platform; 6] = [
        Platform::Win32,
        Platform::Win64,
        Platform::Win64x,
        Platform::Linux64,
        Platform::Android,
        Platform::Android64,
    ];

    /// Parse a platform name, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "win32" => Some(Platform::Win32),
            "win64" => Some(Platform::Win64),
            "win64x" => Some(Platform::Win64x),
            "linux64" => Some(Platform::Linux64),
            "android" => Some(Platform::Android),
            "android64" => Some(Platform::Android64),
            _ => None,
        }
    }

    /// Canonical display name (e.g. "Win64x").
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Win32 => "Win32",
            Platform::Win64 => "Win64",
            Platform::Win64x => "Win64x",
            Platform::Linux64 => "Linux64",
            Platform::Android => "Android",
            Platform::Android64 => "Android64",
        }
    }

    /// Lowercase name used in config keys and file names.
    pub fn key(&self) -> String {
        self.as_str().to_ascii_lowercase()
    }

    /// Whether this platform cross-compiles against a Linux SDK.
    pub fn needs_linux_sdk(&self) -> bool {
        matches!(self, Platform::Linux64)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Build configuration type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BuildConfig {
    #[default]
    Debug,
    Release,
}

impl BuildConfig {
    /// Parse a configuration name, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Some(BuildConfig::Debug),
            "release" => Some(BuildConfig::Release),
            _ => None,
        }
    }

    /// Canonical display name.
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildConfig::Debug => "Debug",
            BuildConfig::Release => "Release",
        }
    }

    /// Lowercase name used in config keys.
    pub fn key(&self) -> &'static str {
        match self {
            BuildConfig::Debug => "debug",
            BuildConfig::Release => "release",
        }
    }

    /// The opposite configuration (release for debug and vice versa).
    pub fn other(&self) -> Self {
        match self {
            BuildConfig::Debug => BuildConfig::Release,
            BuildConfig::Release => BuildConfig::Debug,
        }
    }
}

impl fmt::Display for BuildConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Severity of a compiler message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Fatal,
    Warning,
    Hint,
}

impl Severity {
    /// Whether messages of this severity are surfaced to callers.
    pub fn is_reported(&self) -> bool {
        matches!(self, Severity::Error | Severity::Fatal)
    }
}

/// A single structured compiler message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Source file where the message was reported (empty for global messages)
    pub file: String,

    /// Line number (0 for global messages)
    pub line: u32,

    /// Column number, when the compiler reported one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,

    /// Message severity
    pub severity: Severity,

    /// Message code (e.g. "E2003"), when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Message text
    pub message: String,
}

/// Statistics about the compilation process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilationStatistics {
    /// Number of lines the compiler reported compiling
    #[serde(default)]
    pub lines_compiled: u64,

    /// Number of warnings filtered out of the result
    #[serde(default)]
    pub warnings_filtered: u64,

    /// Number of hints filtered out of the result
    #[serde(default)]
    pub hints_filtered: u64,
}

/// Why a compilation did not produce an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The compiler reported errors
    CompileErrors,
    /// The resource-compilation pre-step failed; the compiler never ran
    ResourceCompilation,
    /// The compiler process exceeded the wall-clock timeout
    Timeout,
    /// The compiler process could not be launched or died abnormally
    ToolFailure,
}

/// Result of a compilation operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilationResult {
    /// Whether compilation succeeded
    pub success: bool,

    /// Compiler exit code
    pub exit_code: i32,

    /// Errors and fatal messages (warnings and hints are filtered)
    #[serde(default)]
    pub errors: Vec<Diagnostic>,

    /// Why the compilation failed, when it did
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<FailureReason>,

    /// Time taken to compile, in seconds
    pub compilation_time_seconds: f64,

    /// Path to the output artifact when successful
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_executable: Option<String>,

    /// Compilation statistics
    #[serde(default)]
    pub statistics: CompilationStatistics,
}

/// Version information extracted from a project descriptor for resource
/// compilation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    #[serde(default)]
    pub major: u16,
    #[serde(default)]
    pub minor: u16,
    #[serde(default)]
    pub release: u16,
    #[serde(default)]
    pub build: u16,

    /// Windows locale ID (1033 = US English)
    #[serde(default = "default_locale")]
    pub locale: u32,

    /// Free-form key/value pairs (CompanyName, FileDescription, ...)
    #[serde(default)]
    pub keys: BTreeMap<String, String>,
}

fn default_locale() -> u32 {
    1033
}

impl Default for VersionInfo {
    fn default() -> Self {
        Self {
            major: 0,
            minor: 0,
            release: 0,
            build: 0,
            locale: default_locale(),
            keys: BTreeMap::new(),
        }
    }
}

impl VersionInfo {
    /// Version as a dotted string (e.g. "1.2.3.4").
    pub fn file_version_string(&self) -> String {
        format!("{}.{}.{}.{}", self.major, self.minor, self.release, self.build)
    }
}

/// Result of a resource-compilation pre-step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceCompilationResult {
    /// Whether resource compilation succeeded
    pub success: bool,

    /// Path to the generated .res file if successful
    #[serde(skip_serializing_if = "Option::is_none")]
    pub res_file: Option<String>,

    /// Error output from the resource compiler
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_output: Option<String>,
}

/// Information detected from a build log, included in generation results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedInfo {
    /// Detected Delphi version
    pub delphi_version: String,
    /// Detected platform
    pub platform: Platform,
    /// Detected build configuration
    pub build_config: BuildConfig,
    /// Path to the compiler executable
    pub compiler_executable: String,
}

/// Result of configuration file generation from a single build log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigGenerationResult {
    /// Whether config generation succeeded
    pub success: bool,

    /// Path to the generated config file
    pub config_file_path: String,

    /// Generation statistics
    pub statistics: BTreeMap<String, u64>,

    /// Information detected from the build log
    pub detected_info: DetectedInfo,

    /// Human-readable message about the result
    pub message: String,
}

/// Entry describing one processed build log in a multi-log generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildLogEntry {
    /// Path to the build log file
    pub path: String,
    /// Build configuration recovered from the log
    pub config: BuildConfig,
    /// Platform recovered from the log
    pub platform: Platform,
    /// Whether config/platform were auto-detected (always true today;
    /// retained in the result contract for callers)
    pub auto_detected: bool,
}

/// Result of multi-log configuration generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiConfigGenerationResult {
    /// Whether generation succeeded
    pub success: bool,

    /// Path to the generated config file
    pub config_file_path: String,

    /// Processed build log entries
    #[serde(default)]
    pub build_logs_processed: Vec<BuildLogEntry>,

    /// Generation statistics
    pub statistics: serde_json::Value,

    /// Human-readable message about the result
    pub message: String,
}

/// Result of a configuration extension operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtendConfigResult {
    /// Whether extension succeeded
    pub success: bool,

    /// Path to the extended config file
    pub config_file_path: String,

    /// Number of new library paths added
    pub paths_added: u64,

    /// Number of duplicate paths skipped
    pub paths_skipped: u64,

    /// New platforms added (e.g. ["Win64x"])
    #[serde(default)]
    pub platforms_added: Vec<Platform>,

    /// Count of settings updated per section
    #[serde(default)]
    pub settings_updated: BTreeMap<String, u64>,

    /// Human-readable result message
    pub message: String,
}
