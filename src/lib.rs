//! Dcbuild - build configuration resolution and compilation driving for the
//! Delphi compiler toolchain.
//!
//! This library provides the core functionality for the `dcb` CLI tool:
//! recovering compiler settings from IDE build logs, layering TOML
//! configuration with deterministic precedence, assembling compiler command
//! lines (with response-file fallback), and parsing locale-variant compiler
//! output into structured diagnostics.

pub mod buildlog;
pub mod cli;
pub mod compile;
pub mod config;
pub mod extend;
pub mod generate;
pub mod grammar;
pub mod invoke;
pub mod mcp;
pub mod models;
pub mod output;
pub mod pathutil;
pub mod project;
pub mod resource;

/// Test utilities for isolated test environments.
#[cfg(test)]
pub(crate) mod test_utils {
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    /// Test environment with an isolated project directory and config directory.
    pub struct TestEnv {
        /// Simulated project directory (sources, build logs)
        pub project_dir: TempDir,
        /// Isolated configuration directory
        pub config_dir: TempDir,
    }

    impl TestEnv {
        /// Create a new test environment with isolated directories.
        pub fn new() -> Self {
            Self {
                project_dir: TempDir::new().unwrap(),
                config_dir: TempDir::new().unwrap(),
            }
        }

        /// Get the path to the simulated project directory.
        pub fn path(&self) -> &Path {
            self.project_dir.path()
        }

        /// Get the path to the isolated config directory.
        pub fn config_path(&self) -> &Path {
            self.config_dir.path()
        }

        /// Write a file under the project directory and return its path.
        pub fn write_project_file(&self, name: &str, content: &str) -> PathBuf {
            let path = self.path().join(name);
            fs::write(&path, content).unwrap();
            path
        }

        /// Write a file under the config directory and return its path.
        pub fn write_config_file(&self, name: &str, content: &str) -> PathBuf {
            let path = self.config_path().join(name);
            fs::write(&path, content).unwrap();
            path
        }
    }

    impl Default for TestEnv {
        fn default() -> Self {
            Self::new()
        }
    }

    /// Create an executable script in `dir` that behaves like a compiler.
    ///
    /// The script prints `stdout_text` and exits with `exit_code`. Only
    /// available on Unix; process-spawning tests are unix-gated.
    #[cfg(unix)]
    pub fn write_fake_tool(dir: &Path, name: &str, stdout_text: &str, exit_code: i32) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        let script = format!(
            "#!/bin/sh\ncat <<'EOF'\n{}\nEOF\nexit {}\n",
            stdout_text, exit_code
        );
        fs::write(&path, script).unwrap();
        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).unwrap();
        path
    }
}

/// Library-level error type for dcbuild operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid TOML in configuration file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Compiler command not found in build log: {0}")]
    UnrecognizedLog(String),

    #[error(
        "Configuration file not found: {0}\n\
         Create delphi_config.toml or generate it from a build log with `dcb config generate`"
    )]
    ConfigNotFound(String),

    #[error("Invalid project file: {0}")]
    ProjectParse(String),

    #[error("Tool not found: {}", .0.display())]
    ToolNotFound(std::path::PathBuf),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for dcbuild operations.
pub type Result<T> = std::result::Result<T, Error>;
