//! CLI argument definitions for dcbuild.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Dcbuild - drive the Delphi compiler from the command line or MCP.
///
/// Compile projects against a TOML configuration store, or build that store
/// from IDE build logs with `dcb config generate` / `dcb config extend`.
#[derive(Parser, Debug)]
#[command(name = "dcb")]
#[command(author, version, about = "Build-configuration resolution and compilation driving for the Delphi toolchain", long_about = None)]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Directory searched for delphi_config*.toml files (default: current
    /// directory). Can also be set via DCB_CONFIG_DIR.
    #[arg(short = 'C', long = "config-dir", global = true, env = "DCB_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compile a Delphi project (.dpr, .dpk, or .dproj)
    Compile {
        /// Path to the project file
        project: PathBuf,

        /// Force rebuild of all units (-B)
        #[arg(short = 'b', long)]
        build_all: bool,

        /// Override the active build configuration (Debug/Release)
        #[arg(long, value_name = "CONFIG")]
        r#override: Option<String>,

        /// Override the active platform (Win32/Win64/Win64x/Linux64)
        #[arg(long, value_name = "PLATFORM")]
        platform: Option<String>,

        /// Extra unit search path (repeatable)
        #[arg(long = "search-path", value_name = "PATH")]
        search_paths: Vec<String>,

        /// Extra compiler flag (repeatable)
        #[arg(long = "flag", value_name = "FLAG", allow_hyphen_values = true)]
        flags: Vec<String>,

        /// Explicit config file, bypassing the search order
        #[arg(long, value_name = "FILE")]
        config_file: Option<PathBuf>,
    },

    /// Configuration store commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// MCP tool-surface commands
    Mcp {
        #[command(subcommand)]
        command: McpCommands,
    },
}

/// Configuration store commands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Generate a config file from one IDE build log
    Generate {
        /// Path to the build log
        build_log: PathBuf,

        /// Output path (default: platform-specific name in the current dir)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the generic delphi_config.toml name instead of a
        /// platform-specific one
        #[arg(short, long)]
        generic: bool,

        /// Keep literal user paths instead of ${USERNAME} placeholders
        #[arg(long)]
        no_env_vars: bool,
    },

    /// Generate configuration from multiple IDE build logs
    GenerateMulti {
        /// Paths to the build logs (at least one)
        #[arg(required = true)]
        build_logs: Vec<PathBuf>,

        /// Output path for the unified file
        #[arg(short, long, default_value = "delphi_config.toml")]
        output: PathBuf,

        /// Write one platform-specific file per detected platform instead
        /// of a unified file
        #[arg(long)]
        separate: bool,

        /// Output directory for per-platform files (with --separate)
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,

        /// Keep literal user paths instead of ${USERNAME} placeholders
        #[arg(long)]
        no_env_vars: bool,
    },

    /// Extend an existing config file with a new build log
    Extend {
        /// Path to the existing config file
        existing_config: PathBuf,

        /// Path to the build log
        build_log: PathBuf,

        /// Output path (default: overwrite the existing file)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Keep literal user paths instead of ${USERNAME} placeholders
        #[arg(long)]
        no_env_vars: bool,
    },

    /// Show the resolved config file and its settings
    Show {
        /// Platform to resolve the config file for
        #[arg(long, value_name = "PLATFORM")]
        platform: Option<String>,
    },
}

/// MCP commands
#[derive(Subcommand, Debug)]
pub enum McpCommands {
    /// Output the MCP tool manifest
    Manifest,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_args_parse() {
        let cli = Cli::parse_from([
            "dcb",
            "compile",
            "App.dproj",
            "--build-all",
            "--platform",
            "Win64",
            "--search-path",
            "C:/Extra",
            "--flag",
            "-W+",
        ]);
        match cli.command {
            Commands::Compile {
                project,
                build_all,
                platform,
                search_paths,
                flags,
                ..
            } => {
                assert_eq!(project, PathBuf::from("App.dproj"));
                assert!(build_all);
                assert_eq!(platform.as_deref(), Some("Win64"));
                assert_eq!(search_paths, vec!["C:/Extra"]);
                assert_eq!(flags, vec!["-W+"]);
            }
            _ => panic!("expected compile command"),
        }
    }

    #[test]
    fn test_config_extend_args_parse() {
        let cli = Cli::parse_from([
            "dcb",
            "config",
            "extend",
            "delphi_config.toml",
            "build.log",
            "-o",
            "out.toml",
        ]);
        match cli.command {
            Commands::Config {
                command:
                    ConfigCommands::Extend {
                        existing_config,
                        build_log,
                        output,
                        no_env_vars,
                    },
            } => {
                assert_eq!(existing_config, PathBuf::from("delphi_config.toml"));
                assert_eq!(build_log, PathBuf::from("build.log"));
                assert_eq!(output, Some(PathBuf::from("out.toml")));
                assert!(!no_env_vars);
            }
            _ => panic!("expected config extend command"),
        }
    }

    #[test]
    fn test_generate_multi_requires_logs() {
        assert!(Cli::try_parse_from(["dcb", "config", "generate-multi"]).is_err());
    }

    #[test]
    fn test_human_flag_is_global() {
        let cli = Cli::parse_from(["dcb", "mcp", "manifest", "--human"]);
        assert!(cli.human_readable);
    }
}
