//! Configuration management for dcbuild.
//!
//! The store is a TOML file describing one Delphi installation and the
//! library paths the compiler should search:
//!
//! ```toml
//! [delphi]
//! version = "23.0"
//! root_path = "C:/Program Files (x86)/Embarcadero/Studio/23.0"
//!
//! [paths.system]
//! rtl = "C:/.../source/rtl"          # reference only, never passed to dcc
//! vcl = "C:/.../source/vcl"
//! lib_win32_release = "C:/.../lib/Win32/release"
//! lib_win64x_debug = "C:/.../lib/Win64x/debug"
//!
//! [paths.libraries]
//! spring4d = "C:/Libraries/Spring4D/Source"
//!
//! [compiler.flags]
//! flags = ["--no-config", "-B", "-Q"]
//!
//! [compiler.namespaces]
//! prefixes = ["System", "Winapi", "Vcl"]
//!
//! [compiler.aliases]
//! "SysUtils" = "System.SysUtils"
//!
//! [linux_sdk]
//! sysroot = "C:/Users/${USERNAME}/.../ubuntu22.04.sdk"
//! libpaths = ["..."]
//! ```
//!
//! ## Precedence
//!
//! One generic file plus platform-suffixed variants are supported, resolved
//! in strict order (highest to lowest):
//!
//! 1. `DELPHI_CONFIG` environment variable (explicit override)
//! 2. Platform-specific file (e.g. `delphi_config_win64.toml`)
//! 3. Generic `delphi_config.toml`
//!
//! Use the [`resolver`] module for precedence resolution; the winning source
//! is recorded so callers can report where settings came from.

pub mod resolver;
pub mod schema;

pub use resolver::{
    CONFIG_ENV_VAR, ConfigSource, DEFAULT_CONFIG_NAME, ResolvedConfigFile, find_config_file,
    platform_config_filename,
};
pub use schema::{
    CompilerSection, Config, ConfigLoader, DelphiSection, FlagsSection, LinuxSdkSection,
    PathsSection, SystemPaths,
};
