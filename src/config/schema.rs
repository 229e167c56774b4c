//! TOML schema for the configuration store.
//!
//! Sections map 1:1 to the file layout shown in the module docs. Unknown
//! keys are preserved where the format is open-ended (system lib paths,
//! platform-specific flag tables) so files written by newer tools still
//! load.

use crate::config::resolver::{self, ConfigSource, ResolvedConfigFile};
use crate::models::{BuildConfig, Platform};
use crate::pathutil;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Delphi installation settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DelphiSection {
    /// Delphi version (e.g. "23.0")
    #[serde(default)]
    pub version: String,

    /// Delphi installation root directory
    #[serde(default)]
    pub root_path: String,

    /// Override path to dcc32.exe
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compiler_win32: Option<String>,

    /// Override path to dcc64.exe
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compiler_win64: Option<String>,

    /// Override path to dcclinux64.exe
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compiler_linux64: Option<String>,
}

/// System library paths.
///
/// `rtl`/`vcl` point at the toolchain's own *source* tree. They are kept
/// for reference but never emitted as search paths: handing the compiler
/// its own runtime sources makes it try to rebuild the RTL and fail.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemPaths {
    /// RTL source path (reference only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rtl: Option<String>,

    /// VCL source path (reference only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vcl: Option<String>,

    /// Compiled library paths keyed `lib_<platform>_<config>`
    /// (e.g. `lib_win64x_debug`)
    #[serde(flatten)]
    pub libs: BTreeMap<String, String>,
}

impl SystemPaths {
    /// Key for a platform/config compiled-library entry.
    pub fn lib_key(platform: Platform, config: BuildConfig) -> String {
        format!("lib_{}_{}", platform.key(), config.key())
    }

    /// Compiled library path for a platform/config pair.
    pub fn lib_path(&self, platform: Platform, config: BuildConfig) -> Option<&str> {
        self.libs.get(&Self::lib_key(platform, config)).map(String::as_str)
    }

    /// Whether any compiled-library entry exists for a platform.
    pub fn has_platform(&self, platform: Platform) -> bool {
        self.lib_path(platform, BuildConfig::Debug).is_some()
            || self.lib_path(platform, BuildConfig::Release).is_some()
    }
}

/// All path configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathsSection {
    /// System library paths
    #[serde(default)]
    pub system: SystemPaths,

    /// Third-party library paths, keyed by a derived name
    #[serde(default)]
    pub libraries: BTreeMap<String, String>,
}

/// Compiler flag lists. Generated files use `flags`; files merged from
/// multiple build logs use `common` plus nested per-platform tables, which
/// are preserved in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlagsSection {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub common: Vec<String>,

    #[serde(flatten)]
    pub extra: toml::Table,
}

impl FlagsSection {
    /// All flags, `flags` first then `common`, in file order.
    pub fn all(&self) -> impl Iterator<Item = &str> {
        self.flags.iter().chain(self.common.iter()).map(String::as_str)
    }
}

/// Namespace prefix list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NamespacesSection {
    #[serde(default)]
    pub prefixes: Vec<String>,
}

/// Compiler-specific configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompilerSection {
    #[serde(default)]
    pub flags: FlagsSection,

    #[serde(default)]
    pub namespaces: NamespacesSection,

    /// Unit name aliases (old name to new name)
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

/// Linux SDK configuration for cross-compilation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinuxSdkSection {
    /// SDK sysroot path (--syslibroot)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sysroot: Option<String>,

    /// SDK library paths (--libpath)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub libpaths: Vec<String>,
}

/// Complete configuration store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub delphi: DelphiSection,

    #[serde(default)]
    pub paths: PathsSection,

    #[serde(default)]
    pub compiler: CompilerSection,

    #[serde(default)]
    pub linux_sdk: LinuxSdkSection,
}

impl Config {
    /// Parse a config from TOML text, expanding `${VAR}` placeholders in
    /// every string value first.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let mut value: toml::Value = text.parse().map_err(Error::Toml)?;
        expand_placeholders(&mut value);
        value.try_into().map_err(Error::Toml)
    }

    /// Compiler executable path for a platform.
    ///
    /// Win64x shares dcc64.exe with Win64.
    pub fn compiler_path(&self, platform: Platform) -> PathBuf {
        let override_path = match platform {
            Platform::Win32 => self.delphi.compiler_win32.as_deref(),
            Platform::Win64 | Platform::Win64x => self.delphi.compiler_win64.as_deref(),
            Platform::Linux64 => self.delphi.compiler_linux64.as_deref(),
            Platform::Android | Platform::Android64 => None,
        };
        if let Some(path) = override_path {
            return PathBuf::from(path);
        }

        let exe = match platform {
            Platform::Win32 => "dcc32.exe",
            Platform::Win64 | Platform::Win64x => "dcc64.exe",
            Platform::Linux64 => "dcclinux64.exe",
            Platform::Android => "dccaarm.exe",
            Platform::Android64 => "dccaarm64.exe",
        };
        Path::new(&self.delphi.root_path).join("bin").join(exe)
    }

    /// Resource compiler (cgrc.exe) path.
    pub fn resource_compiler_path(&self) -> PathBuf {
        Path::new(&self.delphi.root_path).join("bin").join("cgrc.exe")
    }

    /// All configured search paths for a platform/configuration pair.
    ///
    /// Ordering is load-bearing (later entries shadow earlier ones during
    /// unit resolution): compiled system libraries for the requested
    /// configuration, then the sibling configuration, then third-party
    /// libraries. The `rtl`/`vcl` source paths are deliberately excluded.
    pub fn search_paths(&self, platform: Platform, config: BuildConfig) -> Vec<String> {
        let mut paths = Vec::new();
        let system = &self.paths.system;

        for cfg in [config, config.other()] {
            if let Some(path) = system.lib_path(platform, cfg) {
                paths.push(path.to_string());
            }
        }

        paths.extend(self.paths.libraries.values().cloned());
        paths
    }

    /// Validate the configuration, returning human-readable warnings for
    /// anything that looks broken without being fatal.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.delphi.root_path.is_empty() {
            warnings.push("delphi.root_path is not set".to_string());
        } else if !Path::new(&self.delphi.root_path).exists() {
            warnings.push(format!(
                "Delphi installation not found at: {}",
                self.delphi.root_path
            ));
        }

        for platform in [Platform::Win32, Platform::Win64, Platform::Linux64] {
            let compiler = self.compiler_path(platform);
            if !compiler.exists() {
                warnings.push(format!(
                    "{} compiler not found at: {}",
                    platform,
                    compiler.display()
                ));
            }
        }

        for (name, path) in &self.paths.libraries {
            if !Path::new(path).exists() {
                warnings.push(format!("library path does not exist: {}: {}", name, path));
            }
        }

        warnings
    }
}

/// Recursively expand `${VAR}` placeholders in string values.
fn expand_placeholders(value: &mut toml::Value) {
    match value {
        toml::Value::String(s) => {
            if s.contains("${") {
                *s = pathutil::expand_env_placeholders(s);
            }
        }
        toml::Value::Array(items) => {
            for item in items {
                expand_placeholders(item);
            }
        }
        toml::Value::Table(table) => {
            for (_, item) in table.iter_mut() {
                expand_placeholders(item);
            }
        }
        _ => {}
    }
}

/// Loads a configuration store with precedence-aware file resolution.
#[derive(Debug)]
pub struct ConfigLoader {
    resolved: ResolvedConfigFile,
}

impl ConfigLoader {
    /// Resolve the config file for a platform using the standard search
    /// order, rooted at `base_dir` (current directory when `None`).
    pub fn for_platform(platform: Option<Platform>, base_dir: Option<&Path>) -> Result<Self> {
        let cwd;
        let base = match base_dir {
            Some(dir) => dir,
            None => {
                cwd = std::env::current_dir()?;
                &cwd
            }
        };

        let resolved = resolver::find_config_file(platform, base).ok_or_else(|| {
            Error::ConfigNotFound(format!(
                "no delphi_config.toml in {} (platform: {})",
                base.display(),
                platform.map(|p| p.as_str()).unwrap_or("any")
            ))
        })?;

        Ok(Self { resolved })
    }

    /// Use an explicit config file path, bypassing the search order.
    pub fn with_explicit(path: impl Into<PathBuf>) -> Self {
        Self {
            resolved: ResolvedConfigFile::new(path.into(), ConfigSource::Explicit),
        }
    }

    /// The resolved file path.
    pub fn path(&self) -> &Path {
        &self.resolved.path
    }

    /// Which precedence level produced the path.
    pub fn source(&self) -> ConfigSource {
        self.resolved.source
    }

    /// Load and validate the configuration file.
    pub fn load(&self) -> Result<Config> {
        if !self.resolved.path.exists() {
            return Err(Error::ConfigNotFound(
                self.resolved.path.display().to_string(),
            ));
        }

        let text = std::fs::read_to_string(&self.resolved.path)?;
        let config = Config::from_toml_str(&text)?;

        for warning in config.validate() {
            warn!(source = %self.resolved.source, "{}", warning);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestEnv;
    use serial_test::serial;

    const SAMPLE: &str = r#"
[delphi]
version = "23.0"
root_path = "C:/Program Files (x86)/Embarcadero/Studio/23.0"

[paths.system]
rtl = "C:/Program Files (x86)/Embarcadero/Studio/23.0/source/rtl"
vcl = "C:/Program Files (x86)/Embarcadero/Studio/23.0/source/vcl"
lib_win32_release = "C:/Studio/23.0/lib/Win32/release"
lib_win32_debug = "C:/Studio/23.0/lib/Win32/debug"
lib_win64x_debug = "C:/Studio/23.0/lib/Win64x/debug"

[paths.libraries]
spring4d = "C:/Libraries/Spring4D/Source"
dunitx = "C:/Libraries/DUnitX/Source"

[compiler.flags]
flags = ["--no-config", "-B", "-Q"]

[compiler.namespaces]
prefixes = ["System", "Winapi", "Vcl"]

[compiler.aliases]
"SysUtils" = "System.SysUtils"

[linux_sdk]
sysroot = "C:/SDKs/ubuntu22.04.sdk"
libpaths = ["C:/SDKs/ubuntu22.04.sdk/lib64"]
"#;

    // ==================== Parsing Tests ====================

    #[test]
    fn test_parse_full_config() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.delphi.version, "23.0");
        assert_eq!(config.paths.libraries.len(), 2);
        assert_eq!(config.compiler.namespaces.prefixes.len(), 3);
        assert_eq!(
            config.compiler.aliases.get("SysUtils").map(String::as_str),
            Some("System.SysUtils")
        );
        assert_eq!(config.linux_sdk.libpaths.len(), 1);
    }

    #[test]
    fn test_parse_invalid_toml_fails() {
        assert!(matches!(
            Config::from_toml_str("delphi = [broken"),
            Err(Error::Toml(_))
        ));
    }

    #[test]
    #[serial]
    fn test_env_placeholders_expanded_on_load() {
        unsafe { std::env::set_var("USERNAME", "alice") };
        let config = Config::from_toml_str(
            "[paths.libraries]\nhome = \"C:/Users/${USERNAME}/Libs\"\n",
        )
        .unwrap();
        assert_eq!(
            config.paths.libraries.get("home").map(String::as_str),
            Some("C:/Users/alice/Libs")
        );
        unsafe { std::env::remove_var("USERNAME") };
    }

    // ==================== Compiler Path Tests ====================

    #[test]
    fn test_compiler_paths_per_platform() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        assert!(config.compiler_path(Platform::Win32).ends_with("bin/dcc32.exe"));
        assert!(config.compiler_path(Platform::Win64).ends_with("bin/dcc64.exe"));
        // Win64x shares the Win64 compiler binary
        assert!(config.compiler_path(Platform::Win64x).ends_with("bin/dcc64.exe"));
        assert!(
            config
                .compiler_path(Platform::Linux64)
                .ends_with("bin/dcclinux64.exe")
        );
        assert!(config.resource_compiler_path().ends_with("bin/cgrc.exe"));
    }

    #[test]
    fn test_compiler_override_wins() {
        let mut config = Config::from_toml_str(SAMPLE).unwrap();
        config.delphi.compiler_win64 = Some("D:/custom/dcc64.exe".to_string());
        assert_eq!(
            config.compiler_path(Platform::Win64),
            PathBuf::from("D:/custom/dcc64.exe")
        );
        assert_eq!(
            config.compiler_path(Platform::Win64x),
            PathBuf::from("D:/custom/dcc64.exe")
        );
    }

    // ==================== Search Path Tests ====================

    #[test]
    fn test_search_paths_order_and_source_exclusion() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        let paths = config.search_paths(Platform::Win32, BuildConfig::Release);

        // System libs first (requested config, then sibling), then libraries.
        assert_eq!(
            paths,
            vec![
                "C:/Studio/23.0/lib/Win32/release",
                "C:/Studio/23.0/lib/Win32/debug",
                "C:/Libraries/DUnitX/Source",
                "C:/Libraries/Spring4D/Source",
            ]
        );

        // The RTL/VCL source trees must never appear.
        assert!(!paths.iter().any(|p| p.contains("source/rtl")));
        assert!(!paths.iter().any(|p| p.contains("source/vcl")));
    }

    #[test]
    fn test_search_paths_missing_platform_yields_libraries_only() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        let paths = config.search_paths(Platform::Linux64, BuildConfig::Debug);
        assert_eq!(paths.len(), 2); // just the libraries
    }

    #[test]
    fn test_system_paths_platform_probe() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        assert!(config.paths.system.has_platform(Platform::Win32));
        assert!(config.paths.system.has_platform(Platform::Win64x));
        assert!(!config.paths.system.has_platform(Platform::Linux64));
    }

    // ==================== Loader Tests ====================

    #[test]
    #[serial]
    fn test_loader_platform_specific_file(){
        unsafe { std::env::remove_var(resolver::CONFIG_ENV_VAR) };
        let env = TestEnv::new();
        env.write_config_file("delphi_config_win64x.toml", SAMPLE);

        let loader =
            ConfigLoader::for_platform(Some(Platform::Win64x), Some(env.config_path())).unwrap();
        assert_eq!(loader.source(), ConfigSource::Platform);
        let config = loader.load().unwrap();
        assert_eq!(config.delphi.version, "23.0");
    }

    #[test]
    #[serial]
    fn test_loader_not_found() {
        unsafe { std::env::remove_var(resolver::CONFIG_ENV_VAR) };
        let env = TestEnv::new();
        let err =
            ConfigLoader::for_platform(Some(Platform::Win32), Some(env.config_path())).unwrap_err();
        assert!(matches!(err, Error::ConfigNotFound(_)));
    }

    #[test]
    fn test_loader_explicit_missing_file() {
        let loader = ConfigLoader::with_explicit("/no/such/config.toml");
        assert_eq!(loader.source(), ConfigSource::Explicit);
        assert!(matches!(loader.load(), Err(Error::ConfigNotFound(_))));
    }

    #[test]
    fn test_validate_reports_missing_paths() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        let warnings = config.validate();
        // Nothing in SAMPLE exists on disk, so every check fires.
        assert!(warnings.iter().any(|w| w.contains("Delphi installation")));
        assert!(warnings.iter().any(|w| w.contains("spring4d")));
    }
}
