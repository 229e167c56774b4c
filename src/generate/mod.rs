//! Generate configuration files from IDE build logs.
//!
//! Two flavors:
//! - [`ConfigGenerator`] turns one build log into a full config file,
//!   defaulting to a platform-specific filename so multi-platform setups
//!   stay side by side.
//! - [`MultiConfigGenerator`] merges several logs (different configurations
//!   and platforms) into one unified file with common and
//!   platform/config-specific flag sections, or into one file per platform.

use crate::buildlog::{BuildLogInfo, BuildLogParser};
use crate::config::resolver::{DEFAULT_CONFIG_NAME, platform_config_filename};
use crate::extend::derive_library_name;
use crate::models::{
    BuildConfig, BuildLogEntry, ConfigGenerationResult, DetectedInfo, MultiConfigGenerationResult,
    Platform,
};
use crate::pathutil;
use crate::{Error, Result};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const BANNER: &str = "# =============================================================================";

/// Default namespace prefixes written when a log carries none.
const DEFAULT_NAMESPACES: [&str; 15] = [
    "Winapi", "System.Win", "Data.Win", "Datasnap.Win", "Web.Win", "Soap.Win", "Xml.Win", "Bde",
    "System", "Xml", "Data", "Datasnap", "Web", "Soap", "Vcl",
];

/// Default unit aliases written when a log carries none.
const DEFAULT_ALIASES: [(&str, &str); 6] = [
    ("Generics.Collections", "System.Generics.Collections"),
    ("Generics.Defaults", "System.Generics.Defaults"),
    ("WinTypes", "Winapi.Windows"),
    ("WinProcs", "Winapi.Windows"),
    ("SysUtils", "System.SysUtils"),
    ("Classes", "System.Classes"),
];

/// Generates a TOML configuration file from one build log.
pub struct ConfigGenerator {
    use_env_vars: bool,
}

impl ConfigGenerator {
    /// Create a config generator.
    pub fn new(use_env_vars: bool) -> Self {
        Self { use_env_vars }
    }

    /// Generate configuration from a build log file.
    ///
    /// When `output_path` is `None`, the filename is platform-specific
    /// (e.g. `delphi_config_win64.toml`) unless
    /// `use_platform_specific_name` is off.
    pub fn generate_from_build_log(
        &self,
        build_log_path: &Path,
        output_path: Option<&Path>,
        use_platform_specific_name: bool,
    ) -> Result<ConfigGenerationResult> {
        let log_info = BuildLogParser::from_file(build_log_path)?.parse()?;

        let output_path: PathBuf = match output_path {
            Some(path) => path.to_path_buf(),
            None if use_platform_specific_name => {
                PathBuf::from(platform_config_filename(log_info.platform))
            }
            None => PathBuf::from(DEFAULT_CONFIG_NAME),
        };

        let toml_content = self.generate_toml(&log_info);
        std::fs::write(&output_path, toml_content)?;
        info!(path = %output_path.display(), "generated configuration");

        let unique_paths: HashSet<String> = log_info
            .search_paths
            .iter()
            .map(|p| pathutil::normalize_for_comparison(p))
            .collect();

        let mut statistics = BTreeMap::new();
        statistics.insert(
            "total_paths_found".to_string(),
            log_info.search_paths.len() as u64,
        );
        statistics.insert("unique_paths".to_string(), unique_paths.len() as u64);
        statistics.insert(
            "compiler_flags_found".to_string(),
            log_info.compiler_flags.len() as u64,
        );

        let message = format!(
            "Configuration file generated successfully with {} library paths",
            unique_paths.len()
        );

        Ok(ConfigGenerationResult {
            success: true,
            config_file_path: output_path.display().to_string(),
            statistics,
            detected_info: DetectedInfo {
                delphi_version: log_info.delphi_version.clone(),
                platform: log_info.platform,
                build_config: log_info.build_config,
                compiler_executable: log_info.compiler_path.clone(),
            },
            message,
        })
    }

    fn generate_toml(&self, log_info: &BuildLogInfo) -> String {
        let mut out = String::new();

        out.push_str("# Delphi Build Configuration\n#\n");
        out.push_str("# Auto-generated from IDE build log\n");
        out.push_str(&format!(
            "# Generated: {}\n",
            chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ")
        ));
        out.push_str(&format!("# Delphi Version: {}\n", log_info.delphi_version));
        out.push_str(&format!("# Platform: {}\n", log_info.platform));
        out.push_str(&format!("# Build Config: {}\n#\n\n", log_info.build_config));

        self.push_delphi_section(&mut out, log_info);

        let (system_paths, library_paths) = categorize_paths(&log_info.search_paths, log_info);
        self.push_system_paths_section(&mut out, &system_paths, log_info);
        self.push_libraries_section(&mut out, &library_paths);
        self.push_flags_section(&mut out, &log_info.compiler_flags);
        push_namespaces_section(&mut out, &log_info.namespace_prefixes);
        push_aliases_section(&mut out, &log_info.unit_aliases);
        self.push_linux_sdk_section(&mut out, log_info);

        out
    }

    fn push_delphi_section(&self, out: &mut String, log_info: &BuildLogInfo) {
        out.push_str(&format!("{}\n# Delphi Installation Configuration\n{}\n", BANNER, BANNER));
        out.push_str("[delphi]\n");
        out.push_str(&format!("version = \"{}\"\n\n", log_info.delphi_version));
        out.push_str("# Delphi installation root directory\n");
        out.push_str(&format!(
            "root_path = \"{}\"\n\n",
            self.format_path(&log_info.compiler_root())
        ));
        out.push_str("# Compiler executables (auto-detected from root_path if not specified)\n");
        out.push_str("# compiler_win32 = \"C:/Program Files (x86)/Embarcadero/Studio/23.0/bin/dcc32.exe\"\n");
        out.push_str("# compiler_win64 = \"C:/Program Files (x86)/Embarcadero/Studio/23.0/bin/dcc64.exe\"\n");
        out.push_str("# compiler_linux64 = \"C:/Program Files (x86)/Embarcadero/Studio/23.0/bin/dcclinux64.exe\"\n\n");
    }

    fn push_system_paths_section(
        &self,
        out: &mut String,
        system_paths: &[String],
        log_info: &BuildLogInfo,
    ) {
        out.push_str(&format!("{}\n# System Library Paths\n{}\n", BANNER, BANNER));
        out.push_str("[paths.system]\n");

        let root = log_info.compiler_root();
        let rtl = find_path_containing(system_paths, &["rtl", "common"])
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}/source/rtl", root));
        let vcl = system_paths
            .iter()
            .find(|p| {
                let lower = p.to_ascii_lowercase();
                lower.contains("vcl") && !lower.contains("jvcl")
            })
            .cloned()
            .unwrap_or_else(|| format!("{}/source/vcl", root));

        out.push_str(&format!("rtl = \"{}\"\n", self.format_path(&rtl)));
        out.push_str(&format!("vcl = \"{}\"\n\n", self.format_path(&vcl)));

        out.push_str("# Compiled library paths\n");
        // Win64x before Win64: the broader tag is a substring of the
        // narrower one.
        let slots = [
            (Platform::Win64x, BuildConfig::Release),
            (Platform::Win64x, BuildConfig::Debug),
            (Platform::Win32, BuildConfig::Release),
            (Platform::Win32, BuildConfig::Debug),
            (Platform::Win64, BuildConfig::Release),
            (Platform::Win64, BuildConfig::Debug),
            (Platform::Linux64, BuildConfig::Release),
            (Platform::Linux64, BuildConfig::Debug),
        ];
        let mut claimed: HashSet<String> = HashSet::new();
        let mut entries: Vec<(String, String)> = Vec::new();
        for (platform, config) in slots {
            let needle = format!("/lib/{}/{}", platform.key(), config.key());
            let found = system_paths.iter().find(|p| {
                let lower = p.to_ascii_lowercase();
                lower.contains(&needle) && !claimed.contains(&lower)
            });
            if let Some(path) = found {
                claimed.insert(path.to_ascii_lowercase());
                entries.push((
                    format!("lib_{}_{}", platform.key(), config.key()),
                    path.clone(),
                ));
            }
        }
        entries.sort();
        for (key, path) in entries {
            out.push_str(&format!("{} = \"{}\"\n", key, self.format_path(&path)));
        }
        out.push('\n');
    }

    fn push_libraries_section(&self, out: &mut String, library_paths: &[String]) {
        out.push_str(&format!("{}\n# Third-Party Library Paths\n{}\n", BANNER, BANNER));
        out.push_str("[paths.libraries]\n# All library paths from your build log\n\n");

        let mut used_names: BTreeMap<String, u64> = BTreeMap::new();
        for path in library_paths {
            let name = unique_name(&mut used_names, &derive_library_name(path));
            out.push_str(&format!("{} = \"{}\"\n", name, self.format_path(path)));
        }
        out.push('\n');
    }

    fn push_flags_section(&self, out: &mut String, flags: &[String]) {
        out.push_str(&format!("{}\n# Compiler Flags\n{}\n", BANNER, BANNER));
        out.push_str("[compiler.flags]\n");
        out.push_str("# Compiler flags extracted from build log\n");

        if flags.is_empty() {
            out.push_str("flags = [\"--no-config\", \"-B\", \"-Q\"]\n\n");
        } else {
            let rendered: Vec<String> = flags.iter().map(|f| format!("\"{}\"", f)).collect();
            out.push_str(&format!("flags = [{}]\n\n", rendered.join(", ")));
        }
    }

    fn push_linux_sdk_section(&self, out: &mut String, log_info: &BuildLogInfo) {
        out.push_str(&format!(
            "{}\n# Linux SDK Configuration (for cross-compilation)\n{}\n",
            BANNER, BANNER
        ));
        out.push_str("[linux_sdk]\n");

        match &log_info.sdk_sysroot {
            Some(sysroot) => {
                out.push_str(&format!("sysroot = \"{}\"\n", self.format_path(sysroot)));
            }
            None => {
                out.push_str(
                    "# sysroot = \"C:/Users/${USERNAME}/Documents/Embarcadero/Studio/SDKs/ubuntu22.04.sdk\"\n",
                );
            }
        }

        if log_info.sdk_libpaths.is_empty() {
            out.push_str("# libpaths = []\n");
        } else {
            out.push_str("libpaths = [\n");
            for path in &log_info.sdk_libpaths {
                out.push_str(&format!("    \"{}\",\n", self.format_path(path)));
            }
            out.push_str("]\n");
        }
    }

    fn format_path(&self, path: &str) -> String {
        pathutil::format_for_toml(path, self.use_env_vars)
    }
}

/// Generates a unified configuration from multiple build logs.
pub struct MultiConfigGenerator {
    use_env_vars: bool,
}

impl MultiConfigGenerator {
    /// Create a multi-config generator.
    pub fn new(use_env_vars: bool) -> Self {
        Self { use_env_vars }
    }

    /// Generate one unified configuration file from several build logs.
    ///
    /// Logs are keyed by (configuration, platform); duplicate keys merge
    /// their search paths and namespaces.
    pub fn generate_from_build_logs(
        &self,
        build_log_paths: &[PathBuf],
        output_path: &Path,
    ) -> Result<MultiConfigGenerationResult> {
        let (parsed, entries) = self.parse_all(build_log_paths)?;

        let toml_content = self.generate_toml(&parsed);
        std::fs::write(output_path, toml_content)?;

        let configs: BTreeSet<&str> = parsed.keys().map(|(c, _)| c.as_str()).collect();
        let platforms: BTreeSet<&str> = parsed.keys().map(|(_, p)| p.as_str()).collect();
        let statistics = serde_json::json!({
            "build_logs_parsed": build_log_paths.len(),
            "configs_found": configs,
            "platforms_found": platforms,
            "total_library_paths": count_unique_paths(&parsed),
        });

        Ok(MultiConfigGenerationResult {
            success: true,
            config_file_path: output_path.display().to_string(),
            build_logs_processed: entries,
            statistics,
            message: format!(
                "Configuration file generated successfully from {} build log(s)",
                build_log_paths.len()
            ),
        })
    }

    /// Generate one platform-specific file per platform found in the logs.
    ///
    /// Returns one result per generated file.
    pub fn generate_separate_files(
        &self,
        build_log_paths: &[PathBuf],
        output_dir: &Path,
    ) -> Result<Vec<MultiConfigGenerationResult>> {
        let (parsed, entries) = self.parse_all(build_log_paths)?;

        let platforms: BTreeSet<Platform> = parsed.keys().map(|&(_, p)| p).collect();
        let mut results = Vec::new();

        for platform in platforms {
            let subset: ParsedLogs = parsed
                .iter()
                .filter(|((_, p), _)| *p == platform)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            let subset_entries: Vec<BuildLogEntry> = entries
                .iter()
                .filter(|e| e.platform == platform)
                .cloned()
                .collect();

            let output_path = output_dir.join(platform_config_filename(platform));
            std::fs::write(&output_path, self.generate_toml(&subset))?;

            let statistics = serde_json::json!({
                "build_logs_parsed": subset_entries.len(),
                "platforms_found": [platform.as_str()],
                "total_library_paths": count_unique_paths(&subset),
            });

            results.push(MultiConfigGenerationResult {
                success: true,
                config_file_path: output_path.display().to_string(),
                build_logs_processed: subset_entries,
                statistics,
                message: format!("Configuration file generated for {}", platform),
            });
        }

        Ok(results)
    }

    fn parse_all(&self, build_log_paths: &[PathBuf]) -> Result<(ParsedLogs, Vec<BuildLogEntry>)> {
        let mut parsed: ParsedLogs = BTreeMap::new();
        let mut entries = Vec::new();

        for log_path in build_log_paths {
            if !log_path.exists() {
                return Err(Error::InvalidInput(format!(
                    "build log not found: {}",
                    log_path.display()
                )));
            }

            let log_info = BuildLogParser::from_file(log_path)?.parse()?;
            let key = (log_info.build_config.as_str().to_string(), log_info.platform);
            debug!(log = %log_path.display(), config = %key.0, platform = %key.1, "parsed build log");

            entries.push(BuildLogEntry {
                path: log_path.display().to_string(),
                config: log_info.build_config,
                platform: log_info.platform,
                auto_detected: true,
            });

            match parsed.entry(key) {
                std::collections::btree_map::Entry::Occupied(mut slot) => {
                    merge_log_info(slot.get_mut(), &log_info);
                }
                std::collections::btree_map::Entry::Vacant(slot) => {
                    slot.insert(log_info);
                }
            }
        }

        if parsed.is_empty() {
            return Err(Error::InvalidInput(
                "no build logs could be parsed successfully".to_string(),
            ));
        }

        Ok((parsed, entries))
    }

    fn generate_toml(&self, parsed: &ParsedLogs) -> String {
        let first = parsed.values().next().expect("at least one parsed log");
        let mut out = String::new();

        let configs: BTreeSet<&str> = parsed.keys().map(|(c, _)| c.as_str()).collect();
        let platforms: BTreeSet<&str> = parsed.keys().map(|(_, p)| p.as_str()).collect();

        out.push_str("# Delphi Build Configuration\n#\n");
        out.push_str("# Auto-generated from multiple IDE build logs\n");
        out.push_str(&format!(
            "# Generated: {}\n",
            chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ")
        ));
        out.push_str(&format!("# Delphi Version: {}\n", first.delphi_version));
        out.push_str(&format!(
            "# Configurations: {}\n",
            configs.iter().copied().collect::<Vec<_>>().join(", ")
        ));
        out.push_str(&format!(
            "# Platforms: {}\n#\n\n",
            platforms.iter().copied().collect::<Vec<_>>().join(", ")
        ));

        let single = ConfigGenerator::new(self.use_env_vars);
        single.push_delphi_section(&mut out, first);

        self.push_system_paths_section(&mut out, first, parsed);
        self.push_all_libraries_section(&mut out, parsed);
        self.push_flags_section(&mut out, parsed);
        push_namespaces_section(&mut out, &first.namespace_prefixes);
        push_aliases_section(&mut out, &first.unit_aliases);

        out
    }

    /// Both configurations get a lib entry for each detected platform:
    /// binary resources live only in the release folder, so a Debug-only
    /// log still needs the release path.
    fn push_system_paths_section(
        &self,
        out: &mut String,
        first: &BuildLogInfo,
        parsed: &ParsedLogs,
    ) {
        out.push_str(&format!("{}\n# System Paths\n{}\n", BANNER, BANNER));
        out.push_str("[paths.system]\n");

        let root = first.compiler_root();
        out.push_str(&format!(
            "rtl = \"{}\"\n",
            self.format_path(&format!("{}/source/rtl", root))
        ));
        out.push_str(&format!(
            "vcl = \"{}\"\n\n",
            self.format_path(&format!("{}/source/vcl", root))
        ));

        let platforms: BTreeSet<Platform> = parsed.keys().map(|&(_, p)| p).collect();
        for platform in platforms {
            for config in [BuildConfig::Debug, BuildConfig::Release] {
                let field = format!("lib_{}_{}", platform.key(), config.key());
                let path = format!("{}/lib/{}/{}", root, platform.as_str(), config.key());
                out.push_str(&format!("{} = \"{}\"\n", field, self.format_path(&path)));
            }
        }
        out.push('\n');
    }

    fn push_all_libraries_section(&self, out: &mut String, parsed: &ParsedLogs) {
        out.push_str(&format!("{}\n# Library Paths\n{}\n", BANNER, BANNER));
        out.push_str("[paths.libraries]\n# Third-party libraries extracted from IDE build logs\n\n");

        let mut seen: HashSet<String> = HashSet::new();
        let mut used_names: BTreeMap<String, u64> = BTreeMap::new();
        let mut wrote_any = false;

        for ((_, platform), log_info) in parsed {
            let (_, library_paths) = categorize_paths(&log_info.search_paths, log_info);
            for path in &library_paths {
                let normalized = pathutil::normalize_for_comparison(path);
                if !seen.insert(normalized) {
                    continue;
                }

                let mut base_name = derive_library_name(path);
                let lower = path.to_ascii_lowercase();
                let platform_specific = ["win32", "win64", "linux64"]
                    .iter()
                    .any(|tag| lower.contains(&format!("/{}", tag)));
                if platform_specific {
                    base_name = format!("{}_{}", base_name, platform.key());
                }

                let name = unique_name(&mut used_names, &base_name);
                out.push_str(&format!("{} = \"{}\"\n", name, self.format_path(path)));
                wrote_any = true;
            }
        }

        if !wrote_any {
            out.push_str("# No library paths found in build logs\n");
        }
        out.push('\n');
    }

    /// Common flags (intersection across all logs) plus
    /// `[compiler.flags.<Platform>.<Config>]` sections for the rest.
    fn push_flags_section(&self, out: &mut String, parsed: &ParsedLogs) {
        out.push_str(&format!("{}\n# Compiler Flags\n{}\n", BANNER, BANNER));
        out.push_str("[compiler.flags]\n# Common compiler flags (applied to all configurations)\n");

        let mut common: Vec<String> = Vec::new();
        for (i, log_info) in parsed.values().enumerate() {
            if i == 0 {
                common = log_info.compiler_flags.clone();
            } else {
                common.retain(|f| log_info.compiler_flags.contains(f));
            }
        }
        common.sort();

        if common.is_empty() {
            out.push_str("common = [\"--no-config\", \"-Q\", \"-B\"]\n");
        } else {
            let rendered: Vec<String> = common.iter().map(|f| format!("\"{}\"", f)).collect();
            out.push_str(&format!("common = [{}]\n", rendered.join(", ")));
        }

        for ((config, platform), log_info) in parsed {
            let mut specific: Vec<String> = log_info
                .compiler_flags
                .iter()
                .filter(|f| !common.contains(f))
                .map(|f| f.replace('\\', "/"))
                .collect();
            if specific.is_empty() {
                continue;
            }
            specific.sort();

            out.push_str(&format!("\n[compiler.flags.{}.{}]\n", platform.as_str(), config));
            let rendered: Vec<String> = specific.iter().map(|f| format!("\"{}\"", f)).collect();
            out.push_str(&format!("flags = [{}]\n", rendered.join(", ")));
        }
        out.push('\n');
    }

    fn format_path(&self, path: &str) -> String {
        pathutil::format_for_toml(path, self.use_env_vars)
    }
}

type ParsedLogs = BTreeMap<(String, Platform), BuildLogInfo>;

/// Merge a duplicate (config, platform) log into the stored one.
fn merge_log_info(existing: &mut BuildLogInfo, new: &BuildLogInfo) {
    let mut seen: HashSet<String> = existing
        .search_paths
        .iter()
        .map(|p| p.to_ascii_lowercase())
        .collect();
    for path in &new.search_paths {
        if seen.insert(path.to_ascii_lowercase()) {
            existing.search_paths.push(path.clone());
        }
    }

    let mut seen_ns: HashSet<String> = existing
        .namespace_prefixes
        .iter()
        .map(|n| n.to_ascii_lowercase())
        .collect();
    for ns in &new.namespace_prefixes {
        if seen_ns.insert(ns.to_ascii_lowercase()) {
            existing.namespace_prefixes.push(ns.clone());
        }
    }
}

/// Split paths into system (under the compiler root) and third-party.
fn categorize_paths(paths: &[String], log_info: &BuildLogInfo) -> (Vec<String>, Vec<String>) {
    let root = log_info.compiler_root().to_ascii_lowercase();
    let mut system = Vec::new();
    let mut libraries = Vec::new();

    for path in paths {
        if !root.is_empty() && path.to_ascii_lowercase().contains(&root) {
            system.push(path.clone());
        } else {
            libraries.push(path.clone());
        }
    }

    (system, libraries)
}

fn count_unique_paths(parsed: &ParsedLogs) -> usize {
    let mut all: HashSet<String> = HashSet::new();
    for log_info in parsed.values() {
        for path in &log_info.search_paths {
            all.insert(path.to_ascii_lowercase());
        }
    }
    all.len()
}

fn find_path_containing<'a>(paths: &'a [String], needles: &[&str]) -> Option<&'a str> {
    paths
        .iter()
        .find(|p| {
            let lower = p.to_ascii_lowercase();
            needles.iter().all(|n| lower.contains(n))
        })
        .map(String::as_str)
}

fn unique_name(used_names: &mut BTreeMap<String, u64>, base_name: &str) -> String {
    let count = used_names.entry(base_name.to_string()).or_insert(0);
    *count += 1;
    if *count == 1 {
        base_name.to_string()
    } else {
        format!("{}_{}", base_name, count)
    }
}

fn push_namespaces_section(out: &mut String, prefixes: &[String]) {
    out.push_str(&format!("{}\n# Namespace Prefixes\n{}\n", BANNER, BANNER));
    out.push_str("[compiler.namespaces]\n# Namespace prefixes for unit lookup\n");

    if prefixes.is_empty() {
        let rendered: Vec<String> = DEFAULT_NAMESPACES
            .iter()
            .map(|ns| format!("\"{}\"", ns))
            .collect();
        out.push_str(&format!("prefixes = [{}]\n\n", rendered.join(", ")));
    } else {
        let rendered: Vec<String> = prefixes.iter().map(|ns| format!("\"{}\"", ns)).collect();
        out.push_str(&format!("prefixes = [{}]\n\n", rendered.join(", ")));
    }
}

fn push_aliases_section(out: &mut String, aliases: &BTreeMap<String, String>) {
    out.push_str(&format!("{}\n# Unit Aliases\n{}\n", BANNER, BANNER));
    out.push_str("[compiler.aliases]\n# Unit name aliases for legacy code compatibility\n");

    if aliases.is_empty() {
        for (old, new) in DEFAULT_ALIASES {
            out.push_str(&format!("\"{}\" = \"{}\"\n", old, new));
        }
    } else {
        for (old, new) in aliases {
            out.push_str(&format!("\"{}\" = \"{}\"\n", old, new));
        }
    }
    out.push('\n');
}
