//! Extend an existing configuration store with settings from a new build log.
//!
//! The merge is copy-on-write: the existing TOML table is deep-copied,
//! additions are applied to the copy, and the copy plus statistics are
//! returned. Callers decide whether to persist over the original; a failed
//! merge never leaves a half-written store behind.
//!
//! The merge operates on the raw [`toml::Table`] rather than the typed
//! [`crate::config::Config`] so keys this version does not model survive a
//! round trip.

use crate::buildlog::{BuildLogInfo, BuildLogParser};
use crate::models::{BuildConfig, ExtendConfigResult, Platform};
use crate::pathutil;
use crate::{Error, Result};
use regex::Regex;
use std::collections::BTreeMap;
use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;
use toml::value::{Table, Value};
use tracing::debug;

/// Statistics from one merge operation. Purely derived; never persisted
/// separately from the store it describes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeStatistics {
    /// Paths newly inserted
    pub paths_added: u64,
    /// Paths skipped as duplicates of existing entries
    pub paths_skipped: u64,
    /// Platforms with no prior compiled-library entries
    pub platforms_added: Vec<Platform>,
    /// Per-section counts of values added
    pub settings_updated: BTreeMap<String, u64>,
}

/// Known library name patterns, checked against the lowercased path.
const LIBRARY_PATTERNS: [(&str, &str); 17] = [
    ("dunitx", "dunitx"),
    ("delphi-mocks", "delphi_mocks"),
    ("delphi_mocks", "delphi_mocks"),
    ("testinsight", "testinsight"),
    ("spring4d", "spring4d"),
    ("zeoslib", "zeoslib"),
    ("dmvcframework", "dmvcframework"),
    ("loggerpro", "loggerpro"),
    ("jvcl", "jvcl"),
    ("jcl", "jcl"),
    ("abbrevia", "abbrevia"),
    ("lockbox", "lockbox"),
    ("omni", "omnithreadlibrary"),
    ("python4delphi", "python4delphi"),
    ("markdown", "markdown"),
    ("toml", "toml"),
    ("yaml", "yaml"),
];

/// Extends existing TOML configuration with new build log settings.
pub struct ConfigExtender {
    use_env_vars: bool,
}

impl ConfigExtender {
    /// Create a config extender.
    ///
    /// When `use_env_vars` is set, user-home path prefixes are rewritten to
    /// `C:/Users/${USERNAME}` in everything written out.
    pub fn new(use_env_vars: bool) -> Self {
        Self { use_env_vars }
    }

    /// Extend an existing config file with settings from a build log.
    ///
    /// `output_path` defaults to overwriting the existing file.
    pub fn extend_from_build_log(
        &self,
        existing_config_path: &Path,
        build_log_path: &Path,
        output_path: Option<&Path>,
    ) -> Result<ExtendConfigResult> {
        if !existing_config_path.exists() {
            return Err(Error::ConfigNotFound(
                existing_config_path.display().to_string(),
            ));
        }
        if !build_log_path.exists() {
            return Err(Error::InvalidInput(format!(
                "build log not found: {}",
                build_log_path.display()
            )));
        }

        let output_path = output_path.unwrap_or(existing_config_path);

        let text = std::fs::read_to_string(existing_config_path)?;
        let existing: Table = text.parse().map_err(Error::Toml)?;

        let log_info = BuildLogParser::from_file(build_log_path)?.parse()?;

        let (merged, stats) = self.merge(&existing, &log_info);
        debug!(
            added = stats.paths_added,
            skipped = stats.paths_skipped,
            "merged build log into config"
        );

        std::fs::write(output_path, render_toml(&merged))?;

        let mut message_parts = Vec::new();
        if !stats.platforms_added.is_empty() {
            let names: Vec<&str> = stats.platforms_added.iter().map(|p| p.as_str()).collect();
            message_parts.push(format!("Added platform(s): {}", names.join(", ")));
        }
        message_parts.push(format!("Added {} new paths", stats.paths_added));
        message_parts.push(format!("Skipped {} duplicate paths", stats.paths_skipped));

        Ok(ExtendConfigResult {
            success: true,
            config_file_path: absolute_display(output_path),
            paths_added: stats.paths_added,
            paths_skipped: stats.paths_skipped,
            platforms_added: stats.platforms_added,
            settings_updated: stats.settings_updated,
            message: message_parts.join(". "),
        })
    }

    /// Merge a parsed build log into a configuration table.
    ///
    /// Returns a fresh table; `existing` is never mutated.
    pub fn merge(&self, existing: &Table, info: &BuildLogInfo) -> (Table, MergeStatistics) {
        let mut stats = MergeStatistics {
            platforms_added: detect_new_platforms(existing, info),
            ..Default::default()
        };
        let mut merged = existing.clone();

        ensure_table_path(&mut merged, &["paths", "system"]);
        ensure_table_path(&mut merged, &["paths", "libraries"]);
        ensure_table_path(&mut merged, &["compiler", "namespaces"]);
        ensure_table_path(&mut merged, &["compiler", "aliases"]);
        ensure_table_path(&mut merged, &["compiler", "flags"]);

        // System lib paths for the log's platform/config pair.
        let system = table_at(&mut merged, &["paths", "system"]);
        let (sys_added, sys_skipped) = self.merge_system_paths(system, info);
        stats.paths_added += sys_added;
        stats.paths_skipped += sys_skipped;
        if sys_added > 0 {
            stats.settings_updated.insert("paths.system".to_string(), sys_added);
        }

        // Third-party libraries: everything outside the compiler root.
        let compiler_root = info.compiler_root().to_ascii_lowercase();
        let library_paths: Vec<&String> = info
            .search_paths
            .iter()
            .filter(|p| !p.to_ascii_lowercase().contains(&compiler_root))
            .collect();

        let libraries = table_at(&mut merged, &["paths", "libraries"]);
        let (lib_added, lib_skipped) = self.merge_library_paths(libraries, &library_paths);
        stats.paths_added += lib_added;
        stats.paths_skipped += lib_skipped;
        if lib_added > 0 {
            stats
                .settings_updated
                .insert("paths.libraries".to_string(), lib_added);
        }

        let namespaces = table_at(&mut merged, &["compiler", "namespaces"]);
        let ns_added = merge_namespaces(namespaces, &info.namespace_prefixes);
        if ns_added > 0 {
            stats
                .settings_updated
                .insert("compiler.namespaces".to_string(), ns_added);
        }

        let aliases = table_at(&mut merged, &["compiler", "aliases"]);
        let alias_added = merge_aliases(aliases, &info.unit_aliases);
        if alias_added > 0 {
            stats
                .settings_updated
                .insert("compiler.aliases".to_string(), alias_added);
        }

        let flags = table_at(&mut merged, &["compiler", "flags"]);
        let flags_added = merge_flags(flags, &info.compiler_flags);
        if flags_added > 0 {
            stats
                .settings_updated
                .insert("compiler.flags".to_string(), flags_added);
        }

        if info.sdk_sysroot.is_some() || !info.sdk_libpaths.is_empty() {
            ensure_table_path(&mut merged, &["linux_sdk"]);
            let sdk = table_at(&mut merged, &["linux_sdk"]);
            let sdk_added = self.merge_linux_sdk(sdk, info);
            if sdk_added > 0 {
                stats.settings_updated.insert("linux_sdk".to_string(), sdk_added);
            }
        }

        (merged, stats)
    }

    /// Insert the compiled-library paths for the log's platform, both the
    /// logged configuration and its sibling. The logged configuration
    /// counts as skipped when already present; the sibling is only ever a
    /// silent add.
    fn merge_system_paths(&self, system: &mut Table, info: &BuildLogInfo) -> (u64, u64) {
        let mut added = 0;
        let mut skipped = 0;

        let platform = info.platform;
        let config = info.build_config;
        let root = info.compiler_root();

        let lib_path = |cfg: BuildConfig| {
            format!("{}/lib/{}/{}", root.trim_end_matches('/'), platform.as_str(), cfg.key())
        };

        let key = format!("lib_{}_{}", platform.key(), config.key());
        if system.contains_key(&key) {
            skipped += 1;
        } else {
            system.insert(key, Value::String(self.format_path(&lib_path(config))));
            added += 1;
        }

        let other = config.other();
        let other_key = format!("lib_{}_{}", platform.key(), other.key());
        if !system.contains_key(&other_key) {
            system.insert(other_key, Value::String(self.format_path(&lib_path(other))));
            added += 1;
        }

        (added, skipped)
    }

    /// Merge third-party library paths, deduplicating case- and
    /// separator-insensitively and deriving a unique key for each addition.
    fn merge_library_paths(&self, libraries: &mut Table, new_paths: &[&String]) -> (u64, u64) {
        let mut added = 0;
        let mut skipped = 0;

        let mut existing_normalized: HashSet<String> = libraries
            .values()
            .filter_map(Value::as_str)
            .map(pathutil::normalize_for_comparison)
            .collect();
        let mut used_names: HashSet<String> = libraries.keys().cloned().collect();

        for path in new_paths {
            let normalized = pathutil::normalize_for_comparison(path);
            if existing_normalized.contains(&normalized) {
                skipped += 1;
                continue;
            }

            let base_name = derive_library_name(path);
            let name = make_unique_name(&base_name, &used_names);
            used_names.insert(name.clone());

            libraries.insert(name, Value::String(self.format_path(path)));
            existing_normalized.insert(normalized);
            added += 1;
        }

        (added, skipped)
    }

    fn merge_linux_sdk(&self, sdk: &mut Table, info: &BuildLogInfo) -> u64 {
        let mut added = 0;

        if let Some(sysroot) = &info.sdk_sysroot {
            if !sdk.contains_key("sysroot") {
                sdk.insert(
                    "sysroot".to_string(),
                    Value::String(self.format_path(sysroot)),
                );
                added += 1;
            }
        }

        if !info.sdk_libpaths.is_empty() {
            let mut libpaths: Vec<Value> = sdk
                .get("libpaths")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            let mut existing: HashSet<String> = libpaths
                .iter()
                .filter_map(Value::as_str)
                .map(pathutil::normalize_for_comparison)
                .collect();

            for path in &info.sdk_libpaths {
                let normalized = pathutil::normalize_for_comparison(path);
                if existing.insert(normalized) {
                    libpaths.push(Value::String(self.format_path(path)));
                    added += 1;
                }
            }

            sdk.insert("libpaths".to_string(), Value::Array(libpaths));
        }

        added
    }

    fn format_path(&self, path: &str) -> String {
        pathutil::format_for_toml(path, self.use_env_vars)
    }
}

/// Platforms introduced by this log: ones with no compiled-library entry in
/// the existing store.
fn detect_new_platforms(existing: &Table, info: &BuildLogInfo) -> Vec<Platform> {
    let system = existing
        .get("paths")
        .and_then(Value::as_table)
        .and_then(|p| p.get("system"))
        .and_then(Value::as_table);

    let platform = info.platform;
    let has_any = system
        .map(|s| {
            s.contains_key(&format!("lib_{}_release", platform.key()))
                || s.contains_key(&format!("lib_{}_debug", platform.key()))
        })
        .unwrap_or(false);

    if has_any { Vec::new() } else { vec![platform] }
}

fn merge_namespaces(namespaces: &mut Table, new: &[String]) -> u64 {
    if new.is_empty() {
        return 0;
    }

    let mut prefixes: Vec<Value> = namespaces
        .get("prefixes")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let mut seen: HashSet<String> = prefixes
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_ascii_lowercase)
        .collect();

    let mut added = 0;
    for ns in new {
        if seen.insert(ns.to_ascii_lowercase()) {
            prefixes.push(Value::String(ns.clone()));
            added += 1;
        }
    }

    namespaces.insert("prefixes".to_string(), Value::Array(prefixes));
    added
}

fn merge_aliases(aliases: &mut Table, new: &BTreeMap<String, String>) -> u64 {
    let mut added = 0;
    for (old, new_name) in new {
        // Existing aliases always win.
        if !aliases.contains_key(old) {
            aliases.insert(old.clone(), Value::String(new_name.clone()));
            added += 1;
        }
    }
    added
}

fn merge_flags(flags: &mut Table, new: &[String]) -> u64 {
    if new.is_empty() {
        return 0;
    }

    // Files merged from multiple logs keep their flags under "common".
    let target_key = if flags.contains_key("common") { "common" } else { "flags" };
    let mut list: Vec<Value> = flags
        .get(target_key)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let mut seen: HashSet<String> = list
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_ascii_lowercase)
        .collect();

    let mut added = 0;
    for flag in new {
        if seen.insert(flag.to_ascii_lowercase()) {
            list.push(Value::String(flag.clone()));
            added += 1;
        }
    }

    flags.insert(target_key.to_string(), Value::Array(list));
    added
}

/// Derive a config key for a library from its path: known-pattern table
/// with an include/source/lib qualifier, else the sanitized directory name,
/// else a generic fallback.
pub fn derive_library_name(path: &str) -> String {
    static TRAILING_VERSION: OnceLock<Regex> = OnceLock::new();

    let lower = path.to_ascii_lowercase();

    for (pattern, name) in LIBRARY_PATTERNS {
        if lower.contains(pattern) {
            if lower.contains("include") {
                return format!("{}_include", name);
            } else if lower.contains("source") || lower.contains("src") {
                return format!("{}_source", name);
            } else if lower.contains("\\lib\\") || lower.contains("/lib/") {
                return format!("{}_lib", name);
            }
            return name.to_string();
        }
    }

    let dir_name = Path::new(&lower.replace('\\', "/"))
        .file_name()
        .map(|n| n.to_string_lossy().replace([' ', '-'], "_"))
        .unwrap_or_default();
    let re = TRAILING_VERSION
        .get_or_init(|| Regex::new(r"[\d._-]+$").expect("trailing version pattern"));
    let dir_name = re.replace(&dir_name, "").to_string();

    if dir_name.len() > 2 {
        dir_name
    } else {
        "library".to_string()
    }
}

/// Make `base_name` unique against `used_names` by appending a numeric
/// suffix starting at 2.
fn make_unique_name(base_name: &str, used_names: &HashSet<String>) -> String {
    if !used_names.contains(base_name) {
        return base_name.to_string();
    }
    let mut counter = 2;
    loop {
        let candidate = format!("{}_{}", base_name, counter);
        if !used_names.contains(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

fn ensure_table_path(table: &mut Table, path: &[&str]) {
    let mut current = table;
    for segment in path {
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Table(Table::new()));
        // A scalar where a section belongs is a malformed store; repair it
        // rather than panicking mid-merge.
        if !entry.is_table() {
            *entry = Value::Table(Table::new());
        }
        current = entry.as_table_mut().expect("just ensured a table");
    }
}

fn table_at<'a>(table: &'a mut Table, path: &[&str]) -> &'a mut Table {
    let mut current = table;
    for segment in path {
        current = current
            .get_mut(*segment)
            .and_then(Value::as_table_mut)
            .expect("section ensured before access");
    }
    current
}

fn absolute_display(path: &Path) -> String {
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string()
}

/// Render a configuration table as TOML text with section banners, in the
/// canonical section order.
pub fn render_toml(config: &Table) -> String {
    let mut out = String::new();

    out.push_str("# Delphi Build Configuration\n#\n# Extended configuration file\n");
    if let Some(version) = config
        .get("delphi")
        .and_then(Value::as_table)
        .and_then(|d| d.get("version"))
        .and_then(Value::as_str)
    {
        out.push_str(&format!("# Delphi Version: {}\n", version));
    }
    out.push_str("#\n\n");

    if let Some(delphi) = config.get("delphi").and_then(Value::as_table) {
        push_banner(&mut out, "Delphi Installation Configuration");
        push_section(&mut out, "delphi", delphi);
    }

    if let Some(system) = nested(config, &["paths", "system"]) {
        push_banner(&mut out, "System Library Paths");
        push_section(&mut out, "paths.system", system);
    }

    if let Some(libraries) = nested(config, &["paths", "libraries"]) {
        push_banner(&mut out, "Third-Party Library Paths");
        push_section(&mut out, "paths.libraries", libraries);
    }

    if let Some(flags) = nested(config, &["compiler", "flags"]) {
        push_banner(&mut out, "Compiler Flags");
        push_section(&mut out, "compiler.flags", flags);
        // Platform/config specific flag tables nest one more level down.
        for (platform_key, platform_value) in flags {
            if let Some(platform_table) = platform_value.as_table() {
                for (config_key, config_value) in platform_table {
                    if let Some(config_table) = config_value.as_table() {
                        push_section(
                            &mut out,
                            &format!("compiler.flags.{}.{}", platform_key, config_key),
                            config_table,
                        );
                    }
                }
            }
        }
    }

    if let Some(namespaces) = nested(config, &["compiler", "namespaces"]) {
        push_banner(&mut out, "Namespace Prefixes");
        push_section(&mut out, "compiler.namespaces", namespaces);
    }

    if let Some(aliases) = nested(config, &["compiler", "aliases"]) {
        push_banner(&mut out, "Unit Aliases");
        push_section(&mut out, "compiler.aliases", aliases);
    }

    if let Some(sdk) = config.get("linux_sdk").and_then(Value::as_table) {
        push_banner(&mut out, "Linux SDK Configuration");
        push_section(&mut out, "linux_sdk", sdk);
    }

    out
}

fn nested<'a>(table: &'a Table, path: &[&str]) -> Option<&'a Table> {
    let mut current = table;
    for segment in path {
        current = current.get(*segment)?.as_table()?;
    }
    Some(current)
}

fn push_banner(out: &mut String, title: &str) {
    out.push_str(&format!("# {}\n# {}\n# {}\n", "=".repeat(77), title, "=".repeat(77)));
}

fn push_section(out: &mut String, name: &str, section: &Table) {
    out.push_str(&format!("[{}]\n", name));
    for (key, value) in section {
        match value {
            Value::String(s) => {
                out.push_str(&format!("{} = \"{}\"\n", quote_key(key), s));
            }
            Value::Boolean(b) => {
                out.push_str(&format!("{} = {}\n", quote_key(key), b));
            }
            Value::Integer(i) => {
                out.push_str(&format!("{} = {}\n", quote_key(key), i));
            }
            Value::Float(f) => {
                out.push_str(&format!("{} = {}\n", quote_key(key), f));
            }
            Value::Array(items) => {
                if items.len() > 4 {
                    out.push_str(&format!("{} = [\n", quote_key(key)));
                    for item in items {
                        if let Some(s) = item.as_str() {
                            out.push_str(&format!("    \"{}\",\n", s));
                        }
                    }
                    out.push_str("]\n");
                } else {
                    let rendered: Vec<String> = items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(|s| format!("\"{}\"", s))
                        .collect();
                    out.push_str(&format!("{} = [{}]\n", quote_key(key), rendered.join(", ")));
                }
            }
            // Nested tables become their own sections; handled by callers.
            Value::Table(_) | Value::Datetime(_) => {}
        }
    }
    out.push('\n');
}

/// Quote keys that are not bare TOML keys (unit alias names contain dots).
fn quote_key(key: &str) -> String {
    let bare = key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if bare {
        key.to_string()
    } else {
        format!("\"{}\"", key)
    }
}
