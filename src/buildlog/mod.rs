//! Build-log extraction: recover a compiler invocation from IDE build logs.
//!
//! IDE build logs are free-form, locale-variant text that users copy out of
//! the Messages pane. Somewhere inside is the full compiler command line,
//! wrapped across physical lines, carrying every search path the IDE
//! resolved. This module finds that invocation, reassembles it, and
//! tokenizes it into a [`BuildLogInfo`].
//!
//! Line classification (what is a continuation, what is a diagnostic, what
//! ends the transcript) is delegated to [`crate::grammar`], which the
//! diagnostic parser shares.

use crate::grammar::{Grammar, HeaderField};
use crate::models::{BuildConfig, Platform};
use crate::pathutil;
use crate::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;
use tracing::debug;

/// Everything recovered from one build log. Immutable after parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildLogInfo {
    /// Path to the compiler executable, forward-slash normalized
    pub compiler_path: String,

    /// Detected Delphi version (e.g. "23.0"), "unknown" when absent
    pub delphi_version: String,

    /// Target platform
    pub platform: Platform,

    /// Build configuration
    pub build_config: BuildConfig,

    /// All detected search paths, forward-slash normalized, deduplicated
    /// case-insensitively with order preserved
    #[serde(default)]
    pub search_paths: Vec<String>,

    /// Namespace prefixes from the -NS flag
    #[serde(default)]
    pub namespace_prefixes: Vec<String>,

    /// Unit aliases from the -A flag (old name to new name)
    #[serde(default)]
    pub unit_aliases: BTreeMap<String, String>,

    /// Conditional defines from the -D flag
    #[serde(default)]
    pub defines: Vec<String>,

    /// Remaining compiler flags (switches, long options)
    #[serde(default)]
    pub compiler_flags: Vec<String>,

    /// Linux SDK sysroot from --syslibroot
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdk_sysroot: Option<String>,

    /// Linux SDK library paths from --libpath
    #[serde(default)]
    pub sdk_libpaths: Vec<String>,

    /// Path to the resource compiler (cgrc.exe) when the log shows a
    /// resource-compilation step
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_compiler_path: Option<String>,
}

impl BuildLogInfo {
    /// Root of the compiler installation (two levels above bin/dcc*.exe).
    pub fn compiler_root(&self) -> String {
        let path = Path::new(&self.compiler_path);
        path.parent()
            .and_then(Path::parent)
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Parses IDE build logs to extract compiler configuration.
pub struct BuildLogParser {
    content: String,
}

fn compiler_exe_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)([a-z]:[\\/][^"<>|]*?dcc(?:32|64|linux64)\.exe)"#)
            .expect("compiler path pattern")
    })
}

fn resource_exe_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)([a-z]:[\\/][^"<>|]*?cgrc\.exe)"#)
            .expect("resource compiler path pattern")
    })
}

fn version_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)studio[\\/]([\d.]+)").expect("version pattern"))
}

impl BuildLogParser {
    /// Create a parser over in-memory log text.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }

    /// Create a parser by reading a build log file.
    ///
    /// Invalid UTF-8 byte sequences are replaced rather than rejected; real
    /// logs mix codepages when the IDE locale differs from the console's.
    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(Self::new(String::from_utf8_lossy(&bytes).into_owned()))
    }

    /// Parse the build log and extract compiler information.
    pub fn parse(&self) -> Result<BuildLogInfo> {
        let grammar = Grammar::shared();
        let lines: Vec<&str> = self.content.lines().collect();

        // Header info anywhere in the log wins over path inference below.
        let mut header_platform = None;
        let mut header_config = None;
        for line in &lines {
            if let Some((_, config, platform)) = grammar.parse_project_header(line) {
                header_config.get_or_insert(config);
                header_platform.get_or_insert(platform);
            }
            match grammar.parse_kv_header(line) {
                Some(HeaderField::Config(c)) => {
                    header_config.get_or_insert(c);
                }
                Some(HeaderField::Platform(p)) => {
                    header_platform.get_or_insert(p);
                }
                None => {}
            }
        }

        let command = self.collect_command(&lines, grammar)?;
        debug!(len = command.len(), "reassembled compiler command");

        let compiler_path = compiler_exe_re()
            .captures(&command)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().replace('\\', "/"))
            .ok_or_else(|| {
                Error::UnrecognizedLog("could not extract compiler path from command".to_string())
            })?;

        let delphi_version = version_re()
            .captures(&compiler_path)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim_end_matches('.').to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let tokens = tokenize(&command);
        let mut extracted = Extracted::default();
        for token in &tokens {
            extracted.consume(token);
        }

        let platform = header_platform
            .unwrap_or_else(|| infer_platform(&compiler_path, &extracted.search_paths));
        let build_config = header_config.unwrap_or_else(|| infer_config(&command));

        let resource_compiler_path = self.extract_resource_compiler();

        Ok(BuildLogInfo {
            compiler_path,
            delphi_version,
            platform,
            build_config,
            search_paths: extracted.search_paths,
            namespace_prefixes: extracted.namespaces,
            unit_aliases: extracted.aliases,
            defines: extracted.defines,
            compiler_flags: extracted.flags,
            sdk_sysroot: extracted.sdk_sysroot,
            sdk_libpaths: extracted.sdk_libpaths,
            resource_compiler_path,
        })
    }

    /// Locate the compiler invocation line and join it with its
    /// continuation lines.
    ///
    /// Continuations are indented lines that are neither diagnostics nor
    /// end-of-build markers; collection also stops at the first
    /// non-indented line. Trailing backslash continuation markers from
    /// hand-copied logs are stripped before joining.
    fn collect_command(&self, lines: &[&str], grammar: &Grammar) -> Result<String> {
        // A locale command-line marker anchors the scan when present, so a
        // compiler path mentioned in earlier prose is not mistaken for the
        // invocation. Logs trimmed by hand may lack the marker line; the
        // exe path alone is accepted then.
        let marker = lines.iter().position(|line| grammar.is_command_marker(line));
        let start = marker
            .and_then(|idx| {
                lines[idx..]
                    .iter()
                    .position(|line| compiler_exe_re().is_match(line))
                    .map(|offset| idx + offset)
            })
            .or_else(|| {
                lines
                    .iter()
                    .position(|line| compiler_exe_re().is_match(line))
            })
            .ok_or_else(|| {
                Error::UnrecognizedLog("no compiler invocation marker found".to_string())
            })?;

        let mut parts = vec![lines[start].trim().trim_end_matches('\\').trim().to_string()];

        for line in &lines[start + 1..] {
            let is_continuation = line.starts_with(' ') || line.starts_with('\t');
            if !is_continuation || line.trim().is_empty() {
                break;
            }
            if grammar.is_diagnostic_line(line) || grammar.is_end_marker(line) {
                break;
            }
            parts.push(line.trim().trim_end_matches('\\').trim().to_string());
        }

        Ok(parts.join(" "))
    }

    /// Extract the resource compiler path from a cgrc invocation line, if
    /// the log has one. Independent of the primary extraction: a missing
    /// resource step never fails the parse.
    fn extract_resource_compiler(&self) -> Option<String> {
        for line in self.content.lines() {
            if let Some(caps) = resource_exe_re().captures(line) {
                return Some(caps.get(1)?.as_str().replace('\\', "/"));
            }
        }
        None
    }
}

/// Split a reassembled command line into tokens.
///
/// Quoted segments are atomic even when they contain spaces or path
/// separators; the quote characters themselves are stripped, so
/// `-U"C:\a b";"C:\c"` becomes the single token `-UC:\a b;C:\c`.
fn tokenize(command: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in command.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}

/// Long flags that take a value and belong to SDK configuration, never to
/// the generic flag bucket. Captured bare (without their value) they are
/// worse than useless: passed through they crash the compiler.
const SDK_VALUE_FLAGS: [&str; 2] = ["--syslibroot", "--libpath"];

/// Flag prefixes whose values are output locations or link settings we do
/// not mine from logs. Ordered longest-first so prefix matching is
/// unambiguous.
const SKIPPED_VALUE_PREFIXES: [&str; 8] = ["-LE", "-LN", "-NU", "-NH", "-NB", "-NO", "-NX", "-E"];

#[derive(Default)]
struct Extracted {
    search_paths: Vec<String>,
    seen_paths: std::collections::HashSet<String>,
    namespaces: Vec<String>,
    aliases: BTreeMap<String, String>,
    defines: Vec<String>,
    flags: Vec<String>,
    sdk_sysroot: Option<String>,
    sdk_libpaths: Vec<String>,
}

impl Extracted {
    fn consume(&mut self, token: &str) {
        if !token.starts_with('-') {
            // Executable path, project file, or stray text.
            return;
        }

        // SDK flags first: allow-listed "requires value" long flags that
        // must never fall through to the generic bucket.
        if let Some(value) = token.strip_prefix("--syslibroot:") {
            if !value.is_empty() {
                self.sdk_sysroot = Some(value.replace('\\', "/"));
            }
            return;
        }
        if let Some(value) = token.strip_prefix("--libpath:") {
            for path in value.split(';').map(str::trim).filter(|p| !p.is_empty()) {
                self.sdk_libpaths.push(path.replace('\\', "/"));
            }
            return;
        }
        if SDK_VALUE_FLAGS.contains(&token) {
            // Bare form without a value: drop it entirely.
            return;
        }

        if let Some(list) = token.strip_prefix("-NS") {
            for ns in list.split(';').map(str::trim).filter(|s| !s.is_empty()) {
                if !self.namespaces.iter().any(|n| n.eq_ignore_ascii_case(ns)) {
                    self.namespaces.push(ns.to_string());
                }
            }
            return;
        }

        if let Some(list) = token.strip_prefix("-A") {
            for def in list.split(';').map(str::trim).filter(|s| !s.is_empty()) {
                if let Some((old, new)) = def.split_once('=') {
                    self.aliases
                        .entry(old.trim().to_string())
                        .or_insert_with(|| new.trim().to_string());
                }
            }
            return;
        }

        if let Some(list) = token.strip_prefix("-D") {
            // Not -$D+ style: that is handled below via the '$' arm.
            if !list.starts_with('$') {
                for def in list.split(';').map(str::trim).filter(|s| !s.is_empty()) {
                    if !self.defines.iter().any(|d| d == def) {
                        self.defines.push(def.to_string());
                    }
                }
                return;
            }
        }

        for prefix in ["-U", "-I", "-R", "-O"] {
            if let Some(list) = token.strip_prefix(prefix) {
                // -O alone is a bare flag; only treat as a path list when a
                // value follows.
                if !list.is_empty() && !list.starts_with('$') {
                    self.consume_path_list(list);
                    return;
                }
            }
        }

        if SKIPPED_VALUE_PREFIXES
            .iter()
            .any(|p| token.starts_with(p) && token.len() > p.len())
        {
            return;
        }

        // Everything left is a generic flag: --long-options, -$X+/-$X-
        // compiler switches (trailing numeric or +/- modifiers stay part of
        // the token, e.g. -$D0), -TX.ext, single letters.
        if !self.flags.iter().any(|f| f == token) {
            self.flags.push(token.to_string());
        }
    }

    fn consume_path_list(&mut self, list: &str) {
        for raw in list.split(';') {
            let path = raw.trim();
            // Must look like a path and not like flag spill-over.
            if path.len() < 3 || path.starts_with('-') || path.starts_with('$') {
                continue;
            }
            if !path.contains(':') && !path.contains('\\') && !path.contains('/') {
                continue;
            }

            // The IDE's mangled $(USERDIR)-style placeholders are repaired
            // here so no recovered path ever carries them.
            let repaired = pathutil::repair_corrupted_placeholders(path);
            let normalized = repaired.replace('\\', "/");
            let key = normalized.to_ascii_lowercase();
            if self.seen_paths.insert(key) {
                self.search_paths.push(normalized);
            }
        }
    }
}

/// Infer the platform from the compiler binary and recovered search paths.
///
/// Win64x shares dcc64.exe with Win64, so the narrower variant must be
/// checked in the paths before the broader one: a single `lib/win64x`
/// segment outweighs the binary name.
fn infer_platform(compiler_path: &str, search_paths: &[String]) -> Platform {
    let exe = compiler_path.to_ascii_lowercase();
    if exe.contains("dcclinux64") {
        return Platform::Linux64;
    }

    let haystack: Vec<String> = search_paths.iter().map(|p| p.to_ascii_lowercase()).collect();
    // Most specific first.
    for (needle, platform) in [
        ("win64x", Platform::Win64x),
        ("win64", Platform::Win64),
        ("win32", Platform::Win32),
        ("linux64", Platform::Linux64),
    ] {
        if haystack.iter().any(|p| p.contains(needle)) {
            return platform;
        }
    }

    if exe.contains("dcc32") {
        Platform::Win32
    } else {
        Platform::Win64
    }
}

/// Infer the build configuration from debug-tagged paths in the command.
fn infer_config(command: &str) -> BuildConfig {
    let lower = command.to_ascii_lowercase();
    if lower.contains("\\debug") || lower.contains("/debug") {
        BuildConfig::Debug
    } else {
        BuildConfig::Release
    }
}
