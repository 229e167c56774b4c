//! Shared locale grammar for IDE build logs and compiler output.
//!
//! The build-log extractor and the diagnostic parser must agree on what a
//! diagnostic-shaped line looks like: the extractor stops collecting
//! continuation lines where the diagnostic parser starts matching. Both
//! consult this one strategy table instead of carrying duplicated pattern
//! sets.
//!
//! Two locales are supported simultaneously (the IDE and the compiler can run
//! under different locales, so a single stream may mix both):
//! - English: `Error` / `Warning` / `Hint` / `Fatal`, `command line`,
//!   `Build succeeded`
//! - German: `Fehler` / `Warnung` / `Hinweis` / `Schwerwiegend`,
//!   `Befehlszeile`, `Erfolg`

use crate::models::{BuildConfig, Platform, Severity};
use regex::Regex;
use std::sync::OnceLock;

/// Per-locale marker strings.
#[derive(Debug, Clone, Copy)]
pub struct LocaleMarkers {
    /// Token introducing a tool command line ("dcc32 command line for ...")
    pub command_line: &'static str,
    /// Markers that terminate the build transcript
    pub end_markers: &'static [&'static str],
}

/// English IDE locale.
pub const ENGLISH: LocaleMarkers = LocaleMarkers {
    command_line: "command line",
    end_markers: &["Build succeeded", "Build failed", "Success", "Failed"],
};

/// German IDE locale.
pub const GERMAN: LocaleMarkers = LocaleMarkers {
    command_line: "Befehlszeile",
    end_markers: &["Erfolg", "Fehlgeschlagen"],
};

/// A diagnostic line parsed out of compiler output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDiagnostic {
    /// Source file, empty for location-free messages
    pub file: String,
    /// Line number, 0 for location-free messages
    pub line: u32,
    /// Column number if the compiler reported one
    pub column: Option<u32>,
    /// Severity mapped from the locale-specific word
    pub severity: Severity,
    /// Message code like "E2003"
    pub code: Option<String>,
    /// Message text
    pub message: String,
}

/// Platform/configuration header field recovered from a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderField {
    Config(BuildConfig),
    Platform(Platform),
}

/// The compiled grammar. Obtain via [`Grammar::shared`].
pub struct Grammar {
    locales: [LocaleMarkers; 2],
    located: Regex,
    simple: Regex,
    project_header: Regex,
    kv_header: Regex,
    lines_compiled: Regex,
}

impl Grammar {
    /// The process-wide grammar instance.
    pub fn shared() -> &'static Grammar {
        static GRAMMAR: OnceLock<Grammar> = OnceLock::new();
        GRAMMAR.get_or_init(Grammar::new)
    }

    fn new() -> Self {
        // Located messages: FileName.pas(line[,col]) Severity[:] [CODE][:] message
        // e.g. `Unit1.pas(42,15): Error: E2003 Undeclared identifier: 'Foo'`
        //      `Unit1.pas(42) Fehler: E2003 Undeklarierter Bezeichner: 'Foo'`
        let located = Regex::new(
            r"(?i)^(.+?)\((\d+)(?:,(\d+))?\)\s*:?\s*(Error|Warning|Hint|Fatal|Fehler|Warnung|Hinweis|Schwerwiegend)\s*:?\s*([EWHF]\d+)?\s*:?\s*(.+)$",
        )
        .expect("located diagnostic pattern");

        // Location-free messages: Severity[:] [CODE][:] message
        // e.g. `Fatal: F1026 File not found: 'System.pas'`
        let simple = Regex::new(
            r"(?i)^(Error|Warning|Hint|Fatal|Fehler|Warnung|Hinweis|Schwerwiegend)\s*:?\s*([EWHF]\d+)?\s*:?\s*(.+)$",
        )
        .expect("simple diagnostic pattern");

        // Project header: `Building TestApp.dproj (Debug, Win32)` or
        // `Erzeugen von TestApp.dproj (Debug, Win32)`
        let project_header = Regex::new(
            r"(?:Building|Erzeugen von)\s+(.+?)\.dproj\s*\(\s*([A-Za-z]+)\s*,\s*([A-Za-z0-9]+)\s*\)",
        )
        .expect("project header pattern");

        // Key-value header lines some logs carry:
        // `Configuration: Debug` / `Platform: Win64x`
        let kv_header = Regex::new(r"(?i)^\s*(Configuration|Platform)\s*:\s*([A-Za-z0-9]+)\s*$")
            .expect("kv header pattern");

        // Compiler summary: `123456 lines, 2.5 seconds` / `123456 Zeilen, ...`
        let lines_compiled =
            Regex::new(r"(?i)(\d+)\s+(?:lines?|Zeilen)").expect("lines-compiled pattern");

        Self {
            locales: [ENGLISH, GERMAN],
            located,
            simple,
            project_header,
            kv_header,
            lines_compiled,
        }
    }

    /// Map a locale-specific severity word to a [`Severity`].
    pub fn severity_from_word(word: &str) -> Option<Severity> {
        match word.to_ascii_lowercase().as_str() {
            "error" | "fehler" => Some(Severity::Error),
            "fatal" | "schwerwiegend" => Some(Severity::Fatal),
            "warning" | "warnung" => Some(Severity::Warning),
            "hint" | "hinweis" => Some(Severity::Hint),
            _ => None,
        }
    }

    /// Whether `line` carries a tool command-line marker in any locale.
    ///
    /// The marker token itself is matched case-sensitively; surrounding text
    /// is unconstrained (real logs vary in indentation and tool prefix).
    pub fn is_command_marker(&self, line: &str) -> bool {
        self.locales.iter().any(|l| line.contains(l.command_line))
    }

    /// Whether `line` is a build success/failure marker in any locale.
    ///
    /// The marker must be the whole line or be followed by a word break, so
    /// "Successor unit compiled" never matches "Success".
    pub fn is_end_marker(&self, line: &str) -> bool {
        let trimmed = line.trim();
        self.locales
            .iter()
            .flat_map(|l| l.end_markers.iter())
            .any(|m| {
                trimmed == *m
                    || (trimmed.starts_with(*m)
                        && trimmed[m.len()..]
                            .chars()
                            .next()
                            .is_some_and(|c| !c.is_alphanumeric()))
            })
    }

    /// Whether `line` matches the diagnostic grammar (either form).
    ///
    /// This is the authoritative check the build-log extractor uses to stop
    /// collecting continuation lines: anything this returns true for is a
    /// diagnostic, never a search path.
    pub fn is_diagnostic_line(&self, line: &str) -> bool {
        self.parse_diagnostic(line).is_some()
    }

    /// Parse a single line as a diagnostic, trying the located form first.
    pub fn parse_diagnostic(&self, line: &str) -> Option<RawDiagnostic> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        if let Some(caps) = self.located.captures(line) {
            let file = caps.get(1).map(|m| m.as_str().trim().to_string())?;
            let severity = Self::severity_from_word(caps.get(4)?.as_str())?;
            let line_num: u32 = caps.get(2)?.as_str().parse().ok()?;
            let column = caps.get(3).and_then(|m| m.as_str().parse().ok());
            let code = caps.get(5).map(|m| m.as_str().to_ascii_uppercase());
            let message = caps.get(6).map(|m| m.as_str().trim().to_string())?;
            return Some(RawDiagnostic {
                file,
                line: line_num,
                column,
                severity,
                code,
                message,
            });
        }

        if let Some(caps) = self.simple.captures(line) {
            let severity = Self::severity_from_word(caps.get(1)?.as_str())?;
            let code = caps.get(2).map(|m| m.as_str().to_ascii_uppercase());
            let message = caps.get(3).map(|m| m.as_str().trim().to_string())?;
            return Some(RawDiagnostic {
                file: String::new(),
                line: 0,
                column: None,
                severity,
                code,
                message,
            });
        }

        None
    }

    /// Parse a `Building X.dproj (Config, Platform)` header in any locale.
    pub fn parse_project_header(&self, line: &str) -> Option<(String, BuildConfig, Platform)> {
        let caps = self.project_header.captures(line)?;
        let name = caps.get(1)?.as_str().to_string();
        let config = BuildConfig::parse(caps.get(2)?.as_str())?;
        let platform = Platform::parse(caps.get(3)?.as_str())?;
        Some((name, config, platform))
    }

    /// Parse a `Configuration:` / `Platform:` header line.
    pub fn parse_kv_header(&self, line: &str) -> Option<HeaderField> {
        let caps = self.kv_header.captures(line)?;
        let key = caps.get(1)?.as_str().to_ascii_lowercase();
        let value = caps.get(2)?.as_str();
        match key.as_str() {
            "configuration" => BuildConfig::parse(value).map(HeaderField::Config),
            "platform" => Platform::parse(value).map(HeaderField::Platform),
            _ => None,
        }
    }

    /// Extract the `NNN lines` compiled count from a summary line.
    pub fn parse_lines_compiled(&self, line: &str) -> Option<u64> {
        let caps = self.lines_compiled.captures(line)?;
        caps.get(1)?.as_str().parse().ok()
    }
}
