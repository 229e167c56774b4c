//! Compiler output parsing: raw text to severity-filtered diagnostics.
//!
//! The line grammar lives in [`crate::grammar`] and is shared with the
//! build-log extractor. Output may mix locales (the IDE and the compiler
//! can disagree), so every line is tried against all supported locale
//! patterns at once.
//!
//! Only errors and fatals reach the caller; warnings and hints are counted
//! and dropped.

use crate::grammar::Grammar;
use crate::models::{CompilationStatistics, Diagnostic, Severity};

/// Parses compiler output, filtering warnings and hints.
#[derive(Debug, Default)]
pub struct OutputParser;

impl OutputParser {
    /// Create an output parser.
    pub fn new() -> Self {
        Self
    }

    /// Parse raw compiler output into diagnostics and statistics.
    pub fn parse(&self, output: &str) -> (Vec<Diagnostic>, CompilationStatistics) {
        let grammar = Grammar::shared();
        let mut errors = Vec::new();
        let mut statistics = CompilationStatistics::default();

        for line in output.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(raw) = grammar.parse_diagnostic(line) {
                match raw.severity {
                    Severity::Warning => statistics.warnings_filtered += 1,
                    Severity::Hint => statistics.hints_filtered += 1,
                    Severity::Error | Severity::Fatal => {
                        errors.push(Diagnostic {
                            file: if raw.file.is_empty() {
                                "(unknown)".to_string()
                            } else {
                                raw.file
                            },
                            line: raw.line,
                            column: raw.column,
                            severity: raw.severity,
                            code: raw.code,
                            message: raw.message,
                        });
                    }
                }
                continue;
            }

            if let Some(lines_compiled) = grammar.parse_lines_compiled(line) {
                statistics.lines_compiled = lines_compiled;
            }
        }

        (errors, statistics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIXED_OUTPUT: &str = "\
Embarcadero Delphi for Win32 compiler version 36.0
Copyright (c) 1983,2024 Embarcadero Technologies, Inc.
Unit1.pas(42,15): Error: E2003 Undeclared identifier: 'Foo'
Unit1.pas(50): Warning: W1011 Text after final 'END.'
Unit2.pas(7,3): Hint: H2443 Inline function has not been expanded
Unit3.pas(12,1) Fehler: E2029 ';' erwartet
Unit3.pas(19,8) Warnung: W1000 Symbol ist veraltet
Fatal: F1026 File not found: 'System.pas'
123456 lines, 2.52 seconds
";

    // ==================== Filtering Tests ====================

    #[test]
    fn test_errors_kept_warnings_hints_filtered() {
        let (errors, stats) = OutputParser::new().parse(MIXED_OUTPUT);

        assert_eq!(errors.len(), 3);
        assert_eq!(stats.warnings_filtered, 2);
        assert_eq!(stats.hints_filtered, 1);
    }

    #[test]
    fn test_mixed_locales_in_one_stream() {
        let (errors, _) = OutputParser::new().parse(MIXED_OUTPUT);

        // English error
        assert_eq!(errors[0].code.as_deref(), Some("E2003"));
        assert_eq!(errors[0].file, "Unit1.pas");
        assert_eq!(errors[0].line, 42);
        assert_eq!(errors[0].column, Some(15));

        // German error
        assert_eq!(errors[1].code.as_deref(), Some("E2029"));
        assert_eq!(errors[1].severity, Severity::Error);

        // Location-free fatal
        assert_eq!(errors[2].severity, Severity::Fatal);
        assert_eq!(errors[2].file, "(unknown)");
        assert_eq!(errors[2].line, 0);
    }

    #[test]
    fn test_lines_compiled_statistic() {
        let (_, stats) = OutputParser::new().parse(MIXED_OUTPUT);
        assert_eq!(stats.lines_compiled, 123456);
    }

    #[test]
    fn test_empty_output() {
        let (errors, stats) = OutputParser::new().parse("");
        assert!(errors.is_empty());
        assert_eq!(stats, CompilationStatistics::default());
    }

    #[test]
    fn test_banner_lines_ignored() {
        let output = "Embarcadero Delphi for Win32 compiler version 36.0\nCompiling App.dpr\n";
        let (errors, stats) = OutputParser::new().parse(output);
        assert!(errors.is_empty());
        assert_eq!(stats.warnings_filtered, 0);
    }

    #[test]
    fn test_path_like_line_not_misread_as_diagnostic() {
        // A path with a parenthesized directory segment must not produce a
        // diagnostic.
        let output = r"Searching: c:\program files (x86)\embarcadero\studio\lib";
        let (errors, stats) = OutputParser::new().parse(output);
        assert!(errors.is_empty());
        assert_eq!(stats.warnings_filtered + stats.hints_filtered, 0);
    }

    #[test]
    fn test_german_fatal_kept() {
        let output = "Schwerwiegend: F1026 Datei nicht gefunden: 'System.pas'\n";
        let (errors, _) = OutputParser::new().parse(output);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].severity, Severity::Fatal);
    }

    #[test]
    fn test_warning_with_w_code_never_in_errors() {
        let output = "Unit1.pas(5,1): Warning: W1011 Something\n";
        let (errors, stats) = OutputParser::new().parse(output);
        assert!(errors.is_empty());
        assert_eq!(stats.warnings_filtered, 1);
    }
}
