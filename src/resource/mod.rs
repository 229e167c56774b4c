//! Version-resource compilation: generate a .vrc script and compile it to a
//! .res with cgrc.exe.
//!
//! This is a pre-step of the main compilation. When a project descriptor
//! carries version metadata, the orchestrator runs this first and refuses
//! to invoke the main compiler if it fails. The generated .vrc is removed
//! on every path, matching the IDE's behavior; a leftover script is a
//! defect, not cosmetics.

use crate::compile::process::run_with_timeout;
use crate::models::{ResourceCompilationResult, VersionInfo};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Wall-clock timeout for the resource compiler, in seconds.
pub const RESOURCE_TIMEOUT_SECS: u64 = 30;

/// Windows codepage identifier for the string block (1252, Latin-1).
const CODEPAGE_HEX: &str = "04E4";

/// Generates .vrc (version resource script) content from a [`VersionInfo`].
pub struct VrcGenerator;

impl VrcGenerator {
    /// Generate the .vrc file content (Windows RC format).
    ///
    /// The StringFileInfo block identifier is the locale ID in hex followed
    /// by the codepage; it is computed from the locale, since projects ship
    /// with locales other than 1033.
    pub fn generate(version_info: &VersionInfo) -> String {
        let vi = version_info;
        let locale_hex = format!("{:04X}", vi.locale);

        let mut lines = vec![
            "1 VERSIONINFO".to_string(),
            format!(
                "FILEVERSION {},{},{},{}",
                vi.major, vi.minor, vi.release, vi.build
            ),
            format!(
                "PRODUCTVERSION {},{},{},{}",
                vi.major, vi.minor, vi.release, vi.build
            ),
            "FILEFLAGSMASK 0x3FL".to_string(),
            "FILEFLAGS 0x0L".to_string(),
            "FILEOS 0x40004L".to_string(),
            "FILETYPE 0x1L".to_string(),
            "FILESUBTYPE 0x0L".to_string(),
            "BEGIN".to_string(),
            "  BLOCK \"StringFileInfo\"".to_string(),
            "  BEGIN".to_string(),
            format!("    BLOCK \"{}{}\"", locale_hex, CODEPAGE_HEX),
            "    BEGIN".to_string(),
        ];

        for (key, value) in &vi.keys {
            if value.is_empty() {
                lines.push(format!("      VALUE \"{}\", \"\\0\"", key));
            } else {
                lines.push(format!("      VALUE \"{}\", \"{}\\0\"", key, value));
            }
        }

        lines.extend([
            "    END".to_string(),
            "  END".to_string(),
            "  BLOCK \"VarFileInfo\"".to_string(),
            "  BEGIN".to_string(),
            format!("    VALUE \"Translation\", 0x{} 0x{}", locale_hex, CODEPAGE_HEX),
            "  END".to_string(),
            "END".to_string(),
            String::new(),
        ]);

        lines.join("\n")
    }
}

/// Removes the generated .vrc on drop so no exit path leaves it behind.
struct VrcFileGuard {
    path: PathBuf,
}

impl Drop for VrcFileGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Compiles version resources using cgrc.exe.
pub struct ResourceCompiler {
    cgrc_path: PathBuf,
}

impl ResourceCompiler {
    /// Resource compiler at the standard location under a Delphi root.
    pub fn new(delphi_root: &Path) -> Self {
        Self {
            cgrc_path: delphi_root.join("bin").join("cgrc.exe"),
        }
    }

    /// Resource compiler at an explicit path (e.g. recovered from a build
    /// log).
    pub fn with_path(cgrc_path: PathBuf) -> Self {
        Self { cgrc_path }
    }

    /// Generate `<project>.vrc` in `project_dir` and compile it to
    /// `<project>.res`.
    ///
    /// Failures are reported in the result, never raised: the caller
    /// decides how to surface them.
    pub fn compile_version_resource(
        &self,
        project_name: &str,
        project_dir: &Path,
        version_info: &VersionInfo,
    ) -> ResourceCompilationResult {
        if !self.cgrc_path.exists() {
            return ResourceCompilationResult {
                success: false,
                res_file: None,
                error_output: Some(format!(
                    "Resource compiler not found: {}",
                    self.cgrc_path.display()
                )),
            };
        }

        let vrc_name = format!("{}.vrc", project_name);
        let res_name = format!("{}.res", project_name);
        let vrc_path = project_dir.join(&vrc_name);
        let res_path = project_dir.join(&res_name);

        let content = VrcGenerator::generate(version_info);
        if let Err(e) = std::fs::write(&vrc_path, content) {
            return ResourceCompilationResult {
                success: false,
                res_file: None,
                error_output: Some(format!("Could not write {}: {}", vrc_path.display(), e)),
            };
        }
        let _guard = VrcFileGuard {
            path: vrc_path.clone(),
        };

        debug!(vrc = %vrc_path.display(), "compiling version resource");

        let args = vec![
            "-c65001".to_string(),
            vrc_name,
            format!("-fo{}", res_name),
        ];

        match run_with_timeout(
            &self.cgrc_path,
            &args,
            project_dir,
            Duration::from_secs(RESOURCE_TIMEOUT_SECS),
        ) {
            Ok(result) if result.timed_out => ResourceCompilationResult {
                success: false,
                res_file: None,
                error_output: Some(format!(
                    "Resource compiler timed out after {} seconds",
                    RESOURCE_TIMEOUT_SECS
                )),
            },
            Ok(result) if result.exit_code != 0 => ResourceCompilationResult {
                success: false,
                res_file: None,
                error_output: Some(format!(
                    "Resource compiler failed:\n{}",
                    result.output.trim()
                )),
            },
            Ok(_) => ResourceCompilationResult {
                success: true,
                res_file: Some(res_path.display().to_string()),
                error_output: None,
            },
            Err(e) => ResourceCompilationResult {
                success: false,
                res_file: None,
                error_output: Some(format!("Resource compiler execution failed: {}", e)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn version_info(locale: u32) -> VersionInfo {
        let mut keys = BTreeMap::new();
        keys.insert("CompanyName".to_string(), "TestCo".to_string());
        keys.insert("FileDescription".to_string(), "Test App".to_string());
        keys.insert("InternalName".to_string(), String::new());
        VersionInfo {
            major: 2,
            minor: 5,
            release: 1,
            build: 42,
            locale,
            keys,
        }
    }

    // ==================== Script Generation Tests ====================

    #[test]
    fn test_vrc_version_lines() {
        let script = VrcGenerator::generate(&version_info(1033));
        assert!(script.contains("FILEVERSION 2,5,1,42"));
        assert!(script.contains("PRODUCTVERSION 2,5,1,42"));
    }

    #[test]
    fn test_vrc_locale_block_us_english() {
        let script = VrcGenerator::generate(&version_info(1033));
        // 1033 = 0x0409
        assert!(script.contains("BLOCK \"040904E4\""));
        assert!(script.contains("VALUE \"Translation\", 0x0409 0x04E4"));
    }

    #[test]
    fn test_vrc_locale_block_german() {
        let script = VrcGenerator::generate(&version_info(1031));
        // 1031 = 0x0407; the block id is derived, not hard-coded
        assert!(script.contains("BLOCK \"040704E4\""));
        assert!(script.contains("VALUE \"Translation\", 0x0407 0x04E4"));
        assert!(!script.contains("0409"));
    }

    #[test]
    fn test_vrc_key_values() {
        let script = VrcGenerator::generate(&version_info(1033));
        assert!(script.contains("VALUE \"CompanyName\", \"TestCo\\0\""));
        assert!(script.contains("VALUE \"FileDescription\", \"Test App\\0\""));
        // Empty values still get the terminator
        assert!(script.contains("VALUE \"InternalName\", \"\\0\""));
    }

    // ==================== Compilation Tests ====================

    #[test]
    fn test_missing_cgrc_reports_not_found() {
        let rc = ResourceCompiler::with_path(PathBuf::from("/no/such/cgrc.exe"));
        let result = rc.compile_version_resource(
            "TestApp",
            Path::new("/tmp"),
            &version_info(1033),
        );
        assert!(!result.success);
        assert!(result.error_output.unwrap().contains("not found"));
    }

    #[test]
    #[cfg(unix)]
    fn test_successful_compile_removes_vrc() {
        use crate::test_utils::{TestEnv, write_fake_tool};

        let env = TestEnv::new();
        let cgrc = write_fake_tool(env.path(), "cgrc.exe", "ok", 0);

        let rc = ResourceCompiler::with_path(cgrc);
        let result = rc.compile_version_resource("TestApp", env.path(), &version_info(1033));

        assert!(result.success);
        assert!(result.res_file.unwrap().ends_with("TestApp.res"));
        // The script is cleaned up on success.
        assert!(!env.path().join("TestApp.vrc").exists());
    }

    #[test]
    #[cfg(unix)]
    fn test_failed_compile_reports_output_and_removes_vrc() {
        use crate::test_utils::{TestEnv, write_fake_tool};

        let env = TestEnv::new();
        let cgrc = write_fake_tool(env.path(), "cgrc.exe", "syntax error in script", 2);

        let rc = ResourceCompiler::with_path(cgrc);
        let result = rc.compile_version_resource("TestApp", env.path(), &version_info(1033));

        assert!(!result.success);
        assert!(result.error_output.unwrap().contains("syntax error"));
        // Cleanup holds on the failure path too.
        assert!(!env.path().join("TestApp.vrc").exists());
    }

    #[test]
    fn test_standard_location_under_root() {
        let rc = ResourceCompiler::new(Path::new("/delphi/root"));
        assert_eq!(rc.cgrc_path, PathBuf::from("/delphi/root/bin/cgrc.exe"));
    }
}
