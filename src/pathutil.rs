//! Path helpers: comparison normalization, placeholder handling, and
//! WSL-to-Windows conversion.
//!
//! Paths in this crate come from three hostile sources: IDE build logs
//! (backslashes, quotes, occasionally corrupted placeholders), TOML config
//! files (forward slashes, `${USERNAME}` placeholders), and MCP clients
//! running inside WSL (`/mnt/c/...` mounts). Everything funnels through the
//! helpers here before being compared or written out.

use regex::Regex;
use std::sync::OnceLock;

/// Environment variable naming the invoking user, expanded in config paths.
pub const USERNAME_VAR: &str = "USERNAME";

/// Normalize a path string for duplicate detection.
///
/// Lowercase, forward slashes, no trailing slash, `${USERNAME}` expanded to
/// the invoking user. Two paths are duplicates exactly when their normalized
/// forms are equal, so `C:\Libs\Foo` and `c:/libs/foo/` collapse together.
pub fn normalize_for_comparison(path: &str) -> String {
    let mut normalized = path.to_ascii_lowercase().replace('\\', "/");
    while normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }

    if let Ok(username) = std::env::var(USERNAME_VAR) {
        if !username.is_empty() {
            normalized = normalized.replace("${username}", &username.to_ascii_lowercase());
        }
    }

    normalized
}

/// Rewrite the known corrupted environment-variable placeholders.
///
/// The IDE occasionally emits `$(USERDIR)`-style placeholders with the first
/// bytes mangled by an encoding round-trip (`$` 0x24 becomes `\u{00BD}`
/// 0xBD, `%` replaces `)`). This is a fixed, observed-in-the-wild
/// substitution, not a general decoding rule.
pub fn repair_corrupted_placeholders(path: &str) -> String {
    path.replace("\u{00BD}SUSERDIR%", "${USERDIR}")
        .replace("\u{00BD}SUSERNAME%", "${USERNAME}")
}

/// Format a path for TOML output.
///
/// Repairs corrupted placeholders, optionally substitutes the invoking
/// user's home prefix with `C:/Users/${USERNAME}` (both separator
/// conventions, case-insensitive), and normalizes to forward slashes.
pub fn format_for_toml(path: &str, use_env_vars: bool) -> String {
    let mut path_str = repair_corrupted_placeholders(path);

    if use_env_vars {
        if let Ok(username) = std::env::var(USERNAME_VAR) {
            if !username.is_empty() {
                let lower = path_str.to_ascii_lowercase();
                let pattern_bs = format!("c:\\users\\{}", username.to_ascii_lowercase());
                let pattern_fs = format!("c:/users/{}", username.to_ascii_lowercase());
                if let Some(idx) = lower.find(&pattern_bs) {
                    path_str = format!(
                        "{}C:/Users/${{USERNAME}}{}",
                        &path_str[..idx],
                        &path_str[idx + pattern_bs.len()..]
                    );
                } else if let Some(idx) = lower.find(&pattern_fs) {
                    path_str = format!(
                        "{}C:/Users/${{USERNAME}}{}",
                        &path_str[..idx],
                        &path_str[idx + pattern_fs.len()..]
                    );
                }
            }
        }
    }

    path_str.replace('\\', "/")
}

/// Expand `${VAR}` environment placeholders in a string.
///
/// Unknown variables are left untouched so the failure is visible in the
/// resulting path rather than silently collapsing to an empty segment.
pub fn expand_env_placeholders(value: &str) -> String {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    let re = PLACEHOLDER.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("placeholder pattern"));

    re.replace_all(value, |caps: &regex::Captures<'_>| {
        let name = &caps[1];
        std::env::var(name).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}

/// Convert a WSL mount path to its Windows form when targeting Windows.
///
/// MCP clients running inside WSL send `/mnt/x/git/Proj.dproj` while the
/// compiler is a Windows process expecting `X:\git\Proj.dproj`. On
/// non-Windows hosts the path is returned unchanged.
pub fn convert_wsl_path(path_str: &str) -> String {
    if !cfg!(windows) {
        return path_str.to_string();
    }
    convert_wsl_path_unchecked(path_str)
}

/// WSL conversion without the host-OS gate. Split out for testability on
/// non-Windows hosts.
pub fn convert_wsl_path_unchecked(path_str: &str) -> String {
    static WSL_MOUNT: OnceLock<Regex> = OnceLock::new();
    let re = WSL_MOUNT
        .get_or_init(|| Regex::new(r"^/mnt/([a-zA-Z])(/.*)?$").expect("wsl mount pattern"));

    match re.captures(path_str) {
        Some(caps) => {
            let drive = caps[1].to_ascii_uppercase();
            let rest = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            format!("{}:{}", drive, rest.replace('/', "\\"))
        }
        None => path_str.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    // ==================== Normalization Tests ====================

    #[test]
    fn test_normalize_case_and_separator_insensitive() {
        assert_eq!(
            normalize_for_comparison(r"C:\Libs\Foo"),
            normalize_for_comparison("c:/libs/foo")
        );
    }

    #[test]
    fn test_normalize_strips_trailing_slash() {
        assert_eq!(
            normalize_for_comparison("c:/libs/foo/"),
            normalize_for_comparison("c:/libs/foo")
        );
    }

    #[test]
    #[serial]
    fn test_normalize_expands_username_placeholder() {
        unsafe { std::env::set_var(USERNAME_VAR, "Alice") };
        assert_eq!(
            normalize_for_comparison("C:/Users/${USERNAME}/Libs"),
            "c:/users/alice/libs"
        );
        unsafe { std::env::remove_var(USERNAME_VAR) };
    }

    // ==================== Placeholder Tests ====================

    #[test]
    fn test_repair_corrupted_userdir() {
        assert_eq!(
            repair_corrupted_placeholders("\u{00BD}SUSERDIR%/Sources"),
            "${USERDIR}/Sources"
        );
    }

    #[test]
    fn test_repair_corrupted_username() {
        assert_eq!(
            repair_corrupted_placeholders("C:/Users/\u{00BD}SUSERNAME%/Libs"),
            "C:/Users/${USERNAME}/Libs"
        );
    }

    #[test]
    fn test_repair_leaves_clean_paths_alone() {
        assert_eq!(
            repair_corrupted_placeholders("C:/Users/${USERNAME}/Libs"),
            "C:/Users/${USERNAME}/Libs"
        );
    }

    #[test]
    #[serial]
    fn test_expand_env_placeholders() {
        unsafe { std::env::set_var("DCB_TEST_VAR", "value42") };
        assert_eq!(expand_env_placeholders("x/${DCB_TEST_VAR}/y"), "x/value42/y");
        // Unknown variables stay visible
        assert_eq!(
            expand_env_placeholders("x/${DCB_NO_SUCH_VAR}/y"),
            "x/${DCB_NO_SUCH_VAR}/y"
        );
        unsafe { std::env::remove_var("DCB_TEST_VAR") };
    }

    // ==================== TOML Formatting Tests ====================

    #[test]
    #[serial]
    fn test_format_for_toml_substitutes_user_prefix() {
        unsafe { std::env::set_var(USERNAME_VAR, "Alice") };
        assert_eq!(
            format_for_toml(r"C:\Users\alice\Libs\Spring4D", true),
            "C:/Users/${USERNAME}/Libs/Spring4D"
        );
        assert_eq!(
            format_for_toml("c:/users/Alice/Libs", true),
            "C:/Users/${USERNAME}/Libs"
        );
        unsafe { std::env::remove_var(USERNAME_VAR) };
    }

    #[test]
    fn test_format_for_toml_forward_slashes() {
        assert_eq!(
            format_for_toml(r"C:\Program Files (x86)\Embarcadero", false),
            "C:/Program Files (x86)/Embarcadero"
        );
    }

    // ==================== WSL Conversion Tests ====================

    #[test]
    fn test_wsl_mount_converted() {
        assert_eq!(
            convert_wsl_path_unchecked("/mnt/x/git_local/project/File.dproj"),
            "X:\\git_local\\project\\File.dproj"
        );
    }

    #[test]
    fn test_wsl_bare_drive() {
        assert_eq!(convert_wsl_path_unchecked("/mnt/c"), "C:");
    }

    #[test]
    fn test_non_wsl_path_unchanged() {
        assert_eq!(
            convert_wsl_path_unchecked("/home/user/project"),
            "/home/user/project"
        );
        assert_eq!(
            convert_wsl_path_unchecked("C:\\already\\windows"),
            "C:\\already\\windows"
        );
    }
}
