//! Invocation assembly: turn store + project settings + caller overrides
//! into a final compiler command line.
//!
//! Layering is lowest-to-highest precedence: store defaults, then project
//! file settings, then explicit per-call overrides. Later layers append;
//! they never delete earlier entries.
//!
//! When the serialized command line exceeds the platform argument-length
//! limit, the arguments move to a response file in the working directory and
//! the compiler is invoked with a single `@file` token. The file is removed
//! on every exit path via an RAII guard.

use crate::config::Config;
use crate::models::{BuildConfig, Platform};
use crate::pathutil;
use crate::project::ProjectSettings;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Serialized command-line length above which arguments move to a response
/// file. The Windows limit is ~8191 characters; leave headroom.
pub const RESPONSE_FILE_THRESHOLD: usize = 8000;

/// Response file name, created in the project's working directory.
pub const RESPONSE_FILE_NAME: &str = "dcc_args.rsp";

/// Wall-clock timeout for the main compiler, in seconds.
pub const COMPILE_TIMEOUT_SECS: u64 = 300;

/// Caller overrides for one compilation. The highest layer: nothing here is
/// ever dropped in favor of store or project values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompileOptions {
    /// Force rebuild of all units (-B)
    #[serde(default)]
    pub force_build_all: bool,

    /// Override the project's active build configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_config: Option<String>,

    /// Override the project's active platform
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_platform: Option<Platform>,

    /// Extra search paths, appended after store and project paths
    #[serde(default)]
    pub additional_search_paths: Vec<String>,

    /// Extra compiler flags, appended last
    #[serde(default)]
    pub additional_flags: Vec<String>,
}

/// A fully resolved compiler invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invocation {
    /// Compiler executable
    pub program: PathBuf,

    /// Ordered argument list (source file last)
    pub args: Vec<String>,

    /// Working directory (the source file's directory)
    pub working_dir: PathBuf,

    /// Wall-clock timeout in seconds
    pub timeout_seconds: u64,
}

impl Invocation {
    /// Length of the serialized command line, program included.
    pub fn command_line_len(&self) -> usize {
        let args_len: usize = self.args.iter().map(|a| a.len() + 1).sum();
        self.program.as_os_str().len() + args_len
    }

    /// Whether this invocation exceeds the argument-length limit.
    pub fn needs_response_file(&self) -> bool {
        self.command_line_len() > RESPONSE_FILE_THRESHOLD
    }
}

/// Flags the builder must never pass through from generically-captured flag
/// lists: without their values they crash the compiler. The extractor
/// already routes them to SDK fields; this second filter catches flag lists
/// from hand-edited config files.
const FILTERED_FLAGS: [&str; 4] = ["-B", "-Q", "--syslibroot", "--libpath"];

/// Builds compiler invocations from layered configuration.
pub struct InvocationBuilder<'a> {
    config: &'a Config,
    settings: Option<&'a ProjectSettings>,
    platform: Platform,
    build_config: BuildConfig,
}

impl<'a> InvocationBuilder<'a> {
    /// Create a builder for one platform/configuration pair.
    pub fn new(
        config: &'a Config,
        settings: Option<&'a ProjectSettings>,
        platform: Platform,
        build_config: BuildConfig,
    ) -> Self {
        Self {
            config,
            settings,
            platform,
            build_config,
        }
    }

    /// Assemble the full argument list for compiling `source_name` (a file
    /// name relative to `working_dir`).
    pub fn build(
        &self,
        compiler_path: &Path,
        source_name: &str,
        working_dir: &Path,
        options: &CompileOptions,
    ) -> Invocation {
        let mut args: Vec<String> = Vec::new();

        // Store-level flags, minus build-control flags added below and the
        // SDK flags injected with values further down.
        for flag in self.config.compiler.flags.all() {
            if is_filtered_flag(flag) {
                continue;
            }
            if !args.iter().any(|a| a == flag) {
                args.push(flag.to_string());
            }
        }

        // Project-level flags layer on top.
        if let Some(settings) = self.settings {
            for flag in &settings.compiler_flags {
                if is_filtered_flag(flag) {
                    continue;
                }
                if !args.iter().any(|a| a == flag) {
                    args.push(flag.clone());
                }
            }

            if !settings.defines.is_empty() {
                args.push(format!("-D{}", settings.defines.join(";")));
            }
        }

        if options.force_build_all {
            args.push("-B".to_string());
        }
        args.push("-Q".to_string());

        // Search paths: store, then project, then caller extras; later
        // layers append only.
        let mut all_paths: Vec<String> = self
            .config
            .search_paths(self.platform, self.build_config);
        if let Some(settings) = self.settings {
            all_paths.extend(settings.unit_search_paths.iter().cloned());
            all_paths.extend(settings.include_paths.iter().cloned());
            all_paths.extend(settings.resource_paths.iter().cloned());
        }
        all_paths.extend(options.additional_search_paths.iter().cloned());

        let unique_paths = deduplicate_paths(&all_paths);
        if !unique_paths.is_empty() {
            let joined = unique_paths.join(";");
            args.push(format!("-U{}", joined));
            args.push(format!("-I{}", joined));
            args.push(format!("-R{}", joined));
        }

        // Namespaces: store prefixes first, project additions after.
        let namespaces = merge_namespaces(
            &self.config.compiler.namespaces.prefixes,
            self.settings.map(|s| s.namespace_prefixes.as_slice()).unwrap_or(&[]),
        );
        if !namespaces.is_empty() {
            args.push(format!("-NS{}", namespaces.join(";")));
        }

        if !self.config.compiler.aliases.is_empty() {
            let aliases: Vec<String> = self
                .config
                .compiler
                .aliases
                .iter()
                .map(|(old, new)| format!("{}={}", old, new))
                .collect();
            args.push(format!("-A{}", aliases.join(";")));
        }

        if let Some(settings) = self.settings {
            if let Some(output_dir) = &settings.output_dir {
                args.push(format!("-E{}", output_dir));
            }
            if let Some(dcu_dir) = &settings.dcu_output_dir {
                args.push(format!("-NU{}", dcu_dir));
            }
        }

        // Cross-compilation SDK parameters come only from dedicated store
        // fields; the generic flag lists were filtered above.
        if self.platform.needs_linux_sdk() {
            if let Some(sysroot) = &self.config.linux_sdk.sysroot {
                args.push(format!("--syslibroot:{}", sysroot));
            }
            if !self.config.linux_sdk.libpaths.is_empty() {
                args.push(format!("--libpath:{}", self.config.linux_sdk.libpaths.join(";")));
            }
        }

        args.extend(options.additional_flags.iter().cloned());

        // Source file is always last.
        args.push(source_name.to_string());

        debug!(
            args = args.len(),
            platform = %self.platform,
            config = %self.build_config,
            "assembled compiler invocation"
        );

        Invocation {
            program: compiler_path.to_path_buf(),
            args,
            working_dir: working_dir.to_path_buf(),
            timeout_seconds: COMPILE_TIMEOUT_SECS,
        }
    }
}

fn is_filtered_flag(flag: &str) -> bool {
    FILTERED_FLAGS
        .iter()
        .any(|f| flag == *f || (f.starts_with("--") && flag.starts_with(f)))
}

/// Deduplicate paths case- and separator-insensitively, preserving order.
fn deduplicate_paths(paths: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    for path in paths {
        if seen.insert(pathutil::normalize_for_comparison(path)) {
            unique.push(path.clone());
        }
    }
    unique
}

/// Merge namespace lists without duplicates, store entries first.
fn merge_namespaces(config_ns: &[String], project_ns: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for ns in config_ns.iter().chain(project_ns.iter()) {
        if seen.insert(ns.to_ascii_lowercase()) {
            merged.push(ns.clone());
        }
    }
    merged
}

/// A response file that removes itself when dropped, so cleanup holds on
/// success, failure, and panic paths alike.
#[derive(Debug)]
pub struct ResponseFileGuard {
    path: PathBuf,
}

impl ResponseFileGuard {
    /// Write `args` to the response file, one token per line, quoting
    /// tokens that contain spaces.
    pub fn create(working_dir: &Path, args: &[String]) -> Result<Self> {
        let path = working_dir.join(RESPONSE_FILE_NAME);
        let mut file = std::fs::File::create(&path)?;
        for arg in args {
            if arg.contains(' ') && !arg.starts_with('"') {
                writeln!(file, "\"{}\"", arg)?;
            } else {
                writeln!(file, "{}", arg)?;
            }
        }
        Ok(Self { path })
    }

    /// The argument handed to the compiler instead of the full list.
    pub fn compiler_arg(&self) -> String {
        format!("@{}", RESPONSE_FILE_NAME)
    }

    /// Path of the response file on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ResponseFileGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Resolve the effective argument list for an invocation: either the
/// in-line arguments, or a response-file indirection with its guard.
pub fn materialize_args(invocation: &Invocation) -> Result<(Vec<String>, Option<ResponseFileGuard>)> {
    if !invocation.needs_response_file() {
        return Ok((invocation.args.clone(), None));
    }

    let guard = ResponseFileGuard::create(&invocation.working_dir, &invocation.args)?;
    debug!(path = %guard.path().display(), "using response file");
    Ok((vec![guard.compiler_arg()], Some(guard)))
}
