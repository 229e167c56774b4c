//! Compilation orchestration: resolve settings, run the compiler, parse the
//! result.
//!
//! One call drives one compilation end to end:
//!
//! ```text
//! resolve settings -> (compile resource)? -> invoke -> parse output -> done
//! ```
//!
//! Settings resolution failures (missing project, missing store, missing
//! tool) abort before any process launches. A failed resource step
//! short-circuits without invoking the main compiler. The invocation is
//! bounded by a wall-clock timeout, reported distinctly from a nonzero
//! exit. Output parsing always runs when the process produced output;
//! diagnostics are the primary signal of what failed.

pub mod process;

use crate::config::{Config, ConfigLoader};
use crate::invoke::{CompileOptions, InvocationBuilder, materialize_args};
use crate::models::{
    BuildConfig, CompilationResult, CompilationStatistics, Diagnostic, FailureReason, Platform,
    Severity,
};
use crate::output::OutputParser;
use crate::pathutil;
use crate::project::{DprojParser, ProjectSettings};
use crate::resource::ResourceCompiler;
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Orchestrates the Delphi compilation process.
#[derive(Default)]
pub struct Compiler {
    /// Directory searched for config files (current dir when `None`)
    config_base_dir: Option<PathBuf>,

    /// Explicit config file, bypassing the search order
    explicit_config: Option<PathBuf>,

    /// Pre-loaded configuration (tests, callers with their own loading)
    config: Option<Config>,
}

impl Compiler {
    /// Create a compiler using the standard config search order.
    pub fn new() -> Self {
        Self::default()
    }

    /// Search for config files under `dir` instead of the current directory.
    pub fn with_config_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_base_dir = Some(dir.into());
        self
    }

    /// Use an explicit config file.
    pub fn with_explicit_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.explicit_config = Some(path.into());
        self
    }

    /// Use an already-loaded configuration.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Compile a Delphi project (.dpr, .dpk, or .dproj).
    ///
    /// Returns a structured result for everything the compiler itself
    /// reports; returns `Err` only for resolution failures (missing
    /// project, missing configuration store, missing tool).
    pub fn compile_project(
        &self,
        project_path: &Path,
        options: &CompileOptions,
    ) -> Result<CompilationResult> {
        debug!(project = %project_path.display(), "resolving settings");

        let project_path = PathBuf::from(pathutil::convert_wsl_path(
            &project_path.to_string_lossy(),
        ));

        if !project_path.exists() {
            return Err(Error::ProjectParse(format!(
                "project file not found: {}",
                project_path.display()
            )));
        }
        let extension = project_path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        if !matches!(extension.as_str(), "dpr" | "dpk" | "dproj") {
            return Err(Error::InvalidInput(format!(
                "invalid project file: {} (expected .dpr, .dpk, or .dproj)",
                project_path.display()
            )));
        }

        // Parse the descriptor first: the platform decides which config
        // file to load.
        let dproj_path = dproj_path_for(&project_path);
        let settings = match &dproj_path {
            Some(path) => Some(DprojParser::from_file(path)?.parse(
                options.override_config.as_deref(),
                options.override_platform,
            )?),
            None => None,
        };

        let platform = settings
            .as_ref()
            .and_then(|s| s.active_platform)
            .or(options.override_platform)
            .unwrap_or(Platform::Win32);
        let build_config = settings
            .as_ref()
            .and_then(|s| BuildConfig::parse(&s.active_config))
            .or_else(|| {
                options
                    .override_config
                    .as_deref()
                    .and_then(BuildConfig::parse)
            })
            .unwrap_or_default();

        let config = match &self.config {
            Some(config) => config.clone(),
            None => self.load_config(platform)?,
        };

        let source_path = resolve_source_path(&project_path, settings.as_ref());
        if !source_path.exists() {
            return Err(Error::ProjectParse(format!(
                "project source file not found: {}",
                source_path.display()
            )));
        }
        let working_dir = source_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let start = Instant::now();

        // Resource pre-step: on failure the main compiler never runs.
        if let Some(version_info) = settings.as_ref().and_then(|s| s.version_info.as_ref()) {
            debug!("compiling version resource");
            let rc = ResourceCompiler::new(Path::new(&config.delphi.root_path));
            let rc_result = rc.compile_version_resource(
                &file_stem(&source_path),
                &working_dir,
                version_info,
            );
            if !rc_result.success {
                return Ok(resource_failure_result(
                    &source_path,
                    rc_result.error_output,
                    start.elapsed(),
                ));
            }
        }

        let compiler_path = config.compiler_path(platform);
        if !compiler_path.exists() {
            return Err(Error::ToolNotFound(compiler_path));
        }

        let source_name = source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let invocation = InvocationBuilder::new(&config, settings.as_ref(), platform, build_config)
            .build(&compiler_path, &source_name, &working_dir, options);

        debug!(timeout = invocation.timeout_seconds, "invoking compiler");
        let (args, response_guard) = materialize_args(&invocation)?;
        let run = process::run_with_timeout(
            &invocation.program,
            &args,
            &invocation.working_dir,
            Duration::from_secs(invocation.timeout_seconds),
        )?;
        // Response file removal is guaranteed by the guard; drop it now
        // that the process has exited.
        drop(response_guard);

        let compilation_time = start.elapsed();

        // Diagnostics are the primary failure signal: parse whatever the
        // process produced, timeout or not.
        let (errors, statistics) = OutputParser::new().parse(&run.output);

        if run.timed_out {
            info!(seconds = invocation.timeout_seconds, "compilation timed out");
            return Ok(CompilationResult {
                success: false,
                exit_code: run.exit_code,
                errors,
                failure_reason: Some(FailureReason::Timeout),
                compilation_time_seconds: round2(compilation_time),
                output_executable: None,
                statistics,
            });
        }

        let success = run.exit_code == 0;
        let output_executable = if success {
            find_output_executable(&project_path, settings.as_ref(), platform)
                .map(|p| p.display().to_string())
        } else {
            None
        };

        let failure_reason = if success {
            None
        } else if errors.is_empty() {
            Some(FailureReason::ToolFailure)
        } else {
            Some(FailureReason::CompileErrors)
        };

        info!(
            success,
            exit_code = run.exit_code,
            errors = errors.len(),
            "compilation finished"
        );

        Ok(CompilationResult {
            success,
            exit_code: run.exit_code,
            errors,
            failure_reason,
            compilation_time_seconds: round2(compilation_time),
            output_executable,
            statistics,
        })
    }

    fn load_config(&self, platform: Platform) -> Result<Config> {
        let loader = match &self.explicit_config {
            Some(path) => ConfigLoader::with_explicit(path.clone()),
            None => ConfigLoader::for_platform(Some(platform), self.config_base_dir.as_deref())?,
        };
        debug!(path = %loader.path().display(), source = %loader.source(), "loading configuration");
        loader.load()
    }
}

/// The .dproj corresponding to a project path, when one exists.
fn dproj_path_for(project_path: &Path) -> Option<PathBuf> {
    if project_path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("dproj"))
        .unwrap_or(false)
    {
        return Some(project_path.to_path_buf());
    }
    let sibling = project_path.with_extension("dproj");
    sibling.exists().then_some(sibling)
}

/// The actual file handed to the compiler.
///
/// A descriptor's own filename is not authoritative: packages and
/// applications both use .dproj, so the descriptor's MainSource field names
/// the real source (.dpr or .dpk). Direct source paths pass through.
fn resolve_source_path(project_path: &Path, settings: Option<&ProjectSettings>) -> PathBuf {
    let extension = project_path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    if matches!(extension.as_str(), "dpr" | "dpk") {
        return project_path.to_path_buf();
    }

    if let Some(main_source) = settings.and_then(|s| s.main_source.as_deref()) {
        if let Some(dir) = project_path.parent() {
            return dir.join(main_source);
        }
    }

    project_path.with_extension("dpr")
}

/// Locate the artifact a successful compilation produced.
fn find_output_executable(
    project_path: &Path,
    settings: Option<&ProjectSettings>,
    platform: Platform,
) -> Option<PathBuf> {
    let is_package = settings
        .map(|s| s.is_package())
        .unwrap_or_else(|| {
            project_path
                .extension()
                .map(|e| e.eq_ignore_ascii_case("dpk"))
                .unwrap_or(false)
        });

    let extension = match (platform, is_package) {
        (Platform::Linux64, true) => ".so",
        (Platform::Linux64, false) => "",
        (_, true) => ".bpl",
        (_, false) => ".exe",
    };

    let stem = file_stem(project_path);
    let artifact_name = format!("{}{}", stem, extension);

    // Explicit output directory from the descriptor.
    if let Some(output_dir) = settings.and_then(|s| s.output_dir.as_deref()) {
        let candidate = Path::new(output_dir).join(&artifact_name);
        if candidate.exists() {
            return Some(candidate);
        }
    }

    // Next to the project file.
    if let Some(dir) = project_path.parent() {
        let candidate = dir.join(&artifact_name);
        if candidate.exists() {
            return Some(candidate);
        }

        // Conventional platform/config subdirectories.
        for config in ["Debug", "Release"] {
            let candidate = dir
                .join(platform.as_str())
                .join(config)
                .join(&artifact_name);
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    None
}

fn resource_failure_result(
    source_path: &Path,
    error_output: Option<String>,
    elapsed: Duration,
) -> CompilationResult {
    CompilationResult {
        success: false,
        exit_code: 1,
        errors: vec![Diagnostic {
            file: format!("{}.vrc", file_stem(source_path)),
            line: 0,
            column: None,
            severity: Severity::Fatal,
            code: None,
            message: error_output.unwrap_or_else(|| "Resource compilation failed".to_string()),
        }],
        failure_reason: Some(FailureReason::ResourceCompilation),
        compilation_time_seconds: round2(elapsed),
        output_executable: None,
        statistics: CompilationStatistics::default(),
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn round2(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 100.0).round() / 100.0
}
