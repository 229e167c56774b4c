//! dcb - drive the Delphi compiler toolchain from the command line.

use clap::Parser;
use dcbuild::cli::{Cli, Commands, ConfigCommands, McpCommands};
use dcbuild::compile::Compiler;
use dcbuild::config::{ConfigLoader, ConfigSource};
use dcbuild::extend::ConfigExtender;
use dcbuild::generate::{ConfigGenerator, MultiConfigGenerator};
use dcbuild::invoke::CompileOptions;
use dcbuild::models::Platform;
use dcbuild::{Error, mcp};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env("DCB_LOG").unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let human = cli.human_readable;
    let config_dir = cli.config_dir.clone();

    if let Err(e) = run_command(cli.command, config_dir.as_deref(), human) {
        if human {
            eprintln!("Error: {}", e);
        } else {
            let payload = serde_json::json!({ "error": e.to_string() });
            eprintln!("{}", payload);
        }
        process::exit(1);
    }
}

fn run_command(command: Commands, config_dir: Option<&Path>, human: bool) -> Result<(), Error> {
    match command {
        Commands::Compile {
            project,
            build_all,
            r#override,
            platform,
            search_paths,
            flags,
            config_file,
        } => {
            let options = CompileOptions {
                force_build_all: build_all,
                override_config: r#override,
                override_platform: parse_platform(platform.as_deref())?,
                additional_search_paths: search_paths,
                additional_flags: flags,
            };

            let mut compiler = Compiler::new();
            if let Some(dir) = config_dir {
                compiler = compiler.with_config_base_dir(dir);
            }
            if let Some(path) = config_file {
                compiler = compiler.with_explicit_config(path);
            }

            let result = compiler.compile_project(&project, &options)?;
            if human {
                print_compile_human(&result);
            } else {
                print_json(&result)?;
            }
            // A failed compilation is a successful tool run; the payload
            // carries the failure.
            Ok(())
        }

        Commands::Config { command } => run_config_command(command, config_dir, human),

        Commands::Mcp {
            command: McpCommands::Manifest,
        } => {
            println!("{}", mcp::manifest());
            Ok(())
        }
    }
}

fn run_config_command(
    command: ConfigCommands,
    config_dir: Option<&Path>,
    human: bool,
) -> Result<(), Error> {
    match command {
        ConfigCommands::Generate {
            build_log,
            output,
            generic,
            no_env_vars,
        } => {
            let generator = ConfigGenerator::new(!no_env_vars);
            let result =
                generator.generate_from_build_log(&build_log, output.as_deref(), !generic)?;
            if human {
                println!("{}", result.message);
                println!("Generated: {}", result.config_file_path);
                println!(
                    "Detected: Delphi {} / {} / {}",
                    result.detected_info.delphi_version,
                    result.detected_info.platform,
                    result.detected_info.build_config
                );
            } else {
                print_json(&result)?;
            }
            Ok(())
        }

        ConfigCommands::GenerateMulti {
            build_logs,
            output,
            separate,
            output_dir,
            no_env_vars,
        } => {
            let generator = MultiConfigGenerator::new(!no_env_vars);
            if separate {
                let results = generator.generate_separate_files(&build_logs, &output_dir)?;
                if human {
                    for result in &results {
                        println!("{}: {}", result.message, result.config_file_path);
                    }
                } else {
                    print_json(&results)?;
                }
            } else {
                let result = generator.generate_from_build_logs(&build_logs, &output)?;
                if human {
                    println!("{}", result.message);
                    for entry in &result.build_logs_processed {
                        println!("  - {}: {} {}", entry.path, entry.platform, entry.config);
                    }
                } else {
                    print_json(&result)?;
                }
            }
            Ok(())
        }

        ConfigCommands::Extend {
            existing_config,
            build_log,
            output,
            no_env_vars,
        } => {
            let extender = ConfigExtender::new(!no_env_vars);
            let result =
                extender.extend_from_build_log(&existing_config, &build_log, output.as_deref())?;
            if human {
                println!("{}", result.message);
                println!("Updated: {}", result.config_file_path);
            } else {
                print_json(&result)?;
            }
            Ok(())
        }

        ConfigCommands::Show { platform } => {
            let platform = parse_platform(platform.as_deref())?;
            let base_dir = config_dir.map(Path::to_path_buf);
            let loader = ConfigLoader::for_platform(platform, base_dir.as_deref())?;
            let config = loader.load()?;

            if human {
                println!("Config file: {} (source: {})", loader.path().display(), loader.source());
                println!("Delphi version: {}", config.delphi.version);
                println!("Root path: {}", config.delphi.root_path);
                println!("Libraries: {}", config.paths.libraries.len());
                for warning in config.validate() {
                    println!("Warning: {}", warning);
                }
            } else {
                #[derive(Serialize)]
                struct ShowResult {
                    config_file_path: PathBuf,
                    source: ConfigSource,
                    config: dcbuild::config::Config,
                    warnings: Vec<String>,
                }
                let warnings = config.validate();
                print_json(&ShowResult {
                    config_file_path: loader.path().to_path_buf(),
                    source: loader.source(),
                    config,
                    warnings,
                })?;
            }
            Ok(())
        }
    }
}

fn parse_platform(value: Option<&str>) -> Result<Option<Platform>, Error> {
    match value {
        None => Ok(None),
        Some(name) => Platform::parse(name)
            .map(Some)
            .ok_or_else(|| Error::InvalidInput(format!("unknown platform: {}", name))),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_compile_human(result: &dcbuild::models::CompilationResult) {
    if result.success {
        println!(
            "Compilation succeeded in {:.2}s",
            result.compilation_time_seconds
        );
        if let Some(exe) = &result.output_executable {
            println!("Output: {}", exe);
        }
    } else {
        println!(
            "Compilation failed (exit code {}) in {:.2}s",
            result.exit_code, result.compilation_time_seconds
        );
    }
    for error in &result.errors {
        match error.column {
            Some(col) => println!(
                "{}({},{}): {} {}",
                error.file,
                error.line,
                col,
                error.code.as_deref().unwrap_or("-"),
                error.message
            ),
            None => println!(
                "{}({}): {} {}",
                error.file,
                error.line,
                error.code.as_deref().unwrap_or("-"),
                error.message
            ),
        }
    }
    println!(
        "{} lines compiled, {} warnings and {} hints filtered",
        result.statistics.lines_compiled,
        result.statistics.warnings_filtered,
        result.statistics.hints_filtered
    );
}
