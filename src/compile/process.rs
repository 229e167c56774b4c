//! Bounded-time external process execution.
//!
//! Both the main compiler and the resource compiler run through
//! [`run_with_timeout`]: output is drained on reader threads (the compiler
//! can emit far more than a pipe buffer holds), the wait is bounded by
//! `wait-timeout`, and an expired timeout kills the process instead of
//! waiting it out.

use crate::{Error, Result};
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

/// Captured outcome of one external process run.
#[derive(Debug)]
pub struct ProcessOutput {
    /// Combined stdout and stderr, stdout first
    pub output: String,

    /// Process exit code (-1 when terminated by signal or timeout)
    pub exit_code: i32,

    /// Whether the process was killed because the timeout expired
    pub timed_out: bool,
}

/// Run `program` with `args` in `working_dir`, capturing combined output,
/// bounded by `timeout`.
///
/// A missing executable maps to [`Error::ToolNotFound`]. On timeout the
/// process is killed and reaped; the partial output collected so far is
/// returned with `timed_out` set. No retries at this layer or any other.
pub fn run_with_timeout(
    program: &Path,
    args: &[String],
    working_dir: &Path,
    timeout: Duration,
) -> Result<ProcessOutput> {
    debug!(program = %program.display(), args = args.len(), "launching process");

    let mut child = Command::new(program)
        .args(args)
        .current_dir(working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::ToolNotFound(program.to_path_buf()),
            _ => Error::Io(e),
        })?;

    // Drain pipes on threads: waiting first would deadlock once the child
    // fills a pipe buffer.
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let stdout_reader = std::thread::spawn(move || read_lossy(stdout));
    let stderr_reader = std::thread::spawn(move || read_lossy(stderr));

    let status = child.wait_timeout(timeout)?;

    let (exit_code, timed_out) = match status {
        Some(status) => (status.code().unwrap_or(-1), false),
        None => {
            warn!(program = %program.display(), ?timeout, "process timed out, killing");
            child.kill()?;
            child.wait()?;
            (-1, true)
        }
    };

    let stdout_text = stdout_reader.join().unwrap_or_default();
    let stderr_text = stderr_reader.join().unwrap_or_default();

    let mut output = stdout_text;
    if !stderr_text.is_empty() {
        if !output.is_empty() {
            output.push('\n');
        }
        output.push_str(&stderr_text);
    }

    Ok(ProcessOutput {
        output,
        exit_code,
        timed_out,
    })
}

/// Read a pipe to the end, replacing invalid UTF-8. Compiler output arrives
/// in whatever codepage the tool's locale uses.
fn read_lossy(pipe: Option<impl Read>) -> String {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf);
    }
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(test)]
#[cfg(unix)]
mod tests {
    use super::*;
    use crate::test_utils::{TestEnv, write_fake_tool};

    #[test]
    fn test_captures_output_and_exit_code() {
        let env = TestEnv::new();
        let tool = write_fake_tool(env.path(), "fake_tool.sh", "line one\nline two", 3);

        let result = run_with_timeout(&tool, &[], env.path(), Duration::from_secs(10)).unwrap();
        assert!(result.output.contains("line one"));
        assert!(result.output.contains("line two"));
        assert_eq!(result.exit_code, 3);
        assert!(!result.timed_out);
    }

    #[test]
    fn test_missing_tool_is_tool_not_found() {
        let env = TestEnv::new();
        let err = run_with_timeout(
            Path::new("/no/such/compiler.exe"),
            &[],
            env.path(),
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(matches!(err, Error::ToolNotFound(_)));
    }

    #[test]
    fn test_timeout_kills_process() {
        use std::fs;
        use std::os::unix::fs::PermissionsExt;

        let env = TestEnv::new();
        let path = env.path().join("sleeper.sh");
        // exec so the kill reaches the sleep itself and the pipes close
        fs::write(&path, "#!/bin/sh\necho started\nexec sleep 30\n").unwrap();
        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).unwrap();

        let start = std::time::Instant::now();
        let result = run_with_timeout(&path, &[], env.path(), Duration::from_millis(300)).unwrap();
        assert!(result.timed_out);
        assert!(start.elapsed() < Duration::from_secs(10));
    }
}
