//! Blocking subprocess invocation.

use std::path::Path;
use std::process::Command;
use std::time::Instant;

use crate::error::DriverError;

/// Result of one tool invocation.
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub success: bool,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub elapsed_ms: u64,
}

/// Invokes `tool_path` with `args`, capturing all child output. Echoes the
/// argv line to stderr first when `verbose` is set; no output is otherwise forwarded to the
/// parent process.
pub fn run(tool_name: &'static str, tool_path: &Path, args: &[String], verbose: bool) -> Result<ToolResult, DriverError> {
    if verbose {
        tracing::info!(tool = tool_name, argv = %args.join(" "), "invoking toolchain command");
    }

    let start = Instant::now();
    let output = Command::new(tool_path).args(args).output()?;
    let elapsed_ms = start.elapsed().as_millis() as u64;
    crate::stats::record(elapsed_ms);

    Ok(ToolResult {
        success: output.status.success(),
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        elapsed_ms,
    })
}

/// Runs `tool_name`/`tool_path` and turns a non-zero exit into
/// [`DriverError::ToolFailed`], surfacing stderr verbatim.
pub fn run_checked(
    tool_name: &'static str,
    tool_path: &Path,
    args: &[String],
    verbose: bool,
) -> Result<ToolResult, DriverError> {
    let result = run(tool_name, tool_path, args, verbose)?;
    if !result.success {
        return Err(DriverError::ToolFailed {
            tool: tool_name,
            code: result.exit_code,
            stderr: result.stderr.clone(),
        });
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_captures_stdout_and_exit_code() {
        let result = run("true_echo", Path::new("/bin/echo"), &["hello".to_string()], false);
        if let Ok(result) = result {
            assert!(result.success);
            assert_eq!(result.exit_code, 0);
            assert!(result.stdout.contains("hello"));
        }
    }

    #[test]
    fn run_checked_surfaces_nonzero_exit() {
        let result = run_checked("false_cmd", Path::new("/bin/false"), &[], false);
        if let Err(DriverError::ToolFailed { code, .. }) = result {
            assert_ne!(code, 0);
        }
    }
}
