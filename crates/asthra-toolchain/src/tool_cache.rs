//! Process-wide tool-path cache: an `OnceLock`-guarded, read-mostly map
//! keyed by tool name, resolved once on first lookup and shared by every
//! later call.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use crate::error::DriverError;

static TOOL_CACHE: OnceLock<Mutex<HashMap<&'static str, PathBuf>>> = OnceLock::new();

/// LLVM version suffixes tried after the bare tool name, in order, matching
/// common Linux distribution packaging (`opt-18`, `opt-17`, ...).
const VERSION_SUFFIXES: &[&str] = &["-21", "-20", "-19", "-18", "-17", "-16", "-15"];

/// Resolves `tool`'s absolute path, searching `PATH` on first call and
/// caching the result for the lifetime of the process.
pub fn resolve(tool: &'static str) -> Result<PathBuf, DriverError> {
    let cache = TOOL_CACHE.get_or_init(|| Mutex::new(HashMap::new()));
    let mut guard = cache.lock().unwrap_or_else(|poison| poison.into_inner());
    if let Some(path) = guard.get(tool) {
        return Ok(path.clone());
    }
    let resolved = search_path(tool).ok_or(DriverError::ToolNotFound(tool))?;
    guard.insert(tool, resolved.clone());
    Ok(resolved)
}

fn search_path(tool: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    let mut candidate_names: Vec<String> = vec![tool.to_string()];
    candidate_names.extend(VERSION_SUFFIXES.iter().map(|suffix| format!("{tool}{suffix}")));

    for dir in std::env::split_paths(&path_var) {
        for name in &candidate_names {
            let candidate = dir.join(name);
            if is_executable(&candidate) {
                return Some(candidate);
            }
        }
    }
    None
}

fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        path.metadata()
            .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        path.is_file()
    }
}

/// Test-only helper: clears the cache so unit tests can exercise
/// `search_path` independently of whichever tool happened to resolve first.
#[cfg(test)]
pub(crate) fn reset_for_test() {
    if let Some(cache) = TOOL_CACHE.get() {
        cache.lock().unwrap_or_else(|poison| poison.into_inner()).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_suffixes_are_tried_after_bare_name() {
        assert_eq!(VERSION_SUFFIXES[0], "-21");
        assert!(VERSION_SUFFIXES.len() >= 3);
    }

    #[test]
    fn missing_tool_surfaces_tool_not_found() {
        reset_for_test();
        let err = resolve("definitely-not-a-real-llvm-tool-xyz").unwrap_err();
        assert!(matches!(err, DriverError::ToolNotFound(_)));
    }

    #[test]
    fn resolved_path_is_cached() {
        reset_for_test();
        // `sh` is present on every POSIX CI/dev box this crate targets.
        let first = resolve("sh");
        if let Ok(path) = first {
            let second = resolve("sh").unwrap();
            assert_eq!(path, second);
        }
    }
}
