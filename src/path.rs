//! Search-path discovery and executable lookup.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Directories from `PATH`, split on the platform list separator.
/// Absent or empty `PATH` yields an empty list: no externals resolve.
pub fn search_dirs() -> Vec<PathBuf> {
    match env::var_os("PATH") {
        Some(paths) if !paths.is_empty() => env::split_paths(&paths).collect(),
        _ => Vec::new(),
    }
}

/// Resolve a command name against the search path. Returns the first
/// `dir/name` that is a regular, executable file.
pub fn lookup(name: &str) -> Option<PathBuf> {
    for dir in search_dirs() {
        let candidate = dir.join(name);
        let Ok(meta) = fs::metadata(&candidate) else {
            continue;
        };
        if meta.is_file() && is_executable(&candidate, &meta) {
            return Some(candidate);
        }
    }
    None
}

/// Executable test: any execute bit on POSIX, a known extension on Windows.
#[cfg(unix)]
pub fn is_executable(_path: &Path, meta: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
pub fn is_executable(path: &Path, _meta: &fs::Metadata) -> bool {
    const EXEC_EXTS: [&str; 4] = ["exe", "com", "bat", "cmd"];
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| EXEC_EXTS.iter().any(|e| ext.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// The user's home directory, for `~` expansion in `cd`.
pub fn home_dir() -> Option<PathBuf> {
    #[cfg(unix)]
    return env::var_os("HOME").map(PathBuf::from);
    #[cfg(not(unix))]
    return env::var_os("USERPROFILE").map(PathBuf::from);
}
