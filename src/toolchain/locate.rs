//! Executable lookup on the search path.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use crate::util::process::EnvOverlay;

/// Find `name` on the search path.
///
/// Uses the overlay's `PATH` when it has one, the process `PATH` otherwise.
/// Absence is not an error.
pub fn locate(name: &str, overlay: &EnvOverlay) -> Option<PathBuf> {
    let search_path = overlay
        .get("PATH")
        .map(OsString::from)
        .or_else(|| std::env::var_os("PATH"))?;
    locate_in(name, &search_path)
}

/// Find `name` in the directories of `search_path`.
///
/// Directories are split on the platform separator and stripped of
/// surrounding quotes. Each is probed for the literal name and the name with
/// the platform executable suffix; the first existing executable wins.
pub fn locate_in(name: &str, search_path: &OsStr) -> Option<PathBuf> {
    let dirs: Vec<PathBuf> = std::env::split_paths(search_path)
        .filter_map(|dir| {
            let dir = dir.to_string_lossy();
            let dir = dir.trim().trim_matches('"');
            (!dir.is_empty()).then(|| PathBuf::from(dir))
        })
        .collect();

    let joined = std::env::join_paths(&dirs).ok()?;
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    match which::which_in(name, Some(joined), cwd) {
        Ok(path) => {
            tracing::debug!("located `{}` at {}", name, path.display());
            Some(path)
        }
        Err(_) => {
            tracing::debug!("`{}` not found on the search path", name);
            None
        }
    }
}

/// Whether `path` is an existing file that can be executed.
pub fn is_executable(path: &Path) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }

    #[cfg(not(unix))]
    {
        true
    }
}
