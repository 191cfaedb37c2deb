use std::env;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use log::{debug, trace};

/// The current `PATH`, read fresh on every call. Bytes are kept as they are.
pub fn search_path() -> Option<OsString> {
    let path = env::var_os("PATH");
    if path.is_none() {
        debug!("jobsh: PATH is not set");
    }
    path
}

/// Looks `command` up in a colon separated directory list and returns the
/// first `dir/command` that is an executable file. Empty entries are skipped.
pub fn find_file_in_path(command: &str, search_path: Option<&OsStr>) -> Option<PathBuf> {
    let search_path = search_path?;
    for dir in env::split_paths(search_path).filter(|dir| !dir.as_os_str().is_empty()) {
        let candidate = dir.join(command);
        trace!("jobsh: probing {}", candidate.display());
        if is_executable(&candidate) {
            return Some(candidate);
        }
    }
    None
}

pub fn is_executable(path: &Path) -> bool {
    match fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}
