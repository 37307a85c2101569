//! Platform-specific file operations.

use std::fs;
use std::io;
use std::path::Path;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Set file permissions from a Unix mode value.
///
/// This is useful when extracting files from archives that preserve Unix permissions.
#[cfg(unix)]
pub fn set_permissions_from_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::fs::Permissions;
    fs::set_permissions(path, Permissions::from_mode(mode))
}

/// Set file permissions from a Unix mode value (Windows - no-op)
#[cfg(windows)]
pub fn set_permissions_from_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

/// Check if a file looks runnable on this platform
#[cfg(unix)]
pub fn is_executable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|metadata| metadata.is_file() && metadata.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(windows)]
pub fn is_executable(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ["exe", "bat", "cmd"].contains(&ext.to_ascii_lowercase().as_str()))
}

/// Remove a file, treating "already gone" as success.
pub fn remove_file_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn remove_missing_file_is_ok() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing");
        assert!(remove_file_if_exists(&path).is_ok());

        fs::write(&path, b"x").unwrap();
        remove_file_if_exists(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    #[cfg(unix)]
    fn mode_controls_executable_bit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tool");
        fs::write(&path, b"#!/bin/sh\n").unwrap();

        set_permissions_from_mode(&path, 0o644).unwrap();
        assert!(!is_executable(&path));

        set_permissions_from_mode(&path, 0o755).unwrap();
        assert!(is_executable(&path));
    }

    #[test]
    fn directories_are_not_executable_files() {
        let dir = tempdir().unwrap();
        assert!(!is_executable(dir.path()));
    }
}
