// Copyright 2025 dentsusoken
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::error::InstallError;
use crate::platform::file_ops;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use tar::Archive as TarArchive;
use walkdir::WalkDir;
use zip::ZipArchive;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArchiveFormat {
    #[serde(rename = "tar.gz")]
    TarGz,
    #[serde(rename = "zip")]
    Zip,
}

impl ArchiveFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveFormat::TarGz => "tar.gz",
            ArchiveFormat::Zip => "zip",
        }
    }

    /// Format implied by a file name or URL suffix.
    pub fn from_file_name(name: &str) -> Result<Self, InstallError> {
        let lower = name.to_lowercase();
        let lower = lower.split(['?', '#']).next().unwrap_or_default();
        if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Ok(ArchiveFormat::TarGz)
        } else if lower.ends_with(".zip") {
            Ok(ArchiveFormat::Zip)
        } else {
            Err(InstallError::UnsupportedFormat(name.to_string()))
        }
    }

    /// Format identified by the file's magic bytes, if recognisable.
    pub fn sniff(path: &Path) -> Result<Option<Self>, InstallError> {
        let mut file = File::open(path).map_err(|e| InstallError::io(path, e))?;
        let mut magic = [0u8; 4];
        if file.read_exact(&mut magic).is_err() {
            return Ok(None);
        }

        let format = match magic {
            [0x1f, 0x8b, _, _] => Some(ArchiveFormat::TarGz),
            [0x50, 0x4b, 0x03 | 0x05 | 0x07, _] => Some(ArchiveFormat::Zip),
            _ => None,
        };
        Ok(format)
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArchiveFormat {
    type Err = InstallError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tar.gz" | "tgz" => Ok(ArchiveFormat::TarGz),
            "zip" => Ok(ArchiveFormat::Zip),
            other => Err(InstallError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Where an archive ended up and how to start what it contained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledLocation {
    pub dir: PathBuf,
    /// Executable path relative to `dir`.
    pub launch_hint: PathBuf,
}

impl InstalledLocation {
    pub fn executable(&self) -> PathBuf {
        self.dir.join(&self.launch_hint)
    }
}

/// Extract `archive_path` into `dest_dir` and delete the archive.
///
/// The archive is only removed once every entry has been written; on any
/// failure it stays in place for inspection.
pub fn install_archive(
    archive_path: &Path,
    dest_dir: &Path,
    format: ArchiveFormat,
    launch_hint: &str,
) -> Result<InstalledLocation, InstallError> {
    let format = match ArchiveFormat::sniff(archive_path)? {
        Some(detected) if detected != format => {
            log::warn!(
                "{} is declared as {format} but looks like {detected}; extracting as {detected}",
                archive_path.display()
            );
            detected
        }
        Some(detected) => detected,
        None => {
            return Err(InstallError::corrupt(
                archive_path,
                format!("not a {format} archive"),
            ));
        }
    };

    fs::create_dir_all(dest_dir).map_err(|e| InstallError::io(dest_dir, e))?;
    verify_integrity(archive_path, format)?;

    let extracted = match format {
        ArchiveFormat::TarGz => extract_tar_gz(archive_path, dest_dir)?,
        ArchiveFormat::Zip => extract_zip(archive_path, dest_dir)?,
    };
    log::info!(
        "Extracted {extracted} entries from {} into {}",
        archive_path.display(),
        dest_dir.display()
    );

    let launch_hint = resolve_launch_hint(dest_dir, launch_hint);

    if let Err(e) = file_ops::remove_file_if_exists(archive_path) {
        log::warn!(
            "Installed successfully but could not remove {}: {e}",
            archive_path.display()
        );
    }

    Ok(InstalledLocation {
        dir: dest_dir.to_path_buf(),
        launch_hint,
    })
}

/// Relative paths of the regular files stored in the archive.
pub fn list_entries(archive_path: &Path, format: ArchiveFormat) -> Result<Vec<PathBuf>, InstallError> {
    let mut files = Vec::new();
    match format {
        ArchiveFormat::TarGz => {
            let mut archive = open_tar_gz(archive_path)?;
            let entries = archive
                .entries()
                .map_err(|e| InstallError::corrupt(archive_path, e))?;
            for entry in entries {
                let entry = entry.map_err(|e| InstallError::corrupt(archive_path, e))?;
                if entry.header().entry_type().is_file() {
                    let path = entry
                        .path()
                        .map_err(|e| InstallError::corrupt(archive_path, e))?;
                    files.push(normalize_path(&path));
                }
            }
        }
        ArchiveFormat::Zip => {
            let mut archive = open_zip(archive_path)?;
            for i in 0..archive.len() {
                let file = archive
                    .by_index(i)
                    .map_err(|e| InstallError::corrupt(archive_path, e))?;
                if file.is_file() {
                    files.push(normalize_path(Path::new(file.name())));
                }
            }
        }
    }
    files.sort();
    Ok(files)
}

fn open_tar_gz(archive_path: &Path) -> Result<TarArchive<flate2::read::GzDecoder<File>>, InstallError> {
    let file = File::open(archive_path).map_err(|e| InstallError::io(archive_path, e))?;
    Ok(TarArchive::new(flate2::read::GzDecoder::new(file)))
}

fn open_zip(archive_path: &Path) -> Result<ZipArchive<File>, InstallError> {
    let file = File::open(archive_path).map_err(|e| InstallError::io(archive_path, e))?;
    ZipArchive::new(file).map_err(|e| InstallError::corrupt(archive_path, e))
}

fn verify_integrity(archive_path: &Path, format: ArchiveFormat) -> Result<(), InstallError> {
    match format {
        ArchiveFormat::TarGz => {
            let mut archive = open_tar_gz(archive_path)?;
            let mut entries = archive
                .entries()
                .map_err(|e| InstallError::corrupt(archive_path, e))?;
            match entries.next() {
                Some(entry) => {
                    entry.map_err(|e| InstallError::corrupt(archive_path, e))?;
                    Ok(())
                }
                None => Err(InstallError::corrupt(archive_path, "archive is empty")),
            }
        }
        ArchiveFormat::Zip => {
            let archive = open_zip(archive_path)?;
            if archive.is_empty() {
                return Err(InstallError::corrupt(archive_path, "archive is empty"));
            }
            Ok(())
        }
    }
}

fn extract_tar_gz(archive_path: &Path, destination: &Path) -> Result<usize, InstallError> {
    let mut archive = open_tar_gz(archive_path)?;
    archive.set_preserve_permissions(true);
    archive.set_preserve_mtime(true);
    archive.set_overwrite(true);

    let root = destination
        .canonicalize()
        .map_err(|e| InstallError::io(destination, e))?;
    let mut extracted_count = 0;
    let entries = archive
        .entries()
        .map_err(|e| InstallError::corrupt(archive_path, e))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| InstallError::corrupt(archive_path, e))?;
        let path = entry
            .path()
            .map_err(|e| InstallError::corrupt(archive_path, e))?
            .into_owned();

        validate_entry_path(&path)?;
        ensure_within(&root, destination, &path)?;

        // `unpack_in` also keeps hard-link targets inside the destination.
        let unpacked = entry.unpack_in(destination).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                InstallError::corrupt(archive_path, e)
            } else {
                InstallError::io(&destination.join(&path), e)
            }
        })?;
        if !unpacked {
            return Err(InstallError::UnsafeEntry(path.display().to_string()));
        }
        extracted_count += 1;

        if extracted_count % 100 == 0 {
            log::debug!("Extracted {extracted_count} entries...");
        }
    }

    Ok(extracted_count)
}

fn extract_zip(archive_path: &Path, destination: &Path) -> Result<usize, InstallError> {
    let mut archive = open_zip(archive_path)?;
    let total_files = archive.len();
    let root = destination
        .canonicalize()
        .map_err(|e| InstallError::io(destination, e))?;

    for i in 0..total_files {
        let mut file = archive
            .by_index(i)
            .map_err(|e| InstallError::corrupt(archive_path, e))?;
        let relative = match file.enclosed_name() {
            Some(path) => path,
            None => return Err(InstallError::UnsafeEntry(file.name().to_string())),
        };
        validate_entry_path(&relative)?;
        ensure_within(&root, destination, &relative)?;
        let outpath = destination.join(relative);

        if file.is_dir() {
            fs::create_dir_all(&outpath).map_err(|e| InstallError::io(&outpath, e))?;
        } else {
            if let Some(parent) = outpath.parent() {
                fs::create_dir_all(parent).map_err(|e| InstallError::io(parent, e))?;
            }
            let mut outfile = File::create(&outpath).map_err(|e| InstallError::io(&outpath, e))?;
            std::io::copy(&mut file, &mut outfile).map_err(|e| {
                if e.kind() == std::io::ErrorKind::InvalidData {
                    InstallError::corrupt(archive_path, e)
                } else {
                    InstallError::io(&outpath, e)
                }
            })?;
        }

        if let Some(mode) = file.unix_mode() {
            file_ops::set_permissions_from_mode(&outpath, mode)
                .map_err(|e| InstallError::io(&outpath, e))?;
        }

        if (i + 1) % 100 == 0 {
            log::debug!("Extracted {}/{} entries...", i + 1, total_files);
        }
    }

    Ok(total_files)
}

fn validate_entry_path(entry_path: &Path) -> Result<(), InstallError> {
    let escapes = entry_path.components().any(|component| {
        matches!(
            component,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if escapes {
        return Err(InstallError::UnsafeEntry(entry_path.display().to_string()));
    }
    Ok(())
}

/// Reject entries that would be written through a symlink leading out of
/// `root`, such as `lnk/file` after `lnk -> /elsewhere`.
fn ensure_within(root: &Path, destination: &Path, entry_path: &Path) -> Result<(), InstallError> {
    let unsafe_entry = || InstallError::UnsafeEntry(entry_path.display().to_string());

    let mut ancestor = destination.join(entry_path);
    ancestor.pop();
    while fs::symlink_metadata(&ancestor).is_err() {
        if !ancestor.pop() {
            return Err(unsafe_entry());
        }
    }

    let resolved = ancestor.canonicalize().map_err(|_| unsafe_entry())?;
    if !resolved.starts_with(root) {
        log::warn!(
            "Entry {} resolves to {} outside {}",
            entry_path.display(),
            resolved.display(),
            root.display()
        );
        return Err(unsafe_entry());
    }
    Ok(())
}

fn normalize_path(path: &Path) -> PathBuf {
    path.components()
        .filter(|component| matches!(component, Component::Normal(_)))
        .collect()
}

/// Locate the configured launch hint inside the extracted tree.
///
/// Bundles frequently wrap their contents in a versioned top-level directory,
/// so a hint that does not exist verbatim is matched against path suffixes.
fn resolve_launch_hint(dest_dir: &Path, hint: &str) -> PathBuf {
    let hint_path = normalize_path(Path::new(hint));
    if dest_dir.join(&hint_path).is_file() {
        return hint_path;
    }

    let found = WalkDir::new(dest_dir)
        .min_depth(1)
        .max_depth(hint_path.components().count() + 2)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            entry
                .path()
                .strip_prefix(dest_dir)
                .ok()
                .map(Path::to_path_buf)
        })
        .find(|relative| relative.ends_with(&hint_path));

    match found {
        Some(relative) => {
            log::debug!("Resolved launch hint {hint} to {}", relative.display());
            relative
        }
        None => {
            log::warn!(
                "Launch hint {hint} not found under {}; reporting it unchanged",
                dest_dir.display()
            );
            hint_path
        }
    }
}
