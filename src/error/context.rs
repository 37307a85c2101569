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

use crate::error::{FetchError, InstallError, PkgError, ProvisionError};
use std::fmt;

pub struct ErrorContext<'a> {
    pub error: &'a ProvisionError,
    pub suggestion: Option<String>,
    pub details: Option<String>,
}

impl<'a> ErrorContext<'a> {
    pub fn new(error: &'a ProvisionError) -> Self {
        let (suggestion, details) = match error {
            ProvisionError::Fetch(fetch) => fetch_context(fetch),
            ProvisionError::Install(install) => install_context(install),
            ProvisionError::PackageManager(pkg) => package_manager_context(pkg),
            ProvisionError::Unsupported(platform) => {
                let suggestion = Some(
                    "Supported hosts are Windows, macOS, Debian, Arch Linux and ChromeOS \
                     (Crostini). Install the application manually on this system."
                        .to_string(),
                );
                let details = Some(format!("Detected platform: {platform}"));
                (suggestion, details)
            }
            ProvisionError::Cancelled => (
                Some("Re-run the command, or raise --timeout if the deadline was too short.".to_string()),
                None,
            ),
            ProvisionError::Locked { path, waited_secs } => {
                let suggestion = Some(
                    "Another provision run is installing into the same directory. Wait for it \
                     to finish and try again."
                        .to_string(),
                );
                let details = Some(format!("Waited {waited_secs:.1}s for the lock on {path}"));
                (suggestion, details)
            }
            ProvisionError::ProcessProbe(msg) => (None, Some(msg.clone())),
            ProvisionError::MissingArtifact { platform, .. } => {
                let suggestion = Some(format!(
                    "Add a [target.artifacts.{platform}] table to config.toml with the archive \
                     url, dest_dir, format and launch_hint."
                ));
                (suggestion, None)
            }
            ProvisionError::ConfigError(msg) | ProvisionError::InvalidConfig(msg) => {
                let suggestion = Some(
                    "Check config.toml in the provision home directory and any PROVISION_* \
                     environment variables."
                        .to_string(),
                );
                let details = Some(msg.clone());
                (suggestion, details)
            }
            ProvisionError::Io(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                (Some(permission_suggestion()), Some(e.to_string()))
            }
            _ => (None, None),
        };

        Self {
            error,
            suggestion,
            details,
        }
    }

    pub fn with_suggestion(mut self, suggestion: String) -> Self {
        self.suggestion = Some(suggestion);
        self
    }

    pub fn with_details(mut self, details: String) -> Self {
        self.details = Some(details);
        self
    }
}

fn fetch_context(error: &FetchError) -> (Option<String>, Option<String>) {
    match error {
        FetchError::Network { details, .. } => (
            Some(
                "Check your internet connection and proxy settings, then try again.".to_string(),
            ),
            Some(details.clone()),
        ),
        FetchError::HttpStatus { status: 404, url } => (
            Some(
                "The release archive was not found. Check target.version and target.base_url in \
                 config.toml."
                    .to_string(),
            ),
            Some(format!("Requested URL: {url}")),
        ),
        FetchError::HttpStatus { url, .. } => (
            Some("The download server rejected the request. Try again later.".to_string()),
            Some(format!("Requested URL: {url}")),
        ),
        FetchError::TimedOut { .. } => (
            Some("Use --timeout or download.timeout_secs to allow more time.".to_string()),
            None,
        ),
        FetchError::ChecksumMismatch { .. } => (
            Some(
                "Try downloading again. If the problem persists, the file may be corrupted at \
                 the source."
                    .to_string(),
            ),
            None,
        ),
        FetchError::Insecure(_) => (
            Some(
                "Use an https:// URL, or set download.require_https = false if you trust the \
                 mirror."
                    .to_string(),
            ),
            None,
        ),
        FetchError::Io { source, .. } if source.kind() == std::io::ErrorKind::PermissionDenied => {
            (Some(permission_suggestion()), None)
        }
        _ => (None, None),
    }
}

fn install_context(error: &InstallError) -> (Option<String>, Option<String>) {
    match error {
        InstallError::CorruptArchive { path, .. } => (
            Some(format!(
                "The archive was kept at {path} for inspection. Delete it and try again."
            )),
            None,
        ),
        InstallError::UnsupportedFormat(_) => (
            Some("Only .tar.gz and .zip archives can be installed.".to_string()),
            None,
        ),
        InstallError::UnsafeEntry(_) => (
            Some("The archive tries to write outside its destination and was rejected.".to_string()),
            None,
        ),
        InstallError::Io { source, .. } if source.kind() == std::io::ErrorKind::PermissionDenied => {
            (Some(permission_suggestion()), None)
        }
        InstallError::Io { .. } => (
            Some("Ensure you have enough disk space and try again.".to_string()),
            None,
        ),
    }
}

fn package_manager_context(error: &PkgError) -> (Option<String>, Option<String>) {
    match error {
        PkgError::RefreshFailed { manager, .. } | PkgError::InstallFailed { manager, .. } => (
            Some(format!(
                "Run the {manager} command manually to see its output, or disable the package \
                 manager channel with package_manager.enabled = false."
            )),
            None,
        ),
        PkgError::Unavailable(msg) => (None, Some(msg.clone())),
        _ => (None, None),
    }
}

fn permission_suggestion() -> String {
    if cfg!(unix) {
        "Try running with sudo, or pass --dest with a directory you can write to.".to_string()
    } else {
        "Run as Administrator, or pass --dest with a directory you can write to.".to_string()
    }
}

impl fmt::Display for ErrorContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error: {}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\n\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\n\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}
