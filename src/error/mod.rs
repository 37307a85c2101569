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

mod context;
mod exit_codes;
mod format;

pub use context::ErrorContext;
pub use exit_codes::{
    EXIT_CANCELLED, EXIT_CONFIG, EXIT_FAILURE, EXIT_FETCH, EXIT_INSTALL_ARCHIVE, EXIT_LOCKED,
    EXIT_NOT_RUNNING, EXIT_PACKAGE_MANAGER, EXIT_SKIPPED, EXIT_SUCCESS, EXIT_UNSUPPORTED, get_exit_code,
};
pub use format::{format_error_chain, format_error_with_color};

use crate::platform::PlatformId;
use thiserror::Error;

/// Failures of the artifact fetcher. A failed fetch never leaves a partial file
/// at the destination path.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network error while fetching {url}: {details}")]
    Network { url: String, details: String },

    #[error("Server responded with HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("I/O error writing {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Download size {size} exceeds maximum allowed size {max}")]
    TooLarge { size: u64, max: u64 },

    #[error("Download timed out after {secs}s")]
    TimedOut { secs: u64 },

    #[error("Checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("Refusing to download over insecure URL: {0}")]
    Insecure(String),

    #[error("Download cancelled")]
    Cancelled,
}

impl FetchError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        FetchError::Io {
            path: path.display().to_string(),
            source,
        }
    }

    /// HTTP status of the failed response, when the failure was a status error.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            FetchError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Failures of the archive installer.
#[derive(Error, Debug)]
pub enum InstallError {
    #[error("Unsupported archive format: {0}")]
    UnsupportedFormat(String),

    #[error("Corrupt archive {path}: {details}")]
    CorruptArchive { path: String, details: String },

    #[error("Archive entry escapes the destination: {0}")]
    UnsafeEntry(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl InstallError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        InstallError::Io {
            path: path.display().to_string(),
            source,
        }
    }

    pub(crate) fn corrupt(path: &std::path::Path, details: impl ToString) -> Self {
        InstallError::CorruptArchive {
            path: path.display().to_string(),
            details: details.to_string(),
        }
    }
}

/// Failures of the package-manager channel. All of them are recovered by the
/// archive fallback except `Cancelled`.
#[derive(Error, Debug)]
pub enum PkgError {
    #[error("No usable package manager: {0}")]
    Unavailable(String),

    #[error("{manager} refresh failed ({})", describe_status(.status))]
    RefreshFailed {
        manager: String,
        status: Option<i32>,
    },

    #[error("{manager} could not install '{package}' ({})", describe_status(.status))]
    InstallFailed {
        manager: String,
        package: String,
        status: Option<i32>,
    },

    #[error("Failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' did not finish within {secs}s")]
    TimedOut { program: String, secs: u64 },

    #[error("Package manager invocation cancelled")]
    Cancelled,
}

fn describe_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("exit status {code}"),
        None => "terminated by signal".to_string(),
    }
}

#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Install(#[from] InstallError),

    #[error(transparent)]
    PackageManager(#[from] PkgError),

    #[error("Platform '{0}' is not supported")]
    Unsupported(PlatformId),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Destination {path} is locked by another installation")]
    Locked { path: String, waited_secs: f64 },

    #[error("Process inspection failed: {0}")]
    ProcessProbe(String),

    #[error("No {platform} artifact configured for '{target}'")]
    MissingArtifact { target: String, platform: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("System error: {0}")]
    SystemError(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ProvisionError {
    /// Whether this error represents a caller-triggered cancellation or deadline.
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            ProvisionError::Cancelled
                | ProvisionError::Fetch(FetchError::Cancelled)
                | ProvisionError::PackageManager(PkgError::Cancelled)
        )
    }
}

pub type Result<T> = std::result::Result<T, ProvisionError>;
