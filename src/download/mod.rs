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

//! Artifact fetching over HTTP(S).
//!
//! Responses are streamed to disk in fixed-size chunks through a temporary file,
//! with optional SHA-256 verification and progress reporting.
mod checksum;
mod client;
mod http_file_downloader;
mod options;
mod progress;

pub use checksum::{calculate_sha256, verify_checksum};
pub use client::{AttohttpcClient, HttpClient, HttpResponse, READ_POLL_INTERVAL};
pub use http_file_downloader::{HttpFileDownloader, ProgressReporter};
pub use options::{DEFAULT_TIMEOUT, DownloadOptions, MAX_DOWNLOAD_SIZE};
pub use progress::IndicatifProgressReporter;

use crate::error::FetchError;
use crate::locking::CancellationToken;
use std::path::{Path, PathBuf};

/// One pending transfer: where the bytes come from and where they land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    pub url: String,
    pub destination: PathBuf,
}

impl DownloadJob {
    pub fn new(url: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            destination: destination.into(),
        }
    }

    /// Job downloading `url` into `dir`, named after the last URL path segment.
    pub fn in_dir(url: impl Into<String>, dir: &Path) -> Self {
        let url = url.into();
        let file_name = file_name_from_url(&url).unwrap_or("artifact.download");
        let destination = dir.join(file_name);
        Self { url, destination }
    }

    pub fn run(
        &self,
        downloader: &mut HttpFileDownloader,
        options: &DownloadOptions,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, FetchError> {
        downloader.download(&self.url, &self.destination, options, cancel)
    }
}

/// Fetch `url` into `destination` with default options and no cancellation.
pub fn fetch(url: &str, destination: &Path) -> Result<(), FetchError> {
    let mut downloader = HttpFileDownloader::new();
    downloader.download(
        url,
        destination,
        &DownloadOptions::default(),
        &CancellationToken::new(),
    )?;
    Ok(())
}

/// Reject plain-HTTP URLs when secure transport is required.
pub fn verify_https_security(url: &str, require_https: bool) -> Result<(), FetchError> {
    if !require_https {
        return Ok(());
    }
    if url.starts_with("https://") {
        Ok(())
    } else {
        Err(FetchError::Insecure(url.to_string()))
    }
}

fn file_name_from_url(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next()?;
    path.rsplit('/').next().filter(|name| !name.is_empty())
}
