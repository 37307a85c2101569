use crate::download::checksum::verify_checksum;
use crate::download::client::{AttohttpcClient, HttpClient, HttpResponse};
use crate::download::options::DownloadOptions;
use crate::error::FetchError;
use crate::locking::CancellationToken;
use std::fs;
use std::io::{BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tempfile::NamedTempFile;

const DOWNLOAD_CHUNK_SIZE: usize = 8192;

pub trait ProgressReporter: Send + Sync {
    fn on_start(&mut self, total_bytes: u64);

    fn on_progress(&mut self, bytes_downloaded: u64);

    fn on_complete(&mut self);
}

pub struct HttpFileDownloader {
    pub(crate) http_client: Box<dyn HttpClient>,
    progress_reporter: Option<Box<dyn ProgressReporter>>,
}

impl Default for HttpFileDownloader {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpFileDownloader {
    pub fn new() -> Self {
        Self::with_client(Box::new(AttohttpcClient::new()))
    }

    pub fn with_client(http_client: Box<dyn HttpClient>) -> Self {
        Self {
            http_client,
            progress_reporter: None,
        }
    }

    pub fn with_progress_reporter(mut self, reporter: Box<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Stream `url` into `destination`.
    ///
    /// Bytes land in a temporary file beside the destination that is renamed
    /// into place only after the transfer and checksum succeed, so no failure
    /// path leaves a partial file at `destination`.
    pub fn download(
        &mut self,
        url: &str,
        destination: &Path,
        options: &DownloadOptions,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, FetchError> {
        let parent = destination
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(|e| FetchError::io(parent, e))?;

        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        self.http_client.set_timeout(options.timeout);
        log::debug!("GET {url}");
        let response = self.http_client.get(url, cancel)?;

        self.validate_response(url, response.as_ref(), options.max_size)?;
        let total_size = content_length(response.as_ref()).unwrap_or(0);

        // Dropping the handle on any early return removes the file.
        let mut temp_file =
            NamedTempFile::new_in(parent).map_err(|e| FetchError::io(parent, e))?;

        if let Some(reporter) = &mut self.progress_reporter {
            reporter.on_start(total_size);
        }

        let temp_path = temp_file.path().to_path_buf();
        let downloaded = self.stream_to_file(
            url,
            response,
            temp_file.as_file_mut(),
            &temp_path,
            options,
            cancel,
        )?;
        log::debug!("Received {downloaded} bytes from {url}");

        if let Some(expected) = &options.checksum {
            verify_checksum(temp_file.path(), expected)?;
        }

        temp_file
            .persist(destination)
            .map_err(|e| FetchError::io(destination, e.error))?;

        if let Some(reporter) = &mut self.progress_reporter {
            reporter.on_complete();
        }

        Ok(destination.to_path_buf())
    }

    fn validate_response(
        &self,
        url: &str,
        response: &dyn HttpResponse,
        max_size: u64,
    ) -> Result<(), FetchError> {
        let status = response.status();

        if !(200..300).contains(&status) {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status,
            });
        }

        if let Some(length) = content_length(response).filter(|length| *length > max_size) {
            return Err(FetchError::TooLarge {
                size: length,
                max: max_size,
            });
        }

        Ok(())
    }

    fn stream_to_file(
        &mut self,
        url: &str,
        mut response: Box<dyn HttpResponse>,
        file: &mut fs::File,
        path: &Path,
        options: &DownloadOptions,
        cancel: &CancellationToken,
    ) -> Result<u64, FetchError> {
        let mut writer = BufWriter::new(file);
        let mut downloaded = 0u64;
        let mut buffer = vec![0; DOWNLOAD_CHUNK_SIZE];
        let mut last_data = Instant::now();

        loop {
            if cancel.is_cancelled() {
                log::debug!("Download of {url} cancelled after {downloaded} bytes");
                return Err(FetchError::Cancelled);
            }

            match response.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => {
                    writer
                        .write_all(&buffer[..n])
                        .map_err(|e| FetchError::io(path, e))?;
                    downloaded += n as u64;
                    last_data = Instant::now();

                    if downloaded > options.max_size {
                        return Err(FetchError::TooLarge {
                            size: downloaded,
                            max: options.max_size,
                        });
                    }

                    if let Some(reporter) = &mut self.progress_reporter {
                        reporter.on_progress(downloaded);
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                    if last_data.elapsed() >= options.timeout {
                        return Err(FetchError::TimedOut {
                            secs: options.timeout.as_secs(),
                        });
                    }
                }
                Err(e) => {
                    return Err(FetchError::Network {
                        url: url.to_string(),
                        details: e.to_string(),
                    });
                }
            }
        }

        writer.flush().map_err(|e| FetchError::io(path, e))?;
        Ok(downloaded)
    }
}

fn content_length(response: &dyn HttpResponse) -> Option<u64> {
    response
        .header("Content-Length")
        .and_then(|value| value.trim().parse::<u64>().ok())
}

#[cfg(test)]
#[path = "http_file_downloader_tests.rs"]
mod http_file_downloader_tests;
