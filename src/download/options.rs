use std::time::Duration;

pub use super::client::DEFAULT_TIMEOUT;

/// Maximum allowed download size (1GB)
pub const MAX_DOWNLOAD_SIZE: u64 = 1_073_741_824;

/// Options for configuring download behavior
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Expected SHA-256 of the downloaded file, lowercase hex
    pub checksum: Option<String>,

    /// Longest the transfer may stall without receiving data
    pub timeout: Duration,

    /// Maximum allowed file size
    pub max_size: u64,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            checksum: None,
            timeout: DEFAULT_TIMEOUT,
            max_size: MAX_DOWNLOAD_SIZE,
        }
    }
}
