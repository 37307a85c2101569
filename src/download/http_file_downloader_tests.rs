#[cfg(test)]
mod tests {
    use crate::download::{DownloadOptions, HttpClient, HttpFileDownloader, HttpResponse, ProgressReporter};
    use crate::error::FetchError;
    use crate::locking::CancellationToken;
    use sha2::{Digest, Sha256};
    use std::io::{Cursor, Read};
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::tempdir;

    struct MockHttpClient {
        responses: Vec<MockResponse>,
        request_count: Arc<Mutex<usize>>,
    }

    struct MockResponse {
        status: u16,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
    }

    impl MockResponse {
        fn ok(body: &[u8]) -> Self {
            Self {
                status: 200,
                headers: vec![("Content-Length".to_string(), body.len().to_string())],
                body: body.to_vec(),
            }
        }
    }

    impl MockHttpClient {
        fn new(responses: Vec<MockResponse>) -> Self {
            Self {
                responses,
                request_count: Arc::new(Mutex::new(0)),
            }
        }
    }

    impl HttpClient for MockHttpClient {
        fn get(
            &self,
            url: &str,
            _cancel: &CancellationToken,
        ) -> Result<Box<dyn HttpResponse>, FetchError> {
            let mut count = self.request_count.lock().unwrap();
            if *count >= self.responses.len() {
                return Err(FetchError::Network {
                    url: url.to_string(),
                    details: "No more mock responses".to_string(),
                });
            }

            let response = &self.responses[*count];
            *count += 1;

            Ok(Box::new(MockHttpResponse {
                status: response.status,
                headers: response.headers.clone(),
                body: Cursor::new(response.body.clone()),
            }))
        }

        fn set_timeout(&mut self, _timeout: Duration) {}
    }

    struct MockHttpResponse {
        status: u16,
        headers: Vec<(String, String)>,
        body: Cursor<Vec<u8>>,
    }

    impl Read for MockHttpResponse {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.body.read(buf)
        }
    }

    impl HttpResponse for MockHttpResponse {
        fn status(&self) -> u16 {
            self.status
        }

        fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        }
    }

    /// Trips the token once the first chunk has been written.
    struct CancelAfterFirstChunk {
        cancel: CancellationToken,
        progress: Arc<Mutex<Vec<u64>>>,
    }

    impl ProgressReporter for CancelAfterFirstChunk {
        fn on_start(&mut self, _total_bytes: u64) {}

        fn on_progress(&mut self, bytes_downloaded: u64) {
            self.progress.lock().unwrap().push(bytes_downloaded);
            self.cancel.cancel();
        }

        fn on_complete(&mut self) {}
    }

    fn dir_is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[test]
    fn test_download_with_mock_client() {
        let test_content = b"Hello, N64!";
        let mock_client = MockHttpClient::new(vec![MockResponse::ok(test_content)]);

        let mut downloader = HttpFileDownloader::with_client(Box::new(mock_client));
        let temp_dir = tempdir().unwrap();
        let dest_path = temp_dir.path().join("bundle.zip");

        let result = downloader.download(
            "https://example.com/bundle.zip",
            &dest_path,
            &DownloadOptions::default(),
            &CancellationToken::new(),
        );

        assert_eq!(result.unwrap(), dest_path);
        assert_eq!(std::fs::read(&dest_path).unwrap(), test_content);
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_download_creates_missing_parent() {
        let mock_client = MockHttpClient::new(vec![MockResponse::ok(b"data")]);
        let mut downloader = HttpFileDownloader::with_client(Box::new(mock_client));
        let temp_dir = tempdir().unwrap();
        let dest_path = temp_dir.path().join("downloads/nested/bundle.tar.gz");

        downloader
            .download(
                "https://example.com/bundle.tar.gz",
                &dest_path,
                &DownloadOptions::default(),
                &CancellationToken::new(),
            )
            .unwrap();

        assert!(dest_path.exists());
    }

    #[test]
    fn test_download_with_checksum_validation() {
        let test_content = b"Hello, N64!";
        let mock_client = MockHttpClient::new(vec![MockResponse::ok(test_content)]);

        let mut downloader = HttpFileDownloader::with_client(Box::new(mock_client));
        let temp_dir = tempdir().unwrap();
        let dest_path = temp_dir.path().join("bundle.zip");

        let expected_checksum = format!("{:x}", Sha256::digest(test_content));
        let options = DownloadOptions {
            checksum: Some(expected_checksum),
            ..Default::default()
        };

        let result = downloader.download(
            "https://example.com/bundle.zip",
            &dest_path,
            &options,
            &CancellationToken::new(),
        );

        assert!(result.is_ok());
    }

    #[test]
    fn test_download_with_invalid_checksum_leaves_nothing() {
        let mock_client = MockHttpClient::new(vec![MockResponse::ok(b"Hello, N64!")]);

        let mut downloader = HttpFileDownloader::with_client(Box::new(mock_client));
        let temp_dir = tempdir().unwrap();
        let dest_path = temp_dir.path().join("bundle.zip");

        let options = DownloadOptions {
            checksum: Some("invalid_checksum".to_string()),
            ..Default::default()
        };

        let result = downloader.download(
            "https://example.com/bundle.zip",
            &dest_path,
            &options,
            &CancellationToken::new(),
        );

        assert!(matches!(result, Err(FetchError::ChecksumMismatch { .. })));
        assert!(!dest_path.exists());
        assert!(dir_is_empty(temp_dir.path()));
    }

    #[test]
    fn test_download_with_http_error() {
        let mock_client = MockHttpClient::new(vec![MockResponse {
            status: 404,
            headers: vec![],
            body: b"not found".to_vec(),
        }]);

        let mut downloader = HttpFileDownloader::with_client(Box::new(mock_client));
        let temp_dir = tempdir().unwrap();
        let dest_path = temp_dir.path().join("bundle.zip");

        let result = downloader.download(
            "https://example.com/bundle.zip",
            &dest_path,
            &DownloadOptions::default(),
            &CancellationToken::new(),
        );

        let err = result.unwrap_err();
        assert_eq!(err.http_status(), Some(404));
        assert!(!dest_path.exists());
        assert!(dir_is_empty(temp_dir.path()));
    }

    #[test]
    fn test_download_exceeding_size_limit() {
        let mock_client = MockHttpClient::new(vec![MockResponse {
            status: 200,
            headers: vec![("Content-Length".to_string(), "2000000000".to_string())],
            body: vec![],
        }]);

        let mut downloader = HttpFileDownloader::with_client(Box::new(mock_client));
        let temp_dir = tempdir().unwrap();
        let dest_path = temp_dir.path().join("bundle.zip");

        let result = downloader.download(
            "https://example.com/bundle.zip",
            &dest_path,
            &DownloadOptions::default(),
            &CancellationToken::new(),
        );

        match result {
            Err(FetchError::TooLarge { size, .. }) => assert_eq!(size, 2_000_000_000),
            other => panic!("Expected TooLarge, got {other:?}"),
        }
    }

    #[test]
    fn test_streamed_size_limit_without_content_length() {
        let mock_client = MockHttpClient::new(vec![MockResponse {
            status: 200,
            headers: vec![],
            body: vec![7u8; 64],
        }]);

        let mut downloader = HttpFileDownloader::with_client(Box::new(mock_client));
        let temp_dir = tempdir().unwrap();
        let dest_path = temp_dir.path().join("bundle.zip");

        let options = DownloadOptions {
            max_size: 16,
            ..Default::default()
        };
        let result = downloader.download(
            "https://example.com/bundle.zip",
            &dest_path,
            &options,
            &CancellationToken::new(),
        );

        assert!(matches!(result, Err(FetchError::TooLarge { max: 16, .. })));
        assert!(dir_is_empty(temp_dir.path()));
    }

    #[test]
    fn test_cancellation_mid_download_removes_partial_file() {
        let cancel = CancellationToken::new();
        let progress = Arc::new(Mutex::new(Vec::new()));
        let mock_client = MockHttpClient::new(vec![MockResponse::ok(&vec![1u8; 64 * 1024])]);

        let mut downloader = HttpFileDownloader::with_client(Box::new(mock_client))
            .with_progress_reporter(Box::new(CancelAfterFirstChunk {
                cancel: cancel.clone(),
                progress: progress.clone(),
            }));
        let temp_dir = tempdir().unwrap();
        let dest_path = temp_dir.path().join("bundle.zip");

        let result = downloader.download(
            "https://example.com/bundle.zip",
            &dest_path,
            &DownloadOptions::default(),
            &cancel,
        );

        assert!(matches!(result, Err(FetchError::Cancelled)));
        assert_eq!(progress.lock().unwrap().len(), 1);
        assert!(!dest_path.exists());
        assert!(dir_is_empty(temp_dir.path()));
    }

    #[test]
    fn test_cancelled_before_request_sends_nothing() {
        let client = MockHttpClient::new(vec![MockResponse::ok(b"data")]);
        let requests = client.request_count.clone();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut downloader = HttpFileDownloader::with_client(Box::new(client));
        let temp_dir = tempdir().unwrap();
        let result = downloader.download(
            "https://example.com/bundle.zip",
            &temp_dir.path().join("bundle.zip"),
            &DownloadOptions::default(),
            &cancel,
        );

        assert!(matches!(result, Err(FetchError::Cancelled)));
        assert_eq!(*requests.lock().unwrap(), 0);
    }
}
