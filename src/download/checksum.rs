use crate::error::FetchError;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

const CHECKSUM_CHUNK_SIZE: usize = 8192;

pub fn verify_checksum(file_path: &Path, expected: &str) -> Result<(), FetchError> {
    let calculated = calculate_sha256(file_path)?;

    if !calculated.eq_ignore_ascii_case(expected.trim()) {
        return Err(FetchError::ChecksumMismatch {
            path: file_path.display().to_string(),
            expected: expected.to_string(),
            actual: calculated,
        });
    }

    log::debug!("Checksum verified for {}", file_path.display());
    Ok(())
}

pub fn calculate_sha256(file_path: &Path) -> Result<String, FetchError> {
    let mut file = File::open(file_path).map_err(|e| FetchError::io(file_path, e))?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; CHECKSUM_CHUNK_SIZE];

    loop {
        match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => hasher.update(&buffer[..n]),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(FetchError::io(file_path, e)),
        }
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_calculate_sha256() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"Hello, World!").unwrap();

        let checksum = calculate_sha256(temp_file.path()).unwrap();

        assert_eq!(
            checksum,
            "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f"
        );
    }

    #[test]
    fn test_verify_checksum_accepts_uppercase() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"Hello, World!").unwrap();

        let expected = "DFFD6021BB2BD5B0AF676290809EC3A53191DD81C7F70A4B28688A362182986F";
        assert!(verify_checksum(temp_file.path(), expected).is_ok());
    }

    #[test]
    fn test_verify_checksum_mismatch() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"Test content").unwrap();

        let wrong = "0000000000000000000000000000000000000000000000000000000000000000";

        match verify_checksum(temp_file.path(), wrong) {
            Err(FetchError::ChecksumMismatch { expected, .. }) => assert_eq!(expected, wrong),
            other => panic!("Expected ChecksumMismatch, got {other:?}"),
        }
    }
}
