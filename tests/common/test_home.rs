use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Scratch provision home that disappears with the guard.
pub struct TestHomeGuard {
    dir: TempDir,
}

impl TestHomeGuard {
    pub fn new() -> Self {
        let dir = tempfile::Builder::new()
            .prefix("provision-home")
            .tempdir()
            .expect("Failed to create test home directory");
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn provision_home(&self) -> PathBuf {
        self.dir.path().join(".provision")
    }

    pub fn install_dir(&self) -> PathBuf {
        self.dir.path().join("install")
    }

    /// Write `config.toml` into the provision home.
    pub fn write_config(&self, contents: &str) -> &Self {
        let home = self.provision_home();
        fs::create_dir_all(&home).expect("Failed to create provision home");
        fs::write(home.join("config.toml"), contents).expect("Failed to write config.toml");
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creates_and_cleans_up_directory() {
        let test_path = {
            let guard = TestHomeGuard::new();
            let path = guard.path().to_path_buf();
            assert!(path.exists());
            path
        };
        assert!(!test_path.exists());
    }

    #[test]
    fn test_write_config() {
        let guard = TestHomeGuard::new();
        guard.write_config("[install]\nconfirm = false\n");
        assert!(guard.provision_home().join("config.toml").is_file());
    }
}
