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

use crate::download::{DEFAULT_TIMEOUT, MAX_DOWNLOAD_SIZE};
use crate::error::{ProvisionError, Result};
use crate::models::InstallTarget;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE_NAME: &str = "config.toml";
const HOME_ENV: &str = "PROVISION_HOME";
const ENV_PREFIX: &str = "PROVISION";
const DEFAULT_HOME_DIR: &str = ".provision";
const DOWNLOADS_DIR: &str = "downloads";
const LOCKS_DIR: &str = "locks";
const DEFAULT_PACKAGE_MANAGER_TIMEOUT_SECS: u64 = 900;
const DEFAULT_LOCK_WAIT_SECS: u64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvisionConfig {
    /// Directory holding `config.toml`, downloads and lock files.
    #[serde(skip)]
    home: PathBuf,

    #[serde(default)]
    pub target: InstallTarget,

    #[serde(default)]
    pub download: DownloadConfig,

    #[serde(default)]
    pub package_manager: PackageManagerConfig,

    #[serde(default)]
    pub install: InstallConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    #[serde(default = "default_download_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_size_bytes")]
    pub max_size_bytes: u64,
    #[serde(default = "default_true")]
    pub require_https: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_download_timeout_secs(),
            max_size_bytes: default_max_size_bytes(),
            require_https: true,
        }
    }
}

impl DownloadConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageManagerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Prefix invocations with `sudo -n` when not already root.
    #[serde(default = "default_true")]
    pub use_sudo: bool,
    #[serde(default = "default_package_manager_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for PackageManagerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            use_sudo: true,
            timeout_secs: DEFAULT_PACKAGE_MANAGER_TIMEOUT_SECS,
        }
    }
}

impl PackageManagerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallConfig {
    #[serde(default)]
    pub proceed_if_running: bool,
    #[serde(default = "default_true")]
    pub confirm: bool,
    /// How long to wait for another run holding the destination lock.
    #[serde(default = "default_lock_wait_secs")]
    pub lock_wait_secs: u64,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            proceed_if_running: false,
            confirm: true,
            lock_wait_secs: DEFAULT_LOCK_WAIT_SECS,
        }
    }
}

impl InstallConfig {
    pub fn lock_wait(&self) -> Duration {
        Duration::from_secs(self.lock_wait_secs)
    }
}

fn default_true() -> bool {
    true
}

fn default_download_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

fn default_max_size_bytes() -> u64 {
    MAX_DOWNLOAD_SIZE
}

fn default_package_manager_timeout_secs() -> u64 {
    DEFAULT_PACKAGE_MANAGER_TIMEOUT_SECS
}

fn default_lock_wait_secs() -> u64 {
    DEFAULT_LOCK_WAIT_SECS
}

impl ProvisionConfig {
    /// Layer defaults, `<home>/config.toml` and `PROVISION_*` variables.
    pub fn load(home: &Path) -> Result<Self> {
        let config_path = home.join(CONFIG_FILE_NAME);
        let defaults = Config::try_from(&Self::default())
            .map_err(|e| ProvisionError::ConfigError(format!("Failed to build defaults: {e}")))?;

        let settings = Config::builder()
            .add_source(defaults)
            .add_source(
                File::from(config_path.as_path())
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| {
                ProvisionError::ConfigError(format!("Failed to read {}: {e}", config_path.display()))
            })?;

        let mut config: ProvisionConfig = settings
            .try_deserialize()
            .map_err(|e| ProvisionError::ConfigError(format!("Failed to parse config: {e}")))?;
        config.home = home.to_path_buf();

        if config_path.exists() {
            log::debug!("Loaded config from {}", config_path.display());
        } else {
            log::debug!("Config file not found at {}, using defaults", config_path.display());
        }

        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = self.config_path();

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| ProvisionError::ConfigError(format!("Failed to serialize config: {e}")))?;

        fs::write(&config_path, contents)?;
        log::debug!("Saved config to {}", config_path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.target.validate()?;
        if self.download.timeout_secs == 0 {
            return Err(ProvisionError::InvalidConfig(
                "download.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.package_manager.timeout_secs == 0 {
            return Err(ProvisionError::InvalidConfig(
                "package_manager.timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = home.into();
        self
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn config_path(&self) -> PathBuf {
        self.home.join(CONFIG_FILE_NAME)
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.home.join(DOWNLOADS_DIR)
    }

    pub fn locks_dir(&self) -> PathBuf {
        self.home.join(LOCKS_DIR)
    }
}

/// Resolve the provision home: `$PROVISION_HOME`, else `~/.provision`.
pub fn resolve_home() -> Result<PathBuf> {
    if let Some(home) = env::var_os(HOME_ENV).filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(home));
    }
    dirs::home_dir()
        .map(|dir| dir.join(DEFAULT_HOME_DIR))
        .ok_or_else(|| {
            ProvisionError::ConfigError(format!(
                "Could not determine home directory; set {HOME_ENV}"
            ))
        })
}

/// Load the configuration for this process.
pub fn new_provision_config() -> Result<ProvisionConfig> {
    let home = resolve_home()?;
    ProvisionConfig::load(&home)
}
