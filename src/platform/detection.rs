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

//! Host classification.
//!
//! Detection reads the kernel name, the kernel release and the os-release
//! identification file. It never fails: anything it cannot classify maps to
//! [`PlatformId::UnknownLinux`] or [`PlatformId::Unsupported`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

/// Marker found in the kernel release of ChromeOS Linux containers.
const CHROMEOS_KERNEL_MARKER: &str = "chrome";

/// Locations of the os-release file, in lookup order.
const OS_RELEASE_PATHS: [&str; 2] = ["/etc/os-release", "/usr/lib/os-release"];

/// Closed set of host classifications every component dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformId {
    Windows,
    #[serde(rename = "macos")]
    MacOS,
    DebianLike,
    ArchLike,
    #[serde(rename = "chromeos_like")]
    ChromeOSLike,
    UnknownLinux,
    Unsupported,
}

impl PlatformId {
    pub const ALL: [PlatformId; 7] = [
        PlatformId::Windows,
        PlatformId::MacOS,
        PlatformId::DebianLike,
        PlatformId::ArchLike,
        PlatformId::ChromeOSLike,
        PlatformId::UnknownLinux,
        PlatformId::Unsupported,
    ];

    /// Human readable name used in prompts and summaries.
    pub fn description(&self) -> &'static str {
        match self {
            PlatformId::Windows => "Windows",
            PlatformId::MacOS => "macOS",
            PlatformId::DebianLike => "Debian",
            PlatformId::ArchLike => "Arch Linux",
            PlatformId::ChromeOSLike => "ChromeOS (Crostini)",
            PlatformId::UnknownLinux => "Unknown Linux",
            PlatformId::Unsupported => "Unsupported",
        }
    }

    pub fn is_linux(&self) -> bool {
        match self {
            PlatformId::DebianLike
            | PlatformId::ArchLike
            | PlatformId::ChromeOSLike
            | PlatformId::UnknownLinux => true,
            PlatformId::Windows | PlatformId::MacOS | PlatformId::Unsupported => false,
        }
    }
}

impl fmt::Display for PlatformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Read-only view of the host used by detection.
pub trait HostInfo {
    /// Kernel or OS family name, e.g. `linux`, `windows`, `darwin`/`macos`.
    fn kernel_name(&self) -> String;

    /// Kernel release string, e.g. `6.6.15-chromeos`.
    fn kernel_release(&self) -> Option<String>;

    /// Contents of the os-release identification file, if readable.
    fn os_release(&self) -> Option<String>;
}

/// [`HostInfo`] backed by the running system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemHost;

impl HostInfo for SystemHost {
    fn kernel_name(&self) -> String {
        std::env::consts::OS.to_string()
    }

    fn kernel_release(&self) -> Option<String> {
        sysinfo::System::kernel_version()
    }

    fn os_release(&self) -> Option<String> {
        OS_RELEASE_PATHS
            .iter()
            .find_map(|path| read_os_release(Path::new(path)))
    }
}

fn read_os_release(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(contents) => Some(contents),
        Err(e) => {
            log::trace!("Cannot read {}: {e}", path.display());
            None
        }
    }
}

/// Classify the running host.
pub fn detect() -> PlatformId {
    detect_with(&SystemHost)
}

/// Classify a host described by `host`.
pub fn detect_with(host: &dyn HostInfo) -> PlatformId {
    let kernel = host.kernel_name().to_ascii_lowercase();

    let platform = match kernel.as_str() {
        "windows" => PlatformId::Windows,
        "darwin" | "macos" => PlatformId::MacOS,
        "linux" => detect_linux(host),
        other => {
            log::debug!("Kernel '{other}' is not a supported family");
            PlatformId::Unsupported
        }
    };

    log::debug!("Detected platform {platform:?} (kernel: {kernel})");
    platform
}

fn detect_linux(host: &dyn HostInfo) -> PlatformId {
    // ChromeOS containers report a plain Linux kernel and a Debian os-release,
    // so the kernel marker has to be checked first.
    if let Some(release) = host.kernel_release()
        && release.to_ascii_lowercase().contains(CHROMEOS_KERNEL_MARKER)
    {
        return PlatformId::ChromeOSLike;
    }

    let Some(contents) = host.os_release() else {
        log::debug!("No os-release file found");
        return PlatformId::UnknownLinux;
    };

    match parse_os_release_id(&contents) {
        Some(id) => classify_distribution(&id),
        None => {
            log::debug!("os-release has no ID field");
            PlatformId::UnknownLinux
        }
    }
}

/// Extract the `ID` field from os-release contents, lowercased and unquoted.
pub(crate) fn parse_os_release_id(contents: &str) -> Option<String> {
    contents.lines().find_map(|line| {
        let value = line.trim().strip_prefix("ID=")?;
        let id = value
            .trim()
            .trim_matches(|c| c == '"' || c == '\'')
            .to_ascii_lowercase();
        (!id.is_empty()).then_some(id)
    })
}

fn classify_distribution(id: &str) -> PlatformId {
    match id {
        "debian" => PlatformId::DebianLike,
        "arch" => PlatformId::ArchLike,
        other => {
            log::debug!("Distribution '{other}' is not specifically supported");
            PlatformId::UnknownLinux
        }
    }
}
