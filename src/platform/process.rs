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

//! Running-instance detection.

use crate::error::{ProvisionError, Result};
use crate::platform::PlatformId;
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};

/// A single row of the host process table.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProcessEntry {
    /// Operating system process identifier.
    pub pid: u32,
    /// Image name of the executable.
    pub name: String,
    /// Full command line joined with spaces. Empty when the OS hides it.
    pub cmdline: String,
}

/// Source of process table snapshots.
pub trait ProcessTable {
    fn snapshot(&self) -> Result<Vec<ProcessEntry>>;

    /// Pid of the probing process itself, excluded from matches.
    fn current_pid(&self) -> Option<u32>;
}

/// [`ProcessTable`] backed by `sysinfo`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcessTable;

impl ProcessTable for SystemProcessTable {
    fn snapshot(&self) -> Result<Vec<ProcessEntry>> {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return Err(ProvisionError::ProcessProbe(
                "process inspection is not supported on this system".to_string(),
            ));
        }

        let mut system = System::new();
        system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            ProcessRefreshKind::new().with_cmd(UpdateKind::Always),
        );

        let entries = system
            .processes()
            .iter()
            .map(|(pid, process)| ProcessEntry {
                pid: pid.as_u32(),
                name: process.name().to_string_lossy().into_owned(),
                cmdline: process
                    .cmd()
                    .iter()
                    .map(|arg| arg.to_string_lossy())
                    .collect::<Vec<_>>()
                    .join(" "),
            })
            .collect();

        Ok(entries)
    }

    fn current_pid(&self) -> Option<u32> {
        sysinfo::get_current_pid().ok().map(|pid| pid.as_u32())
    }
}

/// Whether a process matching `process_name` is active on the host.
///
/// Windows matches image names case-insensitively. Unix-like hosts match the
/// command line, falling back to the image name for processes whose command
/// line is hidden. Probe failures are logged and reported as not running.
pub fn is_running(process_name: &str, platform: PlatformId, table: &dyn ProcessTable) -> bool {
    let needle = process_name.trim();
    if needle.is_empty() {
        return false;
    }

    let matcher: fn(&ProcessEntry, &str) -> bool = match platform {
        PlatformId::Windows => matches_image_name,
        PlatformId::MacOS
        | PlatformId::DebianLike
        | PlatformId::ArchLike
        | PlatformId::ChromeOSLike
        | PlatformId::UnknownLinux => matches_command_line,
        PlatformId::Unsupported => {
            log::debug!("Skipping process probe on unsupported platform");
            return false;
        }
    };

    let entries = match table.snapshot() {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("Could not inspect running processes, assuming '{needle}' is not running: {e}");
            return false;
        }
    };

    let own_pid = table.current_pid();
    let found = entries
        .iter()
        .filter(|entry| Some(entry.pid) != own_pid)
        .find(|entry| matcher(entry, needle));

    match found {
        Some(entry) => {
            log::info!("Found running '{needle}' process (pid {})", entry.pid);
            true
        }
        None => {
            log::debug!("No running '{needle}' process among {} entries", entries.len());
            false
        }
    }
}

fn matches_image_name(entry: &ProcessEntry, needle: &str) -> bool {
    entry
        .name
        .to_lowercase()
        .contains(&needle.to_lowercase())
}

fn matches_command_line(entry: &ProcessEntry, needle: &str) -> bool {
    if entry.cmdline.is_empty() {
        entry.name.contains(needle)
    } else {
        entry.cmdline.contains(needle)
    }
}
