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

//! Installation through the host's native package manager.
//!
//! Every step runs with a fixed, non-interactive argument vector so that no
//! invocation can block on terminal input.

mod runner;

pub use runner::{CommandRunner, CommandStatus, Invocation, RunError, SystemCommandRunner};

use crate::error::PkgError;
use crate::locking::CancellationToken;
use crate::platform::{self, PlatformId};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageManager {
    Apt,
    Pacman,
}

impl PackageManager {
    /// Native package manager for `platform`, if the platform has one.
    ///
    /// ChromeOS Linux containers are Debian-based and use apt.
    pub fn for_platform(platform: PlatformId) -> Option<Self> {
        match platform {
            PlatformId::DebianLike | PlatformId::ChromeOSLike => Some(PackageManager::Apt),
            PlatformId::ArchLike => Some(PackageManager::Pacman),
            PlatformId::Windows
            | PlatformId::MacOS
            | PlatformId::UnknownLinux
            | PlatformId::Unsupported => None,
        }
    }

    pub fn program(&self) -> &'static str {
        match self {
            PackageManager::Apt => "apt-get",
            PackageManager::Pacman => "pacman",
        }
    }

    pub fn refresh_invocation(&self) -> Invocation {
        match self {
            PackageManager::Apt => Invocation::new("apt-get", ["update"])
                .with_env("DEBIAN_FRONTEND", "noninteractive"),
            PackageManager::Pacman => Invocation::new("pacman", ["-Sy", "--noconfirm"]),
        }
    }

    pub fn install_invocation(&self, package: &str) -> Invocation {
        match self {
            PackageManager::Apt => Invocation::new("apt-get", ["install", "-y", package])
                .with_env("DEBIAN_FRONTEND", "noninteractive"),
            PackageManager::Pacman => {
                Invocation::new("pacman", ["-S", "--noconfirm", "--needed", package])
            }
        }
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.program())
    }
}

/// Drives the refresh and install steps for one package.
pub struct PackageManagerInstaller<'a> {
    runner: &'a dyn CommandRunner,
    use_sudo: bool,
    timeout: Duration,
}

impl<'a> PackageManagerInstaller<'a> {
    pub fn new(runner: &'a dyn CommandRunner, use_sudo: bool, timeout: Duration) -> Self {
        Self {
            runner,
            use_sudo,
            timeout,
        }
    }

    /// Refresh package indexes, then install `package`.
    pub fn install(
        &self,
        package: &str,
        platform: PlatformId,
        cancel: &CancellationToken,
    ) -> Result<PackageManager, PkgError> {
        let manager = PackageManager::for_platform(platform).ok_or_else(|| {
            PkgError::Unavailable(format!("{platform} has no supported package manager"))
        })?;

        if self.runner.locate(manager.program()).is_none() {
            return Err(PkgError::Unavailable(format!(
                "{} not found on PATH",
                manager.program()
            )));
        }

        let elevate = self.use_sudo && !platform::is_elevated();
        if elevate && self.runner.locate("sudo").is_none() {
            return Err(PkgError::Unavailable(
                "sudo not found; run as root or set package_manager.use_sudo = false".to_string(),
            ));
        }

        let prepare = |invocation: Invocation| {
            if elevate {
                invocation.elevated()
            } else {
                invocation
            }
        };

        let status = self.run_step(&prepare(manager.refresh_invocation()), cancel)?;
        if !status.success() {
            return Err(PkgError::RefreshFailed {
                manager: manager.program().to_string(),
                status: status.code,
            });
        }

        let status = self.run_step(&prepare(manager.install_invocation(package)), cancel)?;
        if !status.success() {
            return Err(PkgError::InstallFailed {
                manager: manager.program().to_string(),
                package: package.to_string(),
                status: status.code,
            });
        }

        log::info!("Installed {package} with {manager}");
        Ok(manager)
    }

    fn run_step(
        &self,
        invocation: &Invocation,
        cancel: &CancellationToken,
    ) -> Result<CommandStatus, PkgError> {
        if cancel.is_cancelled() {
            return Err(PkgError::Cancelled);
        }

        self.runner
            .run(invocation, self.timeout, cancel)
            .map_err(|err| match err {
                RunError::Spawn(source) => PkgError::Spawn {
                    program: invocation.program.clone(),
                    source,
                },
                RunError::TimedOut(limit) => PkgError::TimedOut {
                    program: invocation.program.clone(),
                    secs: limit.as_secs(),
                },
                RunError::Cancelled => PkgError::Cancelled,
            })
    }
}
