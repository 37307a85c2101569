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

//! Install orchestration.
//!
//! An [`Orchestrator`] walks one run through detection, the running-instance
//! probe, channel selection and installation, and always ends with exactly one
//! [`InstallOutcome`]. A package-manager failure is recovered by a single
//! archive attempt; every other failure ends the run.

mod outcome;
mod state;

pub use outcome::{InstallOutcome, SkipReason, Stage};
pub use state::{Channel, InstallState, OutcomeKind};

use crate::archive::install_archive;
use crate::config::ProvisionConfig;
use crate::download::{DownloadJob, DownloadOptions, HttpFileDownloader, verify_https_security};
use crate::error::{PkgError, ProvisionError};
use crate::locking::{CancellationToken, DestinationLock};
use crate::models::InstallTarget;
use crate::package_manager::{
    CommandRunner, PackageManagerInstaller, SystemCommandRunner,
};
use crate::platform::{
    HostInfo, PlatformId, ProcessTable, SystemHost, SystemProcessTable, detect_with, is_running,
};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

/// Where package-manager installs are reported when the executable cannot be
/// located afterwards.
const DEFAULT_SYSTEM_BIN: &str = "/usr/bin";

/// Caller-supplied knobs for a single run.
#[derive(Debug, Clone, Default)]
pub struct InstallRequest {
    /// Replaces the platform's configured destination directory.
    pub dest_override: Option<PathBuf>,
    /// Install even when the application is already running.
    pub proceed_if_running: bool,
    /// Report the plan and stop before touching the host.
    pub dry_run: bool,
}

/// Hooks through which the caller watches and steers a run.
///
/// Every method has a default so callers only implement what they need.
pub trait InstallObserver {
    fn on_transition(&mut self, _from: &InstallState, _to: &InstallState) {}

    /// The application is running and the request did not opt in to
    /// proceeding. Return `true` to install anyway.
    fn on_already_running(&mut self, _process: &str, _platform: PlatformId) -> bool {
        false
    }

    /// Last chance to decline before anything is installed.
    fn confirm_install(
        &mut self,
        _target: &InstallTarget,
        _platform: PlatformId,
        _channel: Channel,
        _destination: Option<&Path>,
    ) -> bool {
        true
    }

    /// The package manager failed and the archive channel is about to run.
    fn on_fallback(&mut self, _error: &PkgError) {}
}

/// Observer that accepts every default.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentObserver;

impl InstallObserver for SilentObserver {}

/// Channel for `platform`, or `None` when it has no install path at all.
pub fn select_channel(platform: PlatformId, package_manager_enabled: bool) -> Option<Channel> {
    match platform {
        PlatformId::Windows | PlatformId::MacOS => Some(Channel::Archive),
        PlatformId::DebianLike | PlatformId::ArchLike | PlatformId::ChromeOSLike => {
            if package_manager_enabled {
                Some(Channel::PackageManager)
            } else {
                Some(Channel::Archive)
            }
        }
        PlatformId::UnknownLinux | PlatformId::Unsupported => None,
    }
}

pub struct Orchestrator<'a> {
    config: &'a ProvisionConfig,
    cancel: CancellationToken,
    host: Box<dyn HostInfo>,
    processes: Box<dyn ProcessTable>,
    runner: Box<dyn CommandRunner>,
    downloader: HttpFileDownloader,
    state: InstallState,
}

impl<'a> Orchestrator<'a> {
    pub fn new(config: &'a ProvisionConfig, cancel: CancellationToken) -> Self {
        Self {
            config,
            cancel,
            host: Box::new(SystemHost),
            processes: Box::new(SystemProcessTable),
            runner: Box::new(SystemCommandRunner),
            downloader: HttpFileDownloader::new(),
            state: InstallState::Start,
        }
    }

    pub fn with_host(mut self, host: Box<dyn HostInfo>) -> Self {
        self.host = host;
        self
    }

    pub fn with_process_table(mut self, processes: Box<dyn ProcessTable>) -> Self {
        self.processes = processes;
        self
    }

    pub fn with_command_runner(mut self, runner: Box<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_downloader(mut self, downloader: HttpFileDownloader) -> Self {
        self.downloader = downloader;
        self
    }

    pub fn state(&self) -> &InstallState {
        &self.state
    }

    /// Drive one run to completion.
    pub fn run(
        &mut self,
        request: &InstallRequest,
        observer: &mut dyn InstallObserver,
    ) -> InstallOutcome {
        self.state = InstallState::Start;
        let outcome = self.drive(request, observer);
        self.advance(InstallState::Done(outcome.kind()), observer);
        info!("{}", outcome.summary(&self.config.target.name));
        outcome
    }

    fn drive(
        &mut self,
        request: &InstallRequest,
        observer: &mut dyn InstallObserver,
    ) -> InstallOutcome {
        let config = self.config;
        let target = &config.target;

        self.advance(InstallState::Detecting, observer);
        let platform = detect_with(self.host.as_ref());
        info!("Detected platform: {platform}");

        self.advance(InstallState::ProbingProcess { platform }, observer);

        // Held until the run returns so nothing else extracts into the same
        // destination between the probe and the install.
        let _lock = if request.dry_run {
            None
        } else {
            let key = self.lock_key(request, platform);
            match DestinationLock::acquire(
                &config.locks_dir(),
                &key,
                config.install.lock_wait(),
                &self.cancel,
            ) {
                Ok(lock) => Some(lock),
                Err(e) => return InstallOutcome::failed(Stage::Locking, e),
            }
        };

        let process = &target.process_name;
        if is_running(process, platform, self.processes.as_ref()) {
            let proceed = request.proceed_if_running
                || config.install.proceed_if_running
                || observer.on_already_running(process, platform);
            if !proceed {
                return InstallOutcome::Skipped {
                    reason: SkipReason::AlreadyRunning {
                        process: process.clone(),
                    },
                };
            }
            warn!("{} is running; installing anyway", target.name);
        }

        self.advance(InstallState::SelectingChannel { platform }, observer);
        let Some(channel) = select_channel(platform, config.package_manager.enabled) else {
            return InstallOutcome::failed(
                Stage::ChannelSelection,
                ProvisionError::Unsupported(platform),
            );
        };
        debug!("Selected {channel} channel for {platform}");

        let destination = self.planned_destination(request, platform, channel);
        if request.dry_run {
            return InstallOutcome::Skipped {
                reason: SkipReason::DryRun {
                    channel,
                    destination,
                },
            };
        }

        if !observer.confirm_install(target, platform, channel, destination.as_deref()) {
            return InstallOutcome::Skipped {
                reason: SkipReason::UserDeclined,
            };
        }

        if self.cancel.is_cancelled() {
            return InstallOutcome::failed(Stage::ChannelSelection, ProvisionError::Cancelled);
        }

        self.advance(InstallState::Installing { platform, channel }, observer);

        if channel == Channel::PackageManager {
            match self.install_with_package_manager(platform) {
                Ok(outcome) => return outcome,
                Err(PkgError::Cancelled) => {
                    return InstallOutcome::failed(Stage::PackageManager, PkgError::Cancelled);
                }
                Err(e) => {
                    warn!("Package manager install failed, falling back to archive: {e}");
                    observer.on_fallback(&e);
                    self.advance(
                        InstallState::Installing {
                            platform,
                            channel: Channel::Archive,
                        },
                        observer,
                    );
                }
            }
        }

        self.install_from_archive(request, platform)
    }

    fn install_with_package_manager(
        &self,
        platform: PlatformId,
    ) -> Result<InstallOutcome, PkgError> {
        let config = self.config;
        let installer = PackageManagerInstaller::new(
            self.runner.as_ref(),
            config.package_manager.use_sudo,
            config.package_manager.timeout(),
        );
        installer.install(&config.target.package_name, platform, &self.cancel)?;

        let launch_hint = config.target.process_name.clone();
        let location = self
            .runner
            .locate(&launch_hint)
            .and_then(|path| path.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SYSTEM_BIN));

        Ok(InstallOutcome::Success {
            platform,
            channel: Channel::PackageManager,
            location,
            launch_hint,
        })
    }

    fn install_from_archive(
        &mut self,
        request: &InstallRequest,
        platform: PlatformId,
    ) -> InstallOutcome {
        let config = self.config;
        let artifact = match config.target.resolve_artifact(platform) {
            Ok(artifact) => artifact,
            Err(e @ ProvisionError::MissingArtifact { .. }) => {
                return InstallOutcome::failed(Stage::ChannelSelection, e);
            }
            Err(e) => return InstallOutcome::failed(Stage::Archive, e),
        };

        if let Err(e) = verify_https_security(&artifact.url, config.download.require_https) {
            return InstallOutcome::failed(Stage::Fetch, e);
        }

        let job = DownloadJob::in_dir(artifact.url.clone(), &config.downloads_dir());
        let options = DownloadOptions {
            checksum: artifact.sha256.clone(),
            timeout: config.download.timeout(),
            max_size: config.download.max_size_bytes,
        };
        info!("Downloading {} to {}", job.url, job.destination.display());
        let archive_path = match job.run(&mut self.downloader, &options, &self.cancel) {
            Ok(path) => path,
            Err(e) => return InstallOutcome::failed(Stage::Fetch, e),
        };

        if self.cancel.is_cancelled() {
            return InstallOutcome::failed(Stage::Archive, ProvisionError::Cancelled);
        }

        let dest_dir = request
            .dest_override
            .clone()
            .unwrap_or(artifact.dest_dir);
        match install_archive(&archive_path, &dest_dir, artifact.format, &artifact.launch_hint) {
            Ok(installed) => InstallOutcome::Success {
                platform,
                channel: Channel::Archive,
                launch_hint: installed.launch_hint.display().to_string(),
                location: installed.dir,
            },
            Err(e) => InstallOutcome::failed(Stage::Archive, e),
        }
    }

    /// Directory the lock is keyed on. Falls back to the target name on
    /// platforms without an archive destination.
    fn lock_key(&self, request: &InstallRequest, platform: PlatformId) -> PathBuf {
        let target = &self.config.target;
        request
            .dest_override
            .clone()
            .or_else(|| target.artifact_for(platform).map(|a| a.dest_dir.clone()))
            .unwrap_or_else(|| PathBuf::from(&target.name))
    }

    fn planned_destination(
        &self,
        request: &InstallRequest,
        platform: PlatformId,
        channel: Channel,
    ) -> Option<PathBuf> {
        match channel {
            Channel::PackageManager => None,
            Channel::Archive => request.dest_override.clone().or_else(|| {
                self.config
                    .target
                    .artifact_for(platform)
                    .map(|a| a.dest_dir.clone())
            }),
        }
    }

    fn advance(&mut self, next: InstallState, observer: &mut dyn InstallObserver) {
        debug_assert!(
            self.state.can_advance_to(&next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        debug!("{} -> {}", self.state, next);
        observer.on_transition(&self.state, &next);
        self.state = next;
    }
}
