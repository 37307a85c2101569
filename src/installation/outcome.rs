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

use super::state::{Channel, OutcomeKind};
use crate::error::{EXIT_SKIPPED, EXIT_SUCCESS, ProvisionError, get_exit_code};
use crate::platform::PlatformId;
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;

/// Pipeline step a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Detection,
    Locking,
    ProcessProbe,
    ChannelSelection,
    PackageManager,
    Fetch,
    Archive,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Detection => "platform detection",
            Stage::Locking => "destination locking",
            Stage::ProcessProbe => "process check",
            Stage::ChannelSelection => "channel selection",
            Stage::PackageManager => "package manager install",
            Stage::Fetch => "download",
            Stage::Archive => "archive extraction",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    AlreadyRunning { process: String },
    UserDeclined,
    DryRun {
        channel: Channel,
        destination: Option<PathBuf>,
    },
}

/// Terminal value of an install run.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InstallOutcome {
    Success {
        platform: PlatformId,
        channel: Channel,
        location: PathBuf,
        launch_hint: String,
    },
    Skipped {
        reason: SkipReason,
    },
    Failed {
        stage: Stage,
        #[serde(serialize_with = "serialize_cause")]
        cause: ProvisionError,
    },
}

fn serialize_cause<S: Serializer>(cause: &ProvisionError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(cause)
}

impl InstallOutcome {
    pub(crate) fn failed(stage: Stage, cause: impl Into<ProvisionError>) -> Self {
        InstallOutcome::Failed {
            stage,
            cause: cause.into(),
        }
    }

    pub fn kind(&self) -> OutcomeKind {
        match self {
            InstallOutcome::Success { .. } => OutcomeKind::Success,
            InstallOutcome::Skipped { .. } => OutcomeKind::Skipped,
            InstallOutcome::Failed { .. } => OutcomeKind::Failed,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, InstallOutcome::Success { .. })
    }

    /// Process exit status for this outcome.
    pub fn exit_code(&self) -> i32 {
        match self {
            InstallOutcome::Success { .. } => EXIT_SUCCESS,
            InstallOutcome::Skipped {
                reason: SkipReason::DryRun { .. },
            } => EXIT_SUCCESS,
            InstallOutcome::Skipped { .. } => EXIT_SKIPPED,
            InstallOutcome::Failed { cause, .. } => get_exit_code(cause),
        }
    }

    /// One-line human readable summary.
    pub fn summary(&self, app: &str) -> String {
        match self {
            InstallOutcome::Success {
                channel: Channel::PackageManager,
                location,
                launch_hint,
                ..
            } => format!(
                "{app} installed via package manager. Run '{launch_hint}' (found in {}).",
                location.display()
            ),
            InstallOutcome::Success {
                location,
                launch_hint,
                ..
            } => format!(
                "{app} installed to {}. Run '{launch_hint}' from there.",
                location.display()
            ),
            InstallOutcome::Skipped { reason } => match reason {
                SkipReason::AlreadyRunning { process } => {
                    format!("{app} is already running ('{process}'); installation skipped.")
                }
                SkipReason::UserDeclined => "Installation cancelled by user.".to_string(),
                SkipReason::DryRun {
                    channel,
                    destination: Some(destination),
                } => format!(
                    "Dry run: would install {app} via {channel} into {}.",
                    destination.display()
                ),
                SkipReason::DryRun {
                    channel,
                    destination: None,
                } => format!("Dry run: would install {app} via {channel}."),
            },
            InstallOutcome::Failed { stage, cause } => {
                format!("Installation of {app} failed during {stage}: {cause}")
            }
        }
    }
}
