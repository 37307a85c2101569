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

use crate::platform::PlatformId;
use serde::Serialize;
use std::fmt;

/// How the application reaches the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    PackageManager,
    Archive,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::PackageManager => f.write_str("package manager"),
            Channel::Archive => f.write_str("archive"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Success,
    Skipped,
    Failed,
}

/// Orchestrator states. `Done` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallState {
    Start,
    Detecting,
    ProbingProcess {
        platform: PlatformId,
    },
    SelectingChannel {
        platform: PlatformId,
    },
    Installing {
        platform: PlatformId,
        channel: Channel,
    },
    Done(OutcomeKind),
}

impl InstallState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, InstallState::Done(_))
    }

    /// Whether `next` is a legal successor of `self`.
    ///
    /// The only backwards-looking edge is the single package-manager to
    /// archive fallback; nothing leaves `Done`.
    pub fn can_advance_to(&self, next: &InstallState) -> bool {
        use InstallState::*;

        match (self, next) {
            (Start, Detecting) => true,
            (Detecting, ProbingProcess { .. }) => true,
            (ProbingProcess { platform: a }, SelectingChannel { platform: b }) => a == b,
            (ProbingProcess { .. }, Done(OutcomeKind::Skipped | OutcomeKind::Failed)) => true,
            (SelectingChannel { platform: a }, Installing { platform: b, .. }) => a == b,
            (SelectingChannel { .. }, Done(OutcomeKind::Skipped | OutcomeKind::Failed)) => true,
            (
                Installing {
                    platform: a,
                    channel: Channel::PackageManager,
                },
                Installing {
                    platform: b,
                    channel: Channel::Archive,
                },
            ) => a == b,
            (Installing { .. }, Done(OutcomeKind::Success | OutcomeKind::Failed)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallState::Start => f.write_str("start"),
            InstallState::Detecting => f.write_str("detecting platform"),
            InstallState::ProbingProcess { platform } => {
                write!(f, "probing running processes on {platform}")
            }
            InstallState::SelectingChannel { platform } => {
                write!(f, "selecting install channel for {platform}")
            }
            InstallState::Installing { channel, .. } => write!(f, "installing via {channel}"),
            InstallState::Done(kind) => write!(f, "done ({kind:?})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEBIAN: PlatformId = PlatformId::DebianLike;

    #[test]
    fn happy_path_is_legal() {
        let path = [
            InstallState::Start,
            InstallState::Detecting,
            InstallState::ProbingProcess { platform: DEBIAN },
            InstallState::SelectingChannel { platform: DEBIAN },
            InstallState::Installing {
                platform: DEBIAN,
                channel: Channel::PackageManager,
            },
            InstallState::Installing {
                platform: DEBIAN,
                channel: Channel::Archive,
            },
            InstallState::Done(OutcomeKind::Success),
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_advance_to(&pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn fallback_happens_only_from_package_manager_to_archive() {
        let archive = InstallState::Installing {
            platform: DEBIAN,
            channel: Channel::Archive,
        };
        let pm = InstallState::Installing {
            platform: DEBIAN,
            channel: Channel::PackageManager,
        };
        assert!(!archive.can_advance_to(&pm));
        assert!(!archive.can_advance_to(&archive));
        assert!(!pm.can_advance_to(&pm));
    }

    #[test]
    fn done_is_terminal() {
        let done = InstallState::Done(OutcomeKind::Failed);
        assert!(done.is_terminal());
        assert!(!done.can_advance_to(&InstallState::Start));
        assert!(!done.can_advance_to(&InstallState::Detecting));
    }

    #[test]
    fn detecting_cannot_skip_the_probe() {
        assert!(
            !InstallState::Detecting.can_advance_to(&InstallState::SelectingChannel {
                platform: DEBIAN
            })
        );
        assert!(!InstallState::Detecting.can_advance_to(&InstallState::Done(OutcomeKind::Failed)));
    }

    #[test]
    fn selecting_cannot_succeed_without_installing() {
        let selecting = InstallState::SelectingChannel { platform: DEBIAN };
        assert!(!selecting.can_advance_to(&InstallState::Done(OutcomeKind::Success)));
    }
}
