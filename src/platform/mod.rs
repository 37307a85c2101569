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

//! Platform detection and host inspection.
//!
//! Detection runs once per install run and yields a [`PlatformId`] that every
//! downstream component dispatches on.

pub mod file_ops;
pub mod process;

mod detection;

pub use detection::{HostInfo, PlatformId, SystemHost, detect, detect_with};
pub use process::{ProcessEntry, ProcessTable, SystemProcessTable, is_running};

/// Whether the current user already has administrative rights.
#[cfg(unix)]
pub fn is_elevated() -> bool {
    nix::unistd::Uid::effective().is_root()
}

#[cfg(not(unix))]
pub fn is_elevated() -> bool {
    false
}
