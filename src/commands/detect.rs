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

use crate::config::ProvisionConfig;
use crate::error::Result;
use crate::installation::{Channel, select_channel};
use crate::package_manager::PackageManager;
use crate::platform::{self, PlatformId};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct DetectOutput {
    platform: PlatformId,
    description: &'static str,
    channel: Option<Channel>,
    package_manager: Option<PackageManager>,
}

impl DetectOutput {
    fn for_platform(platform: PlatformId, package_manager_enabled: bool) -> Self {
        let channel = select_channel(platform, package_manager_enabled);
        let package_manager = match channel {
            Some(Channel::PackageManager) => PackageManager::for_platform(platform),
            _ => None,
        };
        Self {
            platform,
            description: platform.description(),
            channel,
            package_manager,
        }
    }
}

pub struct DetectCommand<'a> {
    config: &'a ProvisionConfig,
}

impl<'a> DetectCommand<'a> {
    pub fn new(config: &'a ProvisionConfig) -> Result<Self> {
        Ok(Self { config })
    }

    pub fn execute(&self, json: bool) -> Result<()> {
        let output =
            DetectOutput::for_platform(platform::detect(), self.config.package_manager.enabled);

        if json {
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Ok(());
        }

        println!("Platform: {}", output.description);
        match (output.channel, output.package_manager) {
            (Some(Channel::PackageManager), Some(manager)) => {
                println!("Install channel: package manager ({manager}), archive fallback");
            }
            (Some(channel), _) => println!("Install channel: {channel}"),
            (None, _) => println!("Install channel: none (unsupported platform)"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_reports_package_manager_only_when_selected() {
        let debian = DetectOutput::for_platform(PlatformId::DebianLike, true);
        assert_eq!(debian.channel, Some(Channel::PackageManager));
        assert_eq!(debian.package_manager, Some(PackageManager::Apt));

        let disabled = DetectOutput::for_platform(PlatformId::ArchLike, false);
        assert_eq!(disabled.channel, Some(Channel::Archive));
        assert_eq!(disabled.package_manager, None);

        let unknown = DetectOutput::for_platform(PlatformId::UnknownLinux, true);
        assert_eq!(unknown.channel, None);
    }

    #[test]
    fn json_uses_snake_case_identifiers() {
        let output = DetectOutput::for_platform(PlatformId::ChromeOSLike, true);
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["platform"], "chromeos_like");
        assert_eq!(json["channel"], "package_manager");
        assert_eq!(json["package_manager"], "apt");
    }
}
