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
use crate::platform::{self, PlatformId, SystemProcessTable};
use serde::Serialize;

#[derive(Serialize)]
struct StatusOutput<'a> {
    target: &'a str,
    process_name: &'a str,
    platform: PlatformId,
    running: bool,
}

pub struct StatusCommand<'a> {
    config: &'a ProvisionConfig,
}

impl<'a> StatusCommand<'a> {
    pub fn new(config: &'a ProvisionConfig) -> Result<Self> {
        Ok(Self { config })
    }

    /// Report whether the target application is currently running.
    pub fn execute(&self, json: bool) -> Result<bool> {
        let target = &self.config.target;
        let platform = platform::detect();
        let running = platform::is_running(&target.process_name, platform, &SystemProcessTable);

        if json {
            let output = StatusOutput {
                target: &target.name,
                process_name: &target.process_name,
                platform,
                running,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else if running {
            println!("{} is running on {platform}", target.name);
        } else {
            println!("{} is not running on {platform}", target.name);
        }

        Ok(running)
    }
}
