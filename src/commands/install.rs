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
use crate::download::{HttpFileDownloader, IndicatifProgressReporter};
use crate::error::{PkgError, Result, format_error_with_color};
use crate::installation::{
    Channel, InstallObserver, InstallOutcome, InstallRequest, InstallState, Orchestrator,
    SkipReason,
};
use crate::locking::CancellationToken;
use crate::models::InstallTarget;
use crate::platform::PlatformId;
use colored::Colorize;
use log::{debug, info, warn};
use std::env;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Flags accepted by `provision install`.
#[derive(Debug, Clone, Default)]
pub struct InstallArgs {
    pub dest: Option<PathBuf>,
    /// Install even if the application is running.
    pub force: bool,
    /// Skip the confirmation prompt.
    pub yes: bool,
    pub dry_run: bool,
    pub no_progress: bool,
    /// Overall deadline for the run.
    pub timeout_secs: Option<u64>,
    pub json: bool,
}

pub struct InstallCommand<'a> {
    config: &'a ProvisionConfig,
}

impl<'a> InstallCommand<'a> {
    pub fn new(config: &'a ProvisionConfig) -> Result<Self> {
        Ok(Self { config })
    }

    pub fn execute(&self, args: &InstallArgs, cancel: CancellationToken) -> Result<InstallOutcome> {
        let target = &self.config.target;
        info!("Installing {} {}", target.name, target.version);
        debug!("Install options: {args:?}");

        let cancel = match args.timeout_secs {
            Some(secs) => cancel.with_timeout(Duration::from_secs(secs)),
            None => cancel,
        };

        let request = InstallRequest {
            dest_override: args.dest.clone(),
            proceed_if_running: args.force,
            dry_run: args.dry_run,
        };

        let mut downloader = HttpFileDownloader::new();
        if show_progress(args) {
            downloader = downloader.with_progress_reporter(Box::new(
                IndicatifProgressReporter::new(format!("{} {}", target.name, target.version)),
            ));
        }

        let mut observer = ConsoleObserver {
            app: target.name.clone(),
            assume_yes: args.yes || !self.config.install.confirm,
            interactive: io::stdin().is_terminal(),
            quiet: args.json,
        };

        let outcome = Orchestrator::new(self.config, cancel)
            .with_downloader(downloader)
            .run(&request, &mut observer);

        if args.json {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        } else {
            report(&outcome, &target.name);
        }

        Ok(outcome)
    }
}

fn show_progress(args: &InstallArgs) -> bool {
    !args.no_progress
        && !args.json
        && io::stderr().is_terminal()
        && env::var_os("CI").is_none()
}

fn report(outcome: &InstallOutcome, app: &str) {
    let summary = outcome.summary(app);
    match outcome {
        InstallOutcome::Success { .. } => println!("{} {summary}", "✓".green().bold()),
        InstallOutcome::Skipped {
            reason: SkipReason::DryRun { .. },
        } => println!("{summary}"),
        InstallOutcome::Skipped { .. } => println!("{} {summary}", "-".yellow().bold()),
        InstallOutcome::Failed { stage, cause } => {
            eprintln!("{} during {stage}", "Installation failed".red().bold());
            eprint!(
                "{}",
                format_error_with_color(cause, io::stderr().is_terminal())
            );
        }
    }
}

/// Terminal front end for the orchestrator's decisions.
struct ConsoleObserver {
    app: String,
    assume_yes: bool,
    interactive: bool,
    quiet: bool,
}

impl ConsoleObserver {
    fn say(&self, message: impl AsRef<str>) {
        if !self.quiet {
            println!("{}", message.as_ref());
        }
    }
}

impl InstallObserver for ConsoleObserver {
    fn on_transition(&mut self, _from: &InstallState, to: &InstallState) {
        match to {
            InstallState::ProbingProcess { platform } => {
                self.say(format!("Detected {platform}"));
            }
            InstallState::Installing {
                channel: Channel::PackageManager,
                ..
            } => self.say(format!("Installing {} with the system package manager...", self.app)),
            InstallState::Installing {
                channel: Channel::Archive,
                ..
            } => self.say(format!("Installing {} from the release archive...", self.app)),
            _ => {}
        }
    }

    fn on_already_running(&mut self, process: &str, _platform: PlatformId) -> bool {
        eprintln!(
            "{} {} appears to be running ('{process}').",
            "Warning:".yellow().bold(),
            self.app
        );
        if !self.interactive {
            return false;
        }
        ask(&format!("Install {} anyway?", self.app), false)
    }

    fn confirm_install(
        &mut self,
        target: &InstallTarget,
        platform: PlatformId,
        channel: Channel,
        destination: Option<&Path>,
    ) -> bool {
        if self.assume_yes || !self.interactive {
            return true;
        }

        let place = match destination {
            Some(dir) => format!(" into {}", dir.display()),
            None => String::new(),
        };
        ask(
            &format!(
                "Install {} {} on {platform} via {channel}{place}?",
                target.name, target.version
            ),
            true,
        )
    }

    fn on_fallback(&mut self, error: &PkgError) {
        eprintln!(
            "{} package manager install failed: {error}",
            "Warning:".yellow().bold()
        );
        self.say("Falling back to the release archive.");
    }
}

/// Yes/no question on stdin. An empty answer picks `default`.
fn ask(question: &str, default: bool) -> bool {
    // stdout carries the outcome, possibly as JSON.
    ask_with(question, default, &mut io::stdin().lock(), &mut io::stderr())
}

fn ask_with(
    question: &str,
    default: bool,
    input: &mut impl BufRead,
    prompt: &mut impl Write,
) -> bool {
    let choices = if default { "[Y/n]" } else { "[y/N]" };
    if let Err(e) = write!(prompt, "{question} {choices} ").and_then(|()| prompt.flush()) {
        warn!("Failed to write prompt: {e}");
    }

    let mut answer = String::new();
    match input.read_line(&mut answer) {
        Ok(_) => parse_answer(&answer, default),
        Err(e) => {
            warn!("Failed to read answer, treating it as no: {e}");
            false
        }
    }
}

fn parse_answer(input: &str, default: bool) -> bool {
    match input.trim().to_lowercase().as_str() {
        "" => default,
        "y" | "yes" => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_answer_uses_default() {
        assert!(parse_answer("\n", true));
        assert!(!parse_answer("  \n", false));
    }

    #[test]
    fn answers_are_case_insensitive() {
        assert!(parse_answer("YES\n", false));
        assert!(parse_answer("y", false));
        assert!(!parse_answer("no", true));
        assert!(!parse_answer("maybe", true));
    }

    #[test]
    fn prompt_goes_to_the_prompt_stream() {
        let mut input = io::Cursor::new(b"y\n".to_vec());
        let mut prompt = Vec::new();

        assert!(ask_with("Install Mupen64Plus?", false, &mut input, &mut prompt));
        assert_eq!(String::from_utf8(prompt).unwrap(), "Install Mupen64Plus? [y/N] ");
    }

    #[test]
    fn closed_input_falls_back_to_default() {
        let mut input = io::empty();
        let mut prompt = Vec::new();
        assert!(ask_with("Proceed?", true, &mut input, &mut prompt));
        assert!(!ask_with("Proceed?", false, &mut input, &mut prompt));
    }

    #[test]
    fn json_output_disables_progress() {
        let args = InstallArgs {
            json: true,
            ..Default::default()
        };
        assert!(!show_progress(&args));

        let args = InstallArgs {
            no_progress: true,
            ..Default::default()
        };
        assert!(!show_progress(&args));
    }

    #[test]
    fn non_interactive_observer_never_proceeds_over_running_instance() {
        let mut observer = ConsoleObserver {
            app: "Mupen64Plus".to_string(),
            assume_yes: false,
            interactive: false,
            quiet: true,
        };
        assert!(!observer.on_already_running("mupen64plus", PlatformId::MacOS));
        assert!(observer.confirm_install(
            &InstallTarget::default(),
            PlatformId::MacOS,
            Channel::Archive,
            None
        ));
    }
}
