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

use crate::locking::CancellationToken;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long a stopped child gets to exit after SIGTERM before SIGKILL.
const TERMINATE_GRACE: Duration = Duration::from_secs(3);

/// A program and its argument vector. Never passed through a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl Invocation {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            env: Vec::new(),
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Wrap in non-interactive `sudo`. `sudo` resets the environment, so
    /// variables are forwarded through `env`.
    pub fn elevated(self) -> Self {
        let mut args = vec!["-n".to_string()];
        if !self.env.is_empty() {
            args.push("env".to_string());
            args.extend(self.env.iter().map(|(k, v)| format!("{k}={v}")));
        }
        args.push(self.program);
        args.extend(self.args);

        Self {
            program: "sudo".to_string(),
            args,
            env: self.env,
        }
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Exit status of a finished child. `code` is `None` when killed by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandStatus {
    pub code: Option<i32>,
}

impl CommandStatus {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<ExitStatus> for CommandStatus {
    fn from(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }
}

#[derive(Debug)]
pub enum RunError {
    Spawn(io::Error),
    TimedOut(Duration),
    Cancelled,
}

/// Runs external programs on behalf of the package-manager installer.
pub trait CommandRunner {
    /// Full path of `program` on the search path, if present.
    fn locate(&self, program: &str) -> Option<PathBuf>;

    /// Run to completion, killing the child on timeout or cancellation.
    fn run(
        &self,
        invocation: &Invocation,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<CommandStatus, RunError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn locate(&self, program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }

    fn run(
        &self,
        invocation: &Invocation,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<CommandStatus, RunError> {
        log::info!("Running: {invocation}");

        // Child stdout goes to our stderr so machine-readable output stays clean.
        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .envs(invocation.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(Stdio::from(io::stderr()));

        // Own process group, so that stopping `sudo` also reaches the package
        // manager it started.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let mut child = command.spawn().map_err(RunError::Spawn)?;

        let start = Instant::now();
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    log::debug!("{} exited with {status}", invocation.program);
                    return Ok(status.into());
                }
                Ok(None) => {
                    let outcome = if cancel.is_cancelled() {
                        Some(RunError::Cancelled)
                    } else if start.elapsed() >= timeout {
                        Some(RunError::TimedOut(timeout))
                    } else {
                        None
                    };

                    if let Some(err) = outcome {
                        log::warn!("Stopping {} ({err:?})", invocation.program);
                        terminate(&mut child, &invocation.program);
                        return Err(err);
                    }

                    thread::sleep(POLL_INTERVAL);
                }
                Err(e) => return Err(RunError::Spawn(e)),
            }
        }
    }
}

/// Stop `child` and everything else in its process group, then reap it.
#[cfg(unix)]
fn terminate(child: &mut Child, program: &str) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let group = Pid::from_raw(child.id() as i32);
    if let Err(e) = killpg(group, Signal::SIGTERM) {
        log::debug!("SIGTERM to process group of {program} failed: {e}");
    }

    let deadline = Instant::now() + TERMINATE_GRACE;
    while Instant::now() < deadline {
        match child.try_wait() {
            Ok(Some(_)) | Err(_) => break,
            Ok(None) => thread::sleep(POLL_INTERVAL),
        }
    }

    // Members that ignored SIGTERM or outlived the leader.
    match killpg(group, Signal::SIGKILL) {
        Ok(()) | Err(nix::errno::Errno::ESRCH) => {}
        Err(e) => log::debug!("SIGKILL to process group of {program} failed: {e}"),
    }
    reap(child, program);
}

#[cfg(not(unix))]
fn terminate(child: &mut Child, program: &str) {
    if let Err(e) = child.kill() {
        log::debug!("Kill failed, child likely exited: {e}");
    }
    reap(child, program);
}

fn reap(child: &mut Child, program: &str) {
    if let Err(e) = child.wait() {
        log::debug!("Failed to reap {program}: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elevated_forwards_environment_through_env() {
        let invocation = Invocation::new("apt-get", ["install", "-y", "mupen64plus"])
            .with_env("DEBIAN_FRONTEND", "noninteractive")
            .elevated();

        assert_eq!(invocation.program, "sudo");
        assert_eq!(
            invocation.args,
            [
                "-n",
                "env",
                "DEBIAN_FRONTEND=noninteractive",
                "apt-get",
                "install",
                "-y",
                "mupen64plus"
            ]
        );
    }

    #[test]
    fn elevated_without_env_skips_env_wrapper() {
        let invocation = Invocation::new("pacman", ["-Sy", "--noconfirm"]).elevated();
        assert_eq!(invocation.to_string(), "sudo -n pacman -Sy --noconfirm");
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let runner = SystemCommandRunner;
        let invocation = Invocation::new("provision-definitely-missing-binary", Vec::<String>::new());
        let result = runner.run(&invocation, Duration::from_secs(5), &CancellationToken::new());
        assert!(matches!(result, Err(RunError::Spawn(_))));
        assert!(runner.locate("provision-definitely-missing-binary").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn exit_codes_are_reported() {
        let runner = SystemCommandRunner;
        let cancel = CancellationToken::new();

        let ok = runner
            .run(&Invocation::new("sh", ["-c", "exit 0"]), Duration::from_secs(10), &cancel)
            .unwrap();
        assert!(ok.success());

        let failed = runner
            .run(&Invocation::new("sh", ["-c", "exit 100"]), Duration::from_secs(10), &cancel)
            .unwrap();
        assert_eq!(failed.code, Some(100));
    }

    #[cfg(unix)]
    #[test]
    fn environment_is_passed_to_child() {
        let runner = SystemCommandRunner;
        let invocation = Invocation::new("sh", ["-c", "test \"$PROVISION_CHILD_FLAG\" = yes"])
            .with_env("PROVISION_CHILD_FLAG", "yes");
        let status = runner
            .run(&invocation, Duration::from_secs(10), &CancellationToken::new())
            .unwrap();
        assert!(status.success());
    }

    #[cfg(unix)]
    #[test]
    fn slow_child_is_killed_on_timeout() {
        let runner = SystemCommandRunner;
        let start = Instant::now();
        let result = runner.run(
            &Invocation::new("sleep", ["30"]),
            Duration::from_millis(300),
            &CancellationToken::new(),
        );
        assert!(matches!(result, Err(RunError::TimedOut(_))));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[test]
    fn cancellation_kills_child() {
        let runner = SystemCommandRunner;
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            trigger.cancel();
        });

        let start = Instant::now();
        let result = runner.run(&Invocation::new("sleep", ["30"]), Duration::from_secs(60), &cancel);
        handle.join().unwrap();

        assert!(matches!(result, Err(RunError::Cancelled)));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    /// Whether `pid` names a live process. Zombies awaiting their reaper count
    /// as gone.
    #[cfg(target_os = "linux")]
    fn alive(pid: u32) -> bool {
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Ok(stat) => stat
                .rsplit_once(')')
                .and_then(|(_, rest)| rest.trim_start().chars().next())
                .is_some_and(|state| state != 'Z' && state != 'X'),
            Err(_) => false,
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn cancellation_stops_grandchildren_of_a_wrapper() {
        let temp = tempfile::tempdir().unwrap();
        let pid_file = temp.path().join("worker.pid");
        let script = format!("sleep 30 & echo $! > '{}'; wait", pid_file.display());

        let runner = SystemCommandRunner;
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(400));
            trigger.cancel();
        });

        let result = runner.run(&Invocation::new("sh", ["-c", script.as_str()]), Duration::from_secs(60), &cancel);
        handle.join().unwrap();
        assert!(matches!(result, Err(RunError::Cancelled)));

        let worker: u32 = std::fs::read_to_string(&pid_file)
            .unwrap()
            .trim()
            .parse()
            .unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while alive(worker) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(50));
        }
        assert!(!alive(worker), "worker {worker} outlived its cancelled parent");
    }
}
