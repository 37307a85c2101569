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

use crate::error::{ProvisionError, Result};
use crate::locking::CancellationToken;
use log::{debug, warn};
use sha2::{Digest, Sha256};
use std::fs::{self, File, OpenOptions, TryLockError};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

const RETRY_DELAY: Duration = Duration::from_millis(50);

/// Exclusive advisory lock guarding one installation destination.
///
/// Lock files live under `<home>/locks` rather than next to the destination so
/// that unprivileged runs can lock system directories they will only write
/// through an elevated package manager.
#[derive(Debug)]
pub struct DestinationLock {
    destination: PathBuf,
    lock_path: PathBuf,
    file: Option<File>,
    acquired_at: Instant,
}

impl DestinationLock {
    /// Acquire the lock for `destination`, retrying until `wait` elapses or
    /// `cancel` trips.
    pub fn acquire(
        locks_dir: &Path,
        destination: &Path,
        wait: Duration,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        fs::create_dir_all(locks_dir)?;
        let lock_path = lock_path_for(locks_dir, destination);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;

        let started = Instant::now();
        loop {
            match file.try_lock() {
                Ok(()) => {
                    debug!(
                        "Acquired destination lock for {} after {:.3}s",
                        destination.display(),
                        started.elapsed().as_secs_f64()
                    );
                    return Ok(Self {
                        destination: destination.to_path_buf(),
                        lock_path,
                        file: Some(file),
                        acquired_at: Instant::now(),
                    });
                }
                Err(TryLockError::WouldBlock) => {
                    if cancel.is_cancelled() {
                        return Err(ProvisionError::Cancelled);
                    }
                    if started.elapsed() >= wait {
                        return Err(ProvisionError::Locked {
                            path: destination.display().to_string(),
                            waited_secs: started.elapsed().as_secs_f64(),
                        });
                    }
                    thread::sleep(RETRY_DELAY);
                }
                Err(TryLockError::Error(err)) => return Err(err.into()),
            }
        }
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    pub fn release(mut self) -> Result<()> {
        self.release_inner().map_err(ProvisionError::from)
    }

    fn release_inner(&mut self) -> std::io::Result<()> {
        if let Some(file) = self.file.take() {
            file.unlock()?;
            debug!(
                "Released destination lock for {} after {:.3}s",
                self.destination.display(),
                self.acquired_at.elapsed().as_secs_f64()
            );
        }
        Ok(())
    }
}

impl Drop for DestinationLock {
    fn drop(&mut self) {
        if let Err(err) = self.release_inner() {
            warn!(
                "Failed to unlock {} during drop: {err}",
                self.lock_path.display()
            );
        }
    }
}

/// Stable lock file name for a destination directory.
///
/// The readable slug is lossy, so a digest of the full path keeps
/// destinations such as `my-app` and `my_app` apart.
fn lock_path_for(locks_dir: &Path, destination: &Path) -> PathBuf {
    let full = destination.to_string_lossy();
    let slug: String = full
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let slug = slug.trim_matches('_');
    let slug = if slug.is_empty() { "root" } else { slug };

    let digest = Sha256::digest(full.as_bytes());
    let suffix: String = digest[..6].iter().map(|b| format!("{b:02x}")).collect();
    locks_dir.join(format!("{slug}-{suffix}.lock"))
}
