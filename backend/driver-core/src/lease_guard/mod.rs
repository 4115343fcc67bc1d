//! Cross-process mutual exclusion over a named marker file.
//!
//! The port scan-and-forward sequence must never interleave between two
//! sessions, even when those sessions live in different host processes. An
//! in-process mutex cannot give that guarantee, so the guard is a marker file
//! created with `create_new` (atomic on every supported platform).
//!
//! # Recovery
//!
//! A holder that crashes leaves its marker behind. Instead of deadlocking, a
//! waiter reclaims the marker when either:
//! - its modification time is older than `stale_after`, or
//! - the PID recorded in it no longer exists on this host.
//!
//! Reclaiming renames the marker to a unique tombstone before deleting it and
//! checks that the renamed file is the one judged stale, so a fresh marker
//! written by a faster waiter is never removed.
//!
//! One guard is built at process start and shared by reference between all
//! session orchestrators.

use crate::config::LeaseGuardConfig;
use crate::error::lease_guard::LeaseGuardError;

use common::ErrorLocation;

use std::fs::{self, OpenOptions};
use std::future::Future;
use std::io::{ErrorKind, Write};
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use backoff::{ExponentialBackoff, backoff::Backoff};
use humantime::format_rfc3339;
use log::{debug, trace, warn};
use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio::time::sleep as TokioSleep;
use uuid::Uuid;

const MARKER_EXTENSION: &str = "lock";
const PID_KEY: &str = "pid=";
const TOKEN_KEY: &str = "token=";
const ACQUIRED_KEY: &str = "acquired=";
const TOMBSTONE_SUFFIX: &str = "stale";
const INITIAL_RETRY_INTERVAL: Duration = Duration::from_millis(25);
const MAX_RETRY_INTERVAL: Duration = Duration::from_millis(500);

/// Named, file-backed lock with a bounded wait and stale-holder recovery.
#[derive(Debug)]
pub struct LeaseGuard {
    name: String,
    marker_path: PathBuf,
    timeout: Duration,
    stale_after: Duration,
}

impl LeaseGuard {
    pub fn new(
        dir: impl Into<PathBuf>,
        name: impl Into<String>,
        timeout: Duration,
        stale_after: Duration,
    ) -> Self {
        let name = name.into();
        let marker_path = dir.into().join(format!("{name}.{MARKER_EXTENSION}"));
        Self {
            name,
            marker_path,
            timeout,
            stale_after,
        }
    }

    pub fn from_config(config: &LeaseGuardConfig) -> Self {
        Self::new(
            config.lock_dir(),
            config.name.clone(),
            config.timeout(),
            config.stale_after(),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn marker_path(&self) -> &Path {
        &self.marker_path
    }

    /// Block (asynchronously) until the guard is held or the timeout expires.
    pub async fn acquire(&self) -> Result<LeaseGuardHandle, LeaseGuardError> {
        self.ensure_dir()?;

        let started = Instant::now();
        let mut backoff = ExponentialBackoff {
            initial_interval: INITIAL_RETRY_INTERVAL,
            max_interval: MAX_RETRY_INTERVAL,
            max_elapsed_time: Some(self.timeout),
            ..Default::default()
        };

        loop {
            match self.try_create() {
                Ok(handle) => {
                    debug!(
                        "Acquired lease guard '{}' after {:?}",
                        self.name,
                        started.elapsed()
                    );
                    return Ok(handle);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if self.reclaim_if_stale()? {
                        continue;
                    }
                }
                Err(e) => {
                    return Err(LeaseGuardError::Io {
                        message: "Failed to create guard marker".to_string(),
                        path: self.marker_path.clone(),
                        location: ErrorLocation::from(Location::caller()),
                        source: e,
                    });
                }
            }

            match backoff.next_backoff() {
                Some(duration) => {
                    trace!("Lease guard '{}' busy, retrying after {duration:?}", self.name);
                    TokioSleep(duration).await;
                }
                None => {
                    warn!(
                        "Gave up waiting for lease guard '{}' after {:?}",
                        self.name,
                        started.elapsed()
                    );
                    return Err(LeaseGuardError::Timeout {
                        name: self.name.clone(),
                        waited: started.elapsed(),
                        location: ErrorLocation::from(Location::caller()),
                    });
                }
            }
        }
    }

    /// Run `f` while holding the guard. The guard is released afterwards even
    /// if the future is dropped mid-way.
    pub async fn with_lock<F, Fut, T>(&self, f: F) -> Result<T, LeaseGuardError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let handle = self.acquire().await?;
        let result = f().await;
        handle.release();
        Ok(result)
    }

    fn ensure_dir(&self) -> Result<(), LeaseGuardError> {
        let Some(dir) = self.marker_path.parent() else {
            return Ok(());
        };

        fs::create_dir_all(dir).map_err(|e| LeaseGuardError::Io {
            message: "Failed to create guard directory".to_string(),
            path: dir.to_path_buf(),
            location: ErrorLocation::from(Location::caller()),
            source: e,
        })
    }

    fn try_create(&self) -> std::io::Result<LeaseGuardHandle> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.marker_path)?;

        let token = Uuid::new_v4().to_string();
        let contents = format!(
            "{PID_KEY}{}\n{TOKEN_KEY}{token}\n{ACQUIRED_KEY}{}\n",
            std::process::id(),
            format_rfc3339(SystemTime::now())
        );

        if let Err(e) = file.write_all(contents.as_bytes()) {
            let _ = fs::remove_file(&self.marker_path);
            return Err(e);
        }

        Ok(LeaseGuardHandle {
            marker_path: self.marker_path.clone(),
            token,
            released: false,
        })
    }

    /// Clears an abandoned marker. Returns true when the caller should retry
    /// immediately.
    fn reclaim_if_stale(&self) -> Result<bool, LeaseGuardError> {
        match self.inspect()? {
            MarkerState::Gone => Ok(true),
            MarkerState::Held => Ok(false),
            MarkerState::Stale(stale) => self.reclaim(&stale),
        }
    }

    pub(crate) fn inspect(&self) -> Result<MarkerState, LeaseGuardError> {
        let metadata = match fs::metadata(&self.marker_path) {
            Ok(metadata) => metadata,
            // Released between our create attempt and now.
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(MarkerState::Gone),
            Err(e) => {
                return Err(LeaseGuardError::Io {
                    message: "Failed to inspect guard marker".to_string(),
                    path: self.marker_path.clone(),
                    location: ErrorLocation::from(Location::caller()),
                    source: e,
                });
            }
        };

        let age = metadata
            .modified()
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .unwrap_or_default();

        let contents = match fs::read_to_string(&self.marker_path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(MarkerState::Gone),
            Err(_) => String::new(),
        };

        let reason = if age > self.stale_after {
            format!("marker is {age:?} old")
        } else if let Some(pid) = parse_holder_pid(&contents)
            && !is_process_alive(pid)
        {
            format!("holder PID {pid} is gone")
        } else {
            return Ok(MarkerState::Held);
        };

        Ok(MarkerState::Stale(StaleMarker { contents, reason }))
    }

    /// Move the stale marker aside and delete it. If what was moved is not the
    /// marker that was judged stale, another waiter reclaimed first and the
    /// moved file is their live marker, so it is put back.
    pub(crate) fn reclaim(&self, stale: &StaleMarker) -> Result<bool, LeaseGuardError> {
        warn!("Reclaiming lease guard '{}': {}", self.name, stale.reason);

        let tombstone = self
            .marker_path
            .with_extension(format!("{MARKER_EXTENSION}.{}.{TOMBSTONE_SUFFIX}", Uuid::new_v4()));

        match fs::rename(&self.marker_path, &tombstone) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(true),
            Err(e) => {
                return Err(LeaseGuardError::Io {
                    message: "Failed to move stale guard marker aside".to_string(),
                    path: self.marker_path.clone(),
                    location: ErrorLocation::from(Location::caller()),
                    source: e,
                });
            }
        }

        let moved = fs::read_to_string(&tombstone).unwrap_or_default();
        let reclaimed = moved == stale.contents;

        if !reclaimed {
            debug!(
                "Lease guard '{}' was reclaimed by another waiter, restoring its marker",
                self.name
            );
            self.restore(&tombstone);
        }

        if let Err(e) = fs::remove_file(&tombstone)
            && e.kind() != ErrorKind::NotFound
        {
            warn!("Failed to remove {}: {e}", tombstone.display());
        }

        Ok(reclaimed)
    }

    fn restore(&self, tombstone: &Path) {
        let restored = match fs::hard_link(tombstone, &self.marker_path) {
            Err(e) if e.kind() != ErrorKind::AlreadyExists => {
                fs::rename(tombstone, &self.marker_path)
            }
            other => other,
        };

        if let Err(e) = restored {
            warn!(
                "Could not restore guard marker {}: {e}",
                self.marker_path.display()
            );
        }
    }
}

/// What a waiter found at the marker path.
#[derive(Debug)]
pub(crate) enum MarkerState {
    Gone,
    Held,
    Stale(StaleMarker),
}

/// A marker judged abandoned, with the contents it had at that moment.
#[derive(Debug)]
pub(crate) struct StaleMarker {
    contents: String,
    reason: String,
}

/// Proof of holding a [`LeaseGuard`]. Dropping it releases the guard.
#[derive(Debug)]
pub struct LeaseGuardHandle {
    marker_path: PathBuf,
    token: String,
    released: bool,
}

impl LeaseGuardHandle {
    pub fn release(mut self) {
        self.remove_marker();
    }

    fn remove_marker(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        // A marker reclaimed by another waiter now belongs to them.
        let still_ours = fs::read_to_string(&self.marker_path)
            .map(|contents| parse_token(&contents) == Some(self.token.as_str()))
            .unwrap_or(false);

        if !still_ours {
            warn!(
                "Guard marker {} was reclaimed by another holder",
                self.marker_path.display()
            );
            return;
        }

        if let Err(e) = fs::remove_file(&self.marker_path) {
            warn!(
                "Failed to remove guard marker {}: {e}",
                self.marker_path.display()
            );
        } else {
            trace!("Released guard marker {}", self.marker_path.display());
        }
    }
}

impl Drop for LeaseGuardHandle {
    fn drop(&mut self) {
        self.remove_marker();
    }
}

pub(crate) fn parse_holder_pid(contents: &str) -> Option<u32> {
    contents
        .lines()
        .find_map(|line| line.strip_prefix(PID_KEY))
        .and_then(|pid| pid.trim().parse().ok())
}

fn parse_token(contents: &str) -> Option<&str> {
    contents
        .lines()
        .find_map(|line| line.strip_prefix(TOKEN_KEY))
        .map(str::trim)
}

pub(crate) fn is_process_alive(pid: u32) -> bool {
    let pid = Pid::from_u32(pid);
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    sys.process(pid).is_some()
}
