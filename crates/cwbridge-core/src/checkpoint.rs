//! Persisted end-of-window checkpoint
//!
//! The checkpoint file holds the end of the last successfully emitted window:
//!
//! ```json
//! {"lastRunEnd": 1700000000}
//! ```
//!
//! Loading fails soft: a missing or unreadable file yields a checkpoint
//! `delay_minutes` before now. Saving writes a temporary file next to the
//! target and renames it into place, so a crash leaves either the old or the
//! new value. A lock file next to the checkpoint keeps overlapping runs
//! apart.

use crate::error::CheckpointError;
use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// End of the last fully emitted window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(
        rename = "lastRunEnd",
        alias = "last_run_timestamp",
        with = "chrono::serde::ts_seconds"
    )]
    pub last_run_end: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(last_run_end: DateTime<Utc>) -> Self {
        Self { last_run_end }
    }

    /// Checkpoint used when none has been persisted yet.
    ///
    /// A delay reaching back before the representable range starts at the
    /// epoch; the lookback cap still bounds the window.
    pub fn synthesize(now: DateTime<Utc>, delay_minutes: i64) -> Self {
        let start = TimeDelta::try_minutes(delay_minutes)
            .and_then(|delay| now.trunc_subsecs(0).checked_sub_signed(delay))
            .unwrap_or(DateTime::UNIX_EPOCH);
        Self::new(start)
    }
}

/// File-backed checkpoint for one run context
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
    delay_minutes: i64,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>, delay_minutes: i64) -> Self {
        Self {
            path: path.into(),
            delay_minutes,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored checkpoint; `Ok(None)` if the file does not exist.
    pub fn try_load(&self) -> Result<Option<Checkpoint>, CheckpointError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(CheckpointError::Read {
                    path: self.display_path(),
                    source,
                });
            }
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| CheckpointError::Corrupt {
                path: self.display_path(),
                source,
            })
    }

    /// Load the checkpoint, synthesizing one from `now` if it is missing or
    /// unreadable.
    pub fn load(&self, now: DateTime<Utc>) -> Checkpoint {
        match self.try_load() {
            Ok(Some(checkpoint)) => {
                debug!(
                    path = %self.path.display(),
                    last_run_end = %checkpoint.last_run_end,
                    "Loaded checkpoint"
                );
                checkpoint
            }
            Ok(None) => {
                let checkpoint = Checkpoint::synthesize(now, self.delay_minutes);
                info!(
                    path = %self.path.display(),
                    delay_minutes = self.delay_minutes,
                    "No checkpoint found, starting from delay offset"
                );
                checkpoint
            }
            Err(e) => {
                let checkpoint = Checkpoint::synthesize(now, self.delay_minutes);
                warn!(
                    error = %e,
                    delay_minutes = self.delay_minutes,
                    "Ignoring unusable checkpoint, starting from delay offset"
                );
                checkpoint
            }
        }
    }

    /// Atomically replace the stored checkpoint.
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        self.write_atomic(checkpoint)
            .map_err(|source| CheckpointError::Write {
                path: self.display_path(),
                source,
            })?;

        debug!(
            path = %self.path.display(),
            last_run_end = %checkpoint.last_run_end,
            "Saved checkpoint"
        );
        Ok(())
    }

    fn write_atomic(&self, checkpoint: &Checkpoint) -> io::Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer(&mut tmp, checkpoint).map_err(io::Error::other)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    /// Take the exclusive run lock for this checkpoint without blocking.
    ///
    /// The lock is held until the returned guard is dropped.
    pub fn lock(&self) -> Result<CheckpointLock, CheckpointError> {
        let mut lock_path = self.path.clone().into_os_string();
        lock_path.push(".lock");
        let lock_path = PathBuf::from(lock_path);

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|source| CheckpointError::Lock {
                path: self.display_path(),
                source,
            })?;

        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => Ok(CheckpointLock {
                _file: file,
                path: lock_path,
            }),
            Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => {
                Err(CheckpointError::Locked {
                    path: self.display_path(),
                })
            }
            Err(source) => Err(CheckpointError::Lock {
                path: self.display_path(),
                source,
            }),
        }
    }

    fn display_path(&self) -> String {
        self.path.display().to_string()
    }
}

/// Exclusive run lock; released on drop
#[derive(Debug)]
pub struct CheckpointLock {
    _file: File,
    path: PathBuf,
}

impl CheckpointLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}
