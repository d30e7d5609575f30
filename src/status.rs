//! Scan lifecycle state, persisted as one JSON object per transition.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

use crate::config::Config;
use crate::error::{Error, Result};

/// End time before a scan ever ran.
pub const NOT_STARTED: i64 = -1;
/// End time of a scan whose process vanished without recording an outcome.
pub const INDETERMINATE: i64 = -2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanState {
    Unknown,
    Running,
    Finished,
    Terminated,
    Error,
}

impl ScanState {
    pub fn as_str(self) -> &'static str {
        match self {
            ScanState::Unknown => "Unknown",
            ScanState::Running => "Running",
            ScanState::Finished => "Finished",
            ScanState::Terminated => "Terminated",
            ScanState::Error => "Error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStatus {
    pub host: String,
    pub state: ScanState,
    pub start_time: i64,
    pub end_time: i64,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub error: Vec<String>,
}

impl ScanStatus {
    pub fn new(host: &str, args: Vec<String>) -> Self {
        Self {
            host: host.to_string(),
            state: ScanState::Unknown,
            start_time: NOT_STARTED,
            end_time: NOT_STARTED,
            args,
            error: Vec::new(),
        }
    }

    /// Moves to `state`, stamping the time the transition implies.
    pub fn enter(&mut self, state: ScanState, now: i64) {
        match state {
            ScanState::Running => self.start_time = now,
            ScanState::Finished | ScanState::Terminated => self.end_time = now,
            ScanState::Unknown => self.end_time = INDETERMINATE,
            ScanState::Error => {}
        }
        self.state = state;
    }
}

pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// Reads and writes `jdowser.status`, merging `jdowser.err` on read.
#[derive(Debug, Clone)]
pub struct StatusStore {
    status_path: PathBuf,
    error_path: PathBuf,
}

impl StatusStore {
    pub fn new(status_path: impl Into<PathBuf>, error_path: impl Into<PathBuf>) -> Self {
        Self {
            status_path: status_path.into(),
            error_path: error_path.into(),
        }
    }

    pub fn for_config(config: &Config) -> Self {
        Self::new(config.status_path(), config.error_path())
    }

    /// A fresh status for this invocation; only `start` records its args.
    pub fn fresh(config: &Config) -> ScanStatus {
        ScanStatus::new(&config.host, config.args.clone())
    }

    /// The persisted status, or `None` when nothing readable was persisted.
    pub fn read(&self) -> Option<ScanStatus> {
        let data = match fs::read(&self.status_path) {
            Ok(data) => data,
            Err(err) => {
                if err.kind() != ErrorKind::NotFound {
                    debug!(path = %self.status_path.display(), %err, "cannot read status");
                }
                return None;
            }
        };
        let mut status: ScanStatus = match serde_json::from_slice(&data) {
            Ok(status) => status,
            Err(err) => {
                debug!(path = %self.status_path.display(), %err, "cannot parse status");
                return None;
            }
        };
        if let Ok(text) = fs::read_to_string(&self.error_path) {
            merge_error_lines(&mut status.error, &text);
        }
        Some(status)
    }

    /// Writes the whole status, replacing what was there.
    pub fn persist(&self, status: &ScanStatus) -> Result<()> {
        let mut line = serde_json::to_vec(status)?;
        line.push(b'\n');
        write_file(&self.status_path, &line)
    }

    /// [`ScanStatus::enter`] followed by [`StatusStore::persist`].
    pub fn transition(&self, status: &mut ScanStatus, state: ScanState) -> Result<()> {
        status.enter(state, unix_now());
        debug!(state = state.as_str(), "status transition");
        self.persist(status)
    }
}

/// Writes beside `path` and renames over it, so readers see either the old
/// or the new content, never a partial write.
fn write_file(path: &Path, data: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(format!(".tmp{}", std::process::id()));
    let tmp = PathBuf::from(tmp);
    let mut file = fs::File::create(&tmp).map_err(|e| Error::io(&tmp, e))?;
    file.write_all(data).map_err(|e| Error::io(&tmp, e))?;
    drop(file);
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        Error::io(path, e)
    })
}

/// Appends trimmed, non-empty lines of `text` not already present.
fn merge_error_lines(errors: &mut Vec<String>, text: &str) {
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if !errors.iter().any(|e| e == line) {
            errors.push(line.to_string());
        }
    }
}
