//! Live-process lookups through `/proc`: which JVM libraries are mapped
//! right now, and which processes are jdowser scans.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Identity of a file independent of the path used to reach it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct FileId {
    dev: u64,
    ino: u64,
}

impl FileId {
    fn of(path: &Path) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        let meta = std::fs::metadata(path).ok()?;
        Some(Self {
            dev: meta.dev(),
            ino: meta.ino(),
        })
    }
}

/// Per-file counts of processes that have a JVM library mapped.
#[derive(Debug, Clone, Default)]
pub struct RunningJvms {
    counts: HashMap<FileId, u32>,
}

impl RunningJvms {
    /// Builds from counts keyed by mapped path. Paths that no longer exist
    /// are dropped; hard links and symlinks to one file merge.
    pub fn from_counts(by_path: &HashMap<PathBuf, u32>) -> Self {
        let mut counts = HashMap::new();
        for (path, n) in by_path {
            if let Some(id) = FileId::of(path) {
                *counts.entry(id).or_default() += n;
            }
        }
        Self { counts }
    }

    /// Scans the memory maps of every readable process for `library_name`.
    #[cfg(target_os = "linux")]
    pub fn collect(library_name: &str) -> Self {
        Self::from_counts(&mapped_library_counts(library_name))
    }

    #[cfg(not(target_os = "linux"))]
    pub fn collect(_library_name: &str) -> Self {
        Self::default()
    }

    /// Number of processes running the same file as `libjvm`.
    pub fn instances_of(&self, libjvm: &Path) -> u32 {
        FileId::of(libjvm)
            .and_then(|id| self.counts.get(&id).copied())
            .unwrap_or(0)
    }
}

/// Counts, per mapped path, processes whose first map naming
/// `library_name` points at an existing file.
#[cfg(target_os = "linux")]
pub fn mapped_library_counts(library_name: &str) -> HashMap<PathBuf, u32> {
    use procfs::process::MMapPath;

    let mut counts = HashMap::new();
    let processes = match procfs::process::all_processes() {
        Ok(processes) => processes,
        Err(e) => {
            debug!(error = %e, "cannot list processes");
            return counts;
        }
    };

    for entry in processes {
        let Ok(process) = entry else {
            continue;
        };
        let maps = match process.maps() {
            Ok(maps) => maps,
            Err(e) => {
                debug!(pid = process.pid(), error = %e, "skipping unreadable maps");
                continue;
            }
        };
        let mapped = maps.into_iter().find_map(|map| match map.pathname {
            MMapPath::Path(path) if path.to_string_lossy().contains(library_name) => Some(path),
            _ => None,
        });
        if let Some(path) = mapped.filter(|p| p.exists()) {
            *counts.entry(path).or_default() += 1;
        }
    }
    counts
}

/// Sends `SIGTERM` to every other process whose environment carries
/// `cookie_var=cookie_value`. Returns the signalled pids.
#[cfg(target_os = "linux")]
pub fn stop_scans(cookie_var: &str, cookie_value: &str) -> Vec<i32> {
    use std::ffi::OsStr;

    let own_pid = std::process::id() as i32;
    let mut signalled = Vec::new();
    let Ok(processes) = procfs::process::all_processes() else {
        return signalled;
    };

    for process in processes.flatten() {
        let pid = process.pid();
        if pid == own_pid {
            continue;
        }
        let Ok(environ) = process.environ() else {
            continue;
        };
        if environ.get(OsStr::new(cookie_var)).map(|v| v.as_os_str()) != Some(OsStr::new(cookie_value)) {
            continue;
        }
        match crate::signals::send(pid, crate::signals::SIGTERM) {
            Ok(()) => {
                debug!(pid, "sent SIGTERM to scan");
                signalled.push(pid);
            }
            Err(e) => debug!(pid, error = %e, "cannot signal scan"),
        }
    }
    signalled
}

#[cfg(not(target_os = "linux"))]
pub fn stop_scans(_cookie_var: &str, _cookie_value: &str) -> Vec<i32> {
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!(
            "jdowser_running_test_{}_{}_{}",
            std::process::id(),
            nanos,
            name
        ));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn counts_follow_file_identity_not_path() {
        let dir = temp_dir("identity");
        let real = dir.join("libjvm.so");
        fs::write(&real, b"lib").unwrap();
        let link = dir.join("alias.so");
        std::os::unix::fs::symlink(&real, &link).unwrap();
        let other = dir.join("other.so");
        fs::write(&other, b"other").unwrap();

        let mut by_path = HashMap::new();
        by_path.insert(real.clone(), 2);
        by_path.insert(link.clone(), 1);
        by_path.insert(dir.join("deleted.so"), 5);
        let running = RunningJvms::from_counts(&by_path);

        assert_eq!(running.instances_of(&real), 3);
        assert_eq!(running.instances_of(&link), 3);
        assert_eq!(running.instances_of(&other), 0);
        assert_eq!(running.instances_of(&dir.join("missing.so")), 0);

        let _ = fs::remove_dir_all(dir);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn unmatched_cookie_signals_nobody() {
        let value = format!("no-such-user-{}", std::process::id());
        assert!(stop_scans("JDOWSER_TEST_COOKIE", &value).is_empty());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn collect_ignores_libraries_nobody_maps() {
        let running = RunningJvms::collect("libjdowser-never-mapped.so");
        assert!(running.counts.is_empty());
    }
}
