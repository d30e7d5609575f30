use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const LOG_ENV: &str = "JDOWSER_LOG";
const DEFAULT_FILTER: &str = "warn";

/// Where a process sends its diagnostics.
#[derive(Debug, Clone, Copy)]
pub enum LogTarget<'a> {
    /// Interactive invocations log to stderr.
    Terminal,
    /// The detached scan has no terminal; it logs to a file.
    File(&'a Path),
}

fn filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Opens `path` for appending without truncating it. The scan that wins the
/// lock clears it with [`reset_log_file`]; a losing `start` must not.
pub fn open_log_file(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Empties the log file of a new scan. Appending writers continue at the
/// new end.
pub fn reset_log_file(path: &Path) -> io::Result<()> {
    OpenOptions::new().write(true).open(path)?.set_len(0)
}

/// Installs the global subscriber. Calling it twice is harmless.
pub fn init(target: LogTarget<'_>) {
    match target {
        LogTarget::Terminal => {
            let stderr_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false);
            let _ = tracing_subscriber::registry()
                .with(filter())
                .with(stderr_layer)
                .try_init();
        }
        LogTarget::File(path) => {
            // Nowhere to report a failure here; run without logging.
            let Ok(file) = open_log_file(path) else {
                return;
            };
            let file_layer = fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(true);
            let _ = tracing_subscriber::registry()
                .with(filter())
                .with(file_layer)
                .try_init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!(
            "jdowser_logging_test_{}_{}_{}",
            std::process::id(),
            nanos,
            name
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn opening_keeps_existing_log_until_reset() -> io::Result<()> {
        let dir = temp_dir("append");
        let path = dir.join("jdowser.log");
        std::fs::write(&path, "running scan line\n")?;

        let mut late = open_log_file(&path)?;
        assert_eq!(std::fs::read_to_string(&path)?, "running scan line\n");

        reset_log_file(&path)?;
        writeln!(late, "new scan line")?;
        assert_eq!(std::fs::read_to_string(&path)?, "new scan line\n");

        let _ = std::fs::remove_dir_all(dir);
        Ok(())
    }
}
