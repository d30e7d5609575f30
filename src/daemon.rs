//! The `start` command: detaching a background scan and running it.
//!
//! Handshake, in order:
//! 1. The launcher blocks `SIGUSR1` and `SIGCHLD`, re-executes itself with
//!    `SCANJVM_COOKIE` and `SCANJVM_PID` set, and waits for either signal.
//! 2. The detached child takes the scan lock, persists `Running` and sends
//!    `SIGUSR1` to the launcher. When the lock is taken it only reports.
//! 3. The launcher prints the persisted status and exits. A child that dies
//!    before step 2 wakes it through `SIGCHLD`.

use anyhow::{Context, Result};
use std::env;
use std::fs::File;
use std::io::{self, LineWriter, Write};
use std::os::unix::process::CommandExt;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use tracing::{info, warn};

use crate::config::{CACHE_DIR_VAR, COOKIE_VAR, Config, PARENT_PID_VAR};
use crate::installation::JvmInstallation;
use crate::lock::ScanLock;
use crate::logging::{self, LOG_ENV};
use crate::probe::VersionProbe;
use crate::report::render_status;
use crate::scan::find_libjvm;
use crate::signals::{self, SIGCHLD, SIGINT, SIGTERM, SIGUSR1, SignalSet};
use crate::status::{ScanState, ScanStatus, StatusStore};

/// Variables copied into the otherwise empty environment of the child.
const PASSTHROUGH_VARS: [&str; 5] = ["HOME", "USER", "PATH", CACHE_DIR_VAR, LOG_ENV];

/// True in the re-executed background process.
pub fn is_detached() -> bool {
    env::var_os(COOKIE_VAR).is_some()
}

pub fn start(config: &Config) -> Result<()> {
    if !config.wait && !is_detached() {
        return launch_detached(config);
    }
    run_scan(config)
}

/// Prints the persisted status, or a fresh one when none was persisted.
fn print_status(config: &Config) -> Result<()> {
    let status = StatusStore::for_config(config)
        .read()
        .unwrap_or_else(|| StatusStore::fresh(config));
    render_status(config.format, &status, io::stdout().lock())
}

fn launch_detached(config: &Config) -> Result<()> {
    let handshake = SignalSet::new(&[SIGUSR1, SIGCHLD]).context("cannot build signal set")?;
    handshake.block().context("cannot block handshake signals")?;

    let exe = env::current_exe().context("cannot locate own executable")?;
    let mut command = Command::new(&exe);
    command
        .args(env::args_os().skip(1))
        .env_clear()
        .env("LC_ALL", "C")
        .env(PARENT_PID_VAR, std::process::id().to_string())
        .env(COOKIE_VAR, config.cookie_value())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .process_group(0);
    for name in PASSTHROUGH_VARS {
        if let Some(value) = env::var_os(name) {
            command.env(name, value);
        }
    }

    let mut child = command
        .spawn()
        .with_context(|| format!("failed to start background scan: {}", exe.display()))?;
    info!(pid = child.id(), "background scan started");

    loop {
        match handshake.wait().context("waiting for background scan")? {
            SIGUSR1 => break,
            SIGCHLD => {
                if let Ok(Some(exit)) = child.try_wait() {
                    warn!(%exit, "background scan exited before reporting");
                    break;
                }
            }
            _ => {}
        }
    }

    print_status(config)
}

/// Lets whoever started this scan know where it stands: the launcher by
/// signal when there is one, otherwise the terminal.
fn announce(config: &Config) -> Result<()> {
    let launcher = env::var(PARENT_PID_VAR)
        .ok()
        .and_then(|pid| pid.parse::<libc::pid_t>().ok());
    match launcher {
        Some(pid) => {
            if let Err(err) = signals::send(pid, SIGUSR1) {
                warn!(pid, %err, "cannot notify launcher");
            }
            Ok(())
        }
        None => print_status(config),
    }
}

fn lock_status(status: &Mutex<ScanStatus>) -> std::sync::MutexGuard<'_, ScanStatus> {
    status.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Body of the scan process. Only the lock holder mutates status and
/// output files.
pub fn run_scan(config: &Config) -> Result<()> {
    let lock = Arc::new(ScanLock::new(config.lock_path()));
    match lock.try_acquire() {
        Ok(true) => {
            if is_detached()
                && let Err(err) = logging::reset_log_file(&config.log_path())
            {
                warn!(%err, "cannot reset scan log");
            }
        }
        Ok(false) => {
            announce(config)?;
            if config.wait {
                lock.acquire()?;
                lock.release();
                announce(config)?;
            }
            return Ok(());
        }
        Err(err) => {
            announce(config)?;
            return Err(err.into());
        }
    }

    // Blocked before any thread exists so every thread inherits the mask
    // and only the watcher consumes these.
    let termination = SignalSet::new(&[SIGINT, SIGTERM]).context("cannot build signal set")?;
    termination.block().context("cannot block termination signals")?;

    let store = StatusStore::for_config(config);
    let status = Arc::new(Mutex::new(StatusStore::fresh(config)));
    spawn_termination_watcher(termination, store.clone(), Arc::clone(&status), Arc::clone(&lock));

    store
        .transition(&mut lock_status(&status), ScanState::Running)
        .context("cannot record scan start")?;
    announce(config)?;

    let outcome = scan_into_files(config);

    {
        let mut status = lock_status(&status);
        match &outcome {
            Ok(found) => {
                info!(found, "scan finished");
                store.transition(&mut status, ScanState::Finished)?;
            }
            Err(err) => {
                warn!(err = %format!("{err:#}"), "scan failed");
                record_error(config, err);
                store.transition(&mut status, ScanState::Error)?;
            }
        }
    }
    lock.release();

    if config.wait {
        print_status(config)?;
    }
    Ok(())
}

fn spawn_termination_watcher(
    signals: SignalSet,
    store: StatusStore,
    status: Arc<Mutex<ScanStatus>>,
    lock: Arc<ScanLock>,
) {
    thread::spawn(move || {
        let Ok(signal) = signals.wait() else {
            return;
        };
        warn!(signal, "scan terminated");
        // Held until exit so the main thread cannot record an outcome after
        // this one.
        let mut status = lock_status(&status);
        let _ = store.transition(&mut status, ScanState::Terminated);
        lock.release();
        std::process::exit(1);
    });
}

/// Truncates the output and error files, then streams one JSON line per
/// discovered library. Returns the number of libraries written.
fn scan_into_files(config: &Config) -> Result<usize> {
    let out_path = config.output_path();
    let out = File::create(&out_path)
        .with_context(|| format!("cannot create {}", out_path.display()))?;
    let err_path = config.error_path();
    File::create(&err_path).with_context(|| format!("cannot create {}", err_path.display()))?;

    let mut out = LineWriter::new(out);
    let probe = VersionProbe::new(!config.no_jvm_run)?;
    let mut found = 0usize;

    find_libjvm(config, |libjvm| {
        let installation = JvmInstallation::inspect(libjvm, &config.host, &probe);
        let written = serde_json::to_string(&installation)
            .map_err(io::Error::from)
            .and_then(|line| writeln!(out, "{line}"));
        match written {
            Ok(()) => found += 1,
            Err(err) => warn!(libjvm = %libjvm.display(), %err, "cannot record installation"),
        }
    })?;

    out.flush()
        .with_context(|| format!("cannot write {}", out_path.display()))?;
    Ok(found)
}

/// Appends a scan-level failure to `jdowser.err`, where status reads pick it
/// up.
fn record_error(config: &Config, err: &anyhow::Error) {
    let path = config.error_path();
    let appended = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .and_then(|mut file| writeln!(file, "{err:#}"));
    if let Err(io_err) = appended {
        warn!(path = %path.display(), %io_err, "cannot record scan error");
    }
}
