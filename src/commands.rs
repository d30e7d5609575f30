use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, BufRead, BufReader, ErrorKind, Write};
use std::path::Path;
use tracing::debug;

use crate::cli::OutputFormat;
use crate::config::{COOKIE_VAR, Config};
use crate::installation::JvmInstallation;
use crate::lock::ScanLock;
use crate::report::{InstallationRenderer, render_status};
use crate::running::{RunningJvms, stop_scans};
use crate::status::{NOT_STARTED, ScanState, StatusStore};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prints the scan status. A scan that left `Running` behind without
/// holding the lock any more is marked `Unknown`.
pub fn status(config: &Config) -> Result<()> {
    let lock = ScanLock::new(config.lock_path());
    let acquired = if config.wait {
        lock.acquire().map(|()| true)
    } else {
        lock.try_acquire()
    };
    let acquired = match acquired {
        Ok(acquired) => acquired,
        Err(err) => {
            println!("{err}");
            return Ok(());
        }
    };

    let store = StatusStore::for_config(config);
    let mut status = store.read();
    if acquired
        && let Some(stale) = status.as_mut()
        && stale.state == ScanState::Running
        && stale.end_time == NOT_STARTED
    {
        store
            .transition(stale, ScanState::Unknown)
            .context("cannot record indeterminate scan")?;
    }
    lock.release();

    let status = status.unwrap_or_else(|| StatusStore::fresh(config));
    render_status(config.format, &status, io::stdout().lock())
}

fn no_results(format: OutputFormat, never_scanned: bool) -> Result<()> {
    let mut out = io::stdout().lock();
    match format {
        OutputFormat::Json => writeln!(out, "[]")?,
        OutputFormat::Csv => writeln!(out, "No results found")?,
        OutputFormat::Text => {
            writeln!(out, "No results found")?;
            if never_scanned {
                writeln!(out, "Run 'start' to generate a report.")?;
            }
        }
    }
    Ok(())
}

/// Prints the installations from the last scan with live instance counts.
pub fn report(config: &Config) -> Result<()> {
    let lock = ScanLock::new(config.lock_path());
    if config.wait
        && let Err(err) = lock.acquire()
    {
        println!("{err}");
        return Ok(());
    }

    let path = config.output_path();
    let file = match File::open(&path) {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::NotFound => return no_results(config.format, true),
        Err(err) => {
            println!("Cannot open report file: {err}");
            return Ok(());
        }
    };
    if file.metadata().map(|m| m.len() == 0).unwrap_or(true) {
        return no_results(config.format, false);
    }

    let running = RunningJvms::collect(config.libjvm_file_name);
    let mut renderer = InstallationRenderer::new(config.format, io::stdout().lock())?;
    for line in BufReader::new(file).lines() {
        let line = line.with_context(|| format!("cannot read {}", path.display()))?;
        let mut installation: JvmInstallation = match serde_json::from_str(&line) {
            Ok(installation) => installation,
            Err(err) => {
                debug!(%err, "skipping unreadable report line");
                continue;
            }
        };
        installation.running_instances = running.instances_of(Path::new(&installation.libjvm));
        renderer.render(&installation)?;
    }
    renderer.finish()?;
    lock.release();
    Ok(())
}

/// Terminates this user's running scans, waits for them to record it, and
/// prints the resulting status.
pub fn stop(config: &Config) -> Result<()> {
    let signalled = stop_scans(COOKIE_VAR, config.cookie_value());
    if !signalled.is_empty() {
        // The scan releases the lock only after persisting `Terminated`.
        let lock = ScanLock::new(config.lock_path());
        if lock.acquire().is_ok() {
            lock.release();
        }
    }

    match StatusStore::for_config(config).read() {
        Some(status) => render_status(config.format, &status, io::stdout().lock()),
        None => Ok(()),
    }
}

/// Prints the program version in the requested format.
pub fn version<W: Write>(format: OutputFormat, program: &str, mut out: W) -> Result<()> {
    match format {
        OutputFormat::Json => {
            writeln!(out, "{}", serde_json::json!({ "version": VERSION }))?;
        }
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(&mut out);
            writer.write_record(["version", VERSION])?;
            writer.flush()?;
        }
        OutputFormat::Text => writeln!(out, "{program} version: {VERSION}")?,
    }
    Ok(())
}
