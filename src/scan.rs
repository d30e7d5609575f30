use anyhow::{Context, Result};
use std::ffi::{OsStr, OsString};
use std::io::{self, BufRead, BufReader};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use tracing::{debug, warn};

use crate::config::{COOKIE_VAR, Config};

/// Arguments for `find` that list regular files called `file_name` under
/// `root`, staying on one device and pruning the given filesystem types.
pub fn find_args(root: &Path, skip_fs: &[String], file_name: &str) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![root.as_os_str().to_owned()];
    if !skip_fs.is_empty() {
        args.push("(".into());
        for (i, fs) in skip_fs.iter().enumerate() {
            if i > 0 {
                args.push("-o".into());
            }
            args.push("-fstype".into());
            args.push(fs.into());
        }
        args.extend([")", "-prune", "-o"].map(OsString::from));
    }
    args.extend(["-xdev", "-type", "f", "-name"].map(OsString::from));
    args.push(file_name.into());
    args.push("-print".into());
    args
}

/// Runs `find` and calls `on_path` for every line it prints.
///
/// `find` runs without the scan cookie, so `stop` signals only the scan.
/// Stderr is drained on a helper thread so neither pipe can fill up. A
/// non-zero exit (unreadable directories) is not an error; failing to start
/// `find` is.
pub fn enumerate<F>(root: &Path, skip_fs: &[String], file_name: &str, mut on_path: F) -> Result<()>
where
    F: FnMut(&Path),
{
    let mut child = Command::new("find")
        .args(find_args(root, skip_fs, file_name))
        .env("LC_ALL", "C")
        .env_remove(COOKIE_VAR)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .context("failed to execute find")?;

    let stderr = child.stderr.take().context("find stderr was not captured")?;
    let drain = thread::spawn(move || {
        // Bytes, not strings: a path that is not UTF-8 must not stop the
        // drain and leave `find` writing into a closed pipe.
        let mut reader = BufReader::new(stderr);
        let mut ignored = 0usize;
        for line in (&mut reader).split(b'\n').map_while(|line| line.ok()) {
            debug!(line = %String::from_utf8_lossy(&line), "find");
            ignored += 1;
        }
        let _ = io::copy(&mut reader, &mut io::sink());
        ignored
    });

    let mut read_error = None;
    if let Some(stdout) = child.stdout.take() {
        for line in BufReader::new(stdout).split(b'\n') {
            match line {
                Ok(line) if line.is_empty() => {}
                Ok(line) => on_path(Path::new(OsStr::from_bytes(&line))),
                Err(err) => {
                    read_error = Some(err);
                    let _ = child.kill();
                    break;
                }
            }
        }
    }

    let ignored = drain.join().unwrap_or_default();
    let status = child.wait().context("failed to wait for find")?;
    if let Some(err) = read_error {
        return Err(err).context("cannot read find output");
    }
    if !status.success() {
        warn!(%status, ignored, "find reported errors");
    }
    Ok(())
}

/// Enumerates `libjvm` candidates for a scan configuration.
pub fn find_libjvm<F>(config: &Config, on_path: F) -> Result<()>
where
    F: FnMut(&Path),
{
    enumerate(&config.root, &config.skip_fs, config.libjvm_file_name, on_path)
}
