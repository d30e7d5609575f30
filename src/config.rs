use anyhow::{bail, Result};
use std::env;
use std::fs::DirBuilder;
use std::path::{Path, PathBuf};

use crate::cli::{Cli, Commands, OutputFormat};
use crate::error::Error;

pub const COOKIE_VAR: &str = "SCANJVM_COOKIE";
pub const PARENT_PID_VAR: &str = "SCANJVM_PID";
pub const CACHE_DIR_VAR: &str = "JDOWSER_CACHE_DIR";

const OUTPUT_FILE: &str = "jdowser.out";
const ERROR_FILE: &str = "jdowser.err";
const STATUS_FILE: &str = "jdowser.status";
const LOG_FILE: &str = "jdowser.log";
const LOCK_FILE: &str = ".lck";

#[cfg(target_os = "macos")]
pub const LIBJVM_FILE_NAME: &str = "libjvm.dylib";
#[cfg(not(target_os = "macos"))]
pub const LIBJVM_FILE_NAME: &str = "libjvm.so";

/// Everything a command needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub command: Commands,
    pub format: OutputFormat,
    pub root: PathBuf,
    pub skip_fs: Vec<String>,
    pub no_jvm_run: bool,
    pub wait: bool,
    pub libjvm_file_name: &'static str,
    pub user: String,
    pub host: String,
    /// `SCANJVM_COOKIE=<user>`, as it appears in a process environment.
    pub cookie: String,
    pub log_dir: PathBuf,
    /// Invocation arguments recorded in the status of a `start`.
    pub args: Vec<String>,
}

impl Config {
    /// Resolves user, host and the private log directory (created `0700`).
    pub fn from_cli(cli: &Cli, command: Commands, raw_args: &[String]) -> Result<Self> {
        let skip_fs = parse_skip_fs(&cli.skipfs)?;
        let user = current_user();
        let host = current_host()?;
        let log_dir = cache_dir()?.join("jdowser").join(&host).join(&user);
        create_private_dir(&log_dir)?;

        let args = if command == Commands::Start {
            invocation_args(raw_args, command)
        } else {
            Vec::new()
        };

        Ok(Self {
            command,
            format: cli.format(),
            root: cli.root.clone(),
            skip_fs,
            no_jvm_run: cli.nojvmrun,
            wait: cli.wait,
            libjvm_file_name: LIBJVM_FILE_NAME,
            cookie: format!("{COOKIE_VAR}={user}"),
            user,
            host,
            log_dir,
            args,
        })
    }

    /// The value half of [`Config::cookie`].
    pub fn cookie_value(&self) -> &str {
        self.cookie
            .split_once('=')
            .map(|(_, v)| v)
            .unwrap_or_default()
    }

    pub fn output_path(&self) -> PathBuf {
        self.log_dir.join(OUTPUT_FILE)
    }

    pub fn error_path(&self) -> PathBuf {
        self.log_dir.join(ERROR_FILE)
    }

    pub fn status_path(&self) -> PathBuf {
        self.log_dir.join(STATUS_FILE)
    }

    pub fn log_path(&self) -> PathBuf {
        self.log_dir.join(LOG_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.log_dir.join(LOCK_FILE)
    }
}

/// Splits `--skipfs`, which may only hold lowercase letters and commas.
pub fn parse_skip_fs(value: &str) -> Result<Vec<String>> {
    if !value.chars().all(|c| c.is_ascii_lowercase() || c == ',') {
        bail!("bad --skipfs parameter: {value}");
    }
    Ok(value
        .split(',')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect())
}

/// Arguments without the program name and the command word.
pub fn invocation_args(raw_args: &[String], command: Commands) -> Vec<String> {
    let mut args: Vec<String> = raw_args.iter().skip(1).cloned().collect();
    if let Some(pos) = args.iter().rposition(|a| a == command.as_str()) {
        args.remove(pos);
    }
    args
}

fn current_user() -> String {
    match env::var("USER") {
        Ok(user) if !user.is_empty() => user,
        // SAFETY: geteuid has no preconditions and cannot fail.
        _ => format!("uid{}", unsafe { libc::geteuid() }),
    }
}

fn current_host() -> Result<String, Error> {
    let name = hostname::get()
        .map_err(|e| Error::Environment(format!("cannot resolve host name: {e}")))?;
    Ok(name.to_string_lossy().into_owned())
}

fn cache_dir() -> Result<PathBuf, Error> {
    if let Some(dir) = env::var_os(CACHE_DIR_VAR).filter(|d| !d.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    dirs::cache_dir().ok_or_else(|| Error::Environment("cannot resolve cache directory".to_string()))
}

fn create_private_dir(dir: &Path) -> Result<(), Error> {
    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir).map_err(|e| Error::io(dir, e))
}


#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn skip_fs_accepts_lowercase_lists() {
        assert_eq!(parse_skip_fs("nfs,tmp,proc").unwrap(), strings(&["nfs", "tmp", "proc"]));
        assert_eq!(parse_skip_fs(",nfs,,").unwrap(), strings(&["nfs"]));
        assert!(parse_skip_fs("").unwrap().is_empty());
    }

    #[test]
    fn skip_fs_rejects_other_characters() {
        let err = parse_skip_fs("nfs;rm").unwrap_err().to_string();
        assert_eq!(err, "bad --skipfs parameter: nfs;rm");
        assert!(parse_skip_fs("NFS").is_err());
    }

    #[test]
    fn invocation_args_drop_program_and_command() {
        let raw = strings(&["/usr/bin/jdowser", "--root=/opt", "--nojvmrun", "start"]);
        assert_eq!(
            invocation_args(&raw, Commands::Start),
            strings(&["--root=/opt", "--nojvmrun"])
        );
        assert!(invocation_args(&strings(&["jdowser"]), Commands::Start).is_empty());
    }

    #[test]
    fn derived_paths_live_in_log_dir() {
        let config = fixtures::config_in(&std::env::temp_dir().join("jdowser_cfg_paths"), Commands::Status);
        assert!(config.output_path().ends_with("jdowser.out"));
        assert!(config.error_path().ends_with("jdowser.err"));
        assert!(config.status_path().ends_with("jdowser.status"));
        assert!(config.lock_path().ends_with(".lck"));
        assert_eq!(config.cookie_value(), "tester");
    }
}
