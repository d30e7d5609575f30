//! Ordered version probes for a discovered `libjvm`.
//!
//! Each strategy fills a scratch [`VersionRecord`] and reports success; the
//! first success wins and later strategies are not run. Failures are
//! logged at `debug` and never propagated.

use anyhow::{Context, Result};
use memmap2::Mmap;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;
use std::process::Command;
use tracing::debug;
use zip::ZipArchive;

use crate::config::COOKIE_VAR;
use crate::elf;
use crate::home::RuntimeArchives;
use crate::strings::BannerPatterns;
use crate::version::{VersionRecord, extract_from_class_bytes};

pub const LEGACY_VERSION_CLASS: &str = "sun/misc/Version.class";
pub const MODULE_VERSION_CLASS: &str = "classes/java/lang/VersionProps.class";

/// Everything a strategy may look at for one library.
#[derive(Debug, Clone, Copy)]
pub struct ProbeTarget<'a> {
    pub libjvm: &'a Path,
    pub java_home: Option<&'a Path>,
    pub archives: &'a RuntimeArchives,
}

pub trait ProbeStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fills `record` and returns whether it identified the runtime.
    fn probe(&self, target: &ProbeTarget<'_>, record: &mut VersionRecord) -> bool;
}

/// Runs `<home>/bin/java -XshowSettings:all -version` and reads the
/// `key = value` property lines it prints.
#[derive(Debug, Default)]
pub struct LiveExecution;

impl ProbeStrategy for LiveExecution {
    fn name(&self) -> &'static str {
        "live-execution"
    }

    fn probe(&self, target: &ProbeTarget<'_>, record: &mut VersionRecord) -> bool {
        let Some(home) = target.java_home else {
            return false;
        };
        let launcher = home.join("bin").join("java");
        let output = match Command::new(&launcher)
            .args(["-XshowSettings:all", "-version"])
            .env("LC_ALL", "C")
            .env_remove(COOKIE_VAR)
            .output()
        {
            Ok(output) => output,
            Err(err) => {
                debug!(launcher = %launcher.display(), %err, "launcher did not start");
                return false;
            }
        };
        if !output.status.success() {
            debug!(launcher = %launcher.display(), status = ?output.status, "launcher failed");
            return false;
        }

        let mut combined = output.stdout;
        combined.extend_from_slice(&output.stderr);
        apply_settings_dump(&String::from_utf8_lossy(&combined), record) > 0
    }
}

/// Applies every recognized `key = value` line. Returns how many applied.
pub fn apply_settings_dump(text: &str, record: &mut VersionRecord) -> usize {
    let mut applied = 0;
    for line in text.lines() {
        let line = line.trim();
        let Some((key, value)) = line.split_once(" = ") else {
            continue;
        };
        if record.apply_property(key, value.trim()) {
            applied += 1;
        }
    }
    applied
}

/// Scans printable strings in the library, restricted to `.rodata` for ELF
/// images.
pub struct StringScan {
    patterns: BannerPatterns,
}

impl StringScan {
    pub fn new() -> Result<Self> {
        Ok(Self {
            patterns: BannerPatterns::new().context("failed to compile banner patterns")?,
        })
    }

    fn scan_file(&self, path: &Path, record: &mut VersionRecord) -> Result<bool> {
        let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
        let mmap = unsafe { Mmap::map(&file).with_context(|| format!("mmap failed: {}", path.display()))? };
        let range = elf::section_range(&mmap, ".rodata").unwrap_or(0..mmap.len());
        Ok(self.patterns.scan(&mmap[range], record))
    }
}

impl ProbeStrategy for StringScan {
    fn name(&self) -> &'static str {
        "string-scan"
    }

    fn probe(&self, target: &ProbeTarget<'_>, record: &mut VersionRecord) -> bool {
        self.scan_file(target.libjvm, record).unwrap_or_else(|err| {
            debug!(libjvm = %target.libjvm.display(), err = %format!("{err:#}"), "string scan failed");
            false
        })
    }
}

/// Reads `sun/misc/Version.class` out of a JDK 8 style `rt.jar`.
#[derive(Debug, Default)]
pub struct LegacyArchive;

impl LegacyArchive {
    fn read_version_class(jar: &Path) -> Result<Vec<u8>> {
        let file = File::open(jar).with_context(|| format!("cannot open jar: {}", jar.display()))?;
        let mmap = unsafe { Mmap::map(&file).with_context(|| format!("mmap failed: {}", jar.display()))? };
        let mut archive = ZipArchive::new(Cursor::new(&mmap[..]))
            .with_context(|| format!("cannot read zip structure: {}", jar.display()))?;
        let mut entry = archive
            .by_name(LEGACY_VERSION_CLASS)
            .with_context(|| format!("{LEGACY_VERSION_CLASS} not found in {}", jar.display()))?;
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes)?;
        Ok(bytes)
    }
}

impl ProbeStrategy for LegacyArchive {
    fn name(&self) -> &'static str {
        "legacy-archive"
    }

    fn probe(&self, target: &ProbeTarget<'_>, record: &mut VersionRecord) -> bool {
        let Some(jar) = target.archives.rt_jar.as_deref() else {
            return false;
        };
        match Self::read_version_class(jar) {
            Ok(bytes) => extract_from_class_bytes(&bytes, record) > 0,
            Err(err) => {
                debug!(err = %format!("{err:#}"), "rt.jar lookup failed");
                false
            }
        }
    }
}

/// Extracts `VersionProps.class` from `java.base.jmod` with `unzip`, which
/// tolerates the jmod header in front of the zip data.
#[derive(Debug, Default)]
pub struct ModuleImage;

impl ProbeStrategy for ModuleImage {
    fn name(&self) -> &'static str {
        "module-image"
    }

    fn probe(&self, target: &ProbeTarget<'_>, record: &mut VersionRecord) -> bool {
        let Some(jmod) = target.archives.base_jmod.as_deref() else {
            return false;
        };
        let output = match Command::new("unzip")
            .arg("-cpq")
            .arg(jmod)
            .arg(MODULE_VERSION_CLASS)
            .env("LC_ALL", "C")
            .output()
        {
            Ok(output) => output,
            Err(err) => {
                debug!(%err, "unzip did not start");
                return false;
            }
        };
        if output.stdout.is_empty() {
            debug!(jmod = %jmod.display(), "no version class in module");
            return false;
        }
        extract_from_class_bytes(&output.stdout, record) > 0
    }
}

/// The strategy chain, most precise first.
pub struct VersionProbe {
    strategies: Vec<Box<dyn ProbeStrategy>>,
}

impl VersionProbe {
    pub fn new(allow_running_java: bool) -> Result<Self> {
        let mut strategies: Vec<Box<dyn ProbeStrategy>> = Vec::with_capacity(4);
        if allow_running_java {
            strategies.push(Box::new(LiveExecution));
        }
        strategies.push(Box::new(StringScan::new()?));
        strategies.push(Box::new(LegacyArchive));
        strategies.push(Box::new(ModuleImage));
        Ok(Self { strategies })
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Returns the record from the first successful strategy, or an empty
    /// record when none succeeds.
    pub fn probe(&self, target: &ProbeTarget<'_>) -> VersionRecord {
        for strategy in &self.strategies {
            let mut record = VersionRecord::default();
            if strategy.probe(target, &mut record) {
                debug!(libjvm = %target.libjvm.display(), strategy = strategy.name(), "version identified");
                return record;
            }
            debug!(libjvm = %target.libjvm.display(), strategy = strategy.name(), "strategy gave up");
        }
        VersionRecord::default()
    }
}
