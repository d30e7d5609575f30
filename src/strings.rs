//! Version detection from printable strings embedded in a JVM library.
//!
//! HotSpot builds embed a banner such as
//! `OpenJDK 64-Bit Server VM (11.0.2+9) for linux-amd64 JRE (11.0.2+9), built on ...`
//! in their read-only data; Zing builds carry a vendor marker and a
//! `-zing_` version token instead.

use anyhow::Result;
use regex::Regex;

use crate::version::VersionRecord;

/// Shortest candidate considered, counting the terminating NUL.
pub const MIN_CANDIDATE_LEN: usize = 11;

const AZUL_MARKER: &str = "Azul Systems";
const AZUL_VENDOR: &str = "Azul Systems, Inc.";
const ZING_RUNTIME_NAME: &str = "Zing Runtime Environment for Java Applications";
const ZING_VM_NAME: &str = "Zing 64-Bit Tiered VM";
const ZING_VERSION_TOKEN: &str = "-zing_";
const ADOPT_MARKER: &str = "AdoptOpenJDK";
const ORACLE_VENDOR: &str = "Oracle Corporation";

/// Iterates NUL-terminated runs of printable ASCII in a byte slice.
///
/// Runs shorter than [`MIN_CANDIDATE_LEN`] (terminator included), runs that
/// contain a byte outside `' '..='~'`, and a trailing run with no
/// terminator are skipped.
pub struct PrintableStrings<'a> {
    rest: &'a [u8],
}

impl<'a> PrintableStrings<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { rest: bytes }
    }
}

impl<'a> Iterator for PrintableStrings<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let end = self.rest.iter().position(|&b| b == 0)?;
            let candidate = &self.rest[..end];
            self.rest = &self.rest[end + 1..];

            if candidate.len() + 1 < MIN_CANDIDATE_LEN {
                continue;
            }
            if !candidate.iter().all(|b| (b' '..=b'~').contains(b)) {
                continue;
            }
            // Printable ASCII is always valid UTF-8.
            if let Ok(s) = std::str::from_utf8(candidate) {
                return Some(s);
            }
        }
    }
}

/// Banner patterns, tried in order after the vendor markers.
pub struct BannerPatterns {
    full: Regex,
    reduced: Regex,
    legacy: Regex,
}

impl BannerPatterns {
    pub fn new() -> Result<Self> {
        Ok(Self {
            full: Regex::new(
                r"^(?P<name>OpenJDK.* VM) \((?P<ver>.*)\) for .* JRE \((?P<re_name>.*)\) \((?P<re_ver>.*)\), built",
            )?,
            reduced: Regex::new(
                r"^(?P<name>OpenJDK.* VM) \((?P<ver>.*)\) for .* JRE \((?P<re_ver>.*)\), built",
            )?,
            legacy: Regex::new(
                r"^(?P<name>Java HotSpot\(TM\).* VM) \((?P<ver>.*)\) for .* JRE \((?P<re_ver>.*)\), built",
            )?,
        })
    }

    /// Applies one candidate string to `record`. Vendor markers win over
    /// banners; the Zing version token only counts after the Azul marker.
    pub fn apply(&self, line: &str, zing: &mut bool, record: &mut VersionRecord) {
        if line.contains(AZUL_MARKER) {
            record.vm_vendor = AZUL_VENDOR.to_string();
            record.runtime_vendor = AZUL_VENDOR.to_string();
            record.runtime_name = ZING_RUNTIME_NAME.to_string();
            record.vm_name = ZING_VM_NAME.to_string();
            *zing = true;
        } else if line.contains(ADOPT_MARKER) {
            record.vm_vendor = ADOPT_MARKER.to_string();
            record.runtime_vendor = ADOPT_MARKER.to_string();
        } else if let Some(caps) = self.full.captures(line) {
            record.vm_name = caps["name"].to_string();
            record.vm_version = caps["ver"].to_string();
            record.runtime_name = caps["re_name"].to_string();
            record.runtime_version = caps["re_ver"].to_string();
        } else if let Some(caps) = self.reduced.captures(line) {
            record.vm_name = caps["name"].to_string();
            record.vm_version = caps["ver"].to_string();
            record.runtime_name = caps["name"].to_string();
            record.runtime_version = caps["re_ver"].to_string();
        } else if let Some(caps) = self.legacy.captures(line) {
            record.vm_name = caps["name"].to_string();
            record.vm_version = caps["ver"].to_string();
            record.runtime_name = caps["name"].to_string();
            record.runtime_version = caps["re_ver"].to_string();
            record.vm_vendor = ORACLE_VENDOR.to_string();
            record.runtime_vendor = ORACLE_VENDOR.to_string();
        } else if *zing && line.contains(ZING_VERSION_TOKEN) {
            record.vm_version = line.to_string();
            record.runtime_version = line.to_string();
        }
    }

    /// Scans `bytes` until both VM version and vendor are known, then
    /// derives the short version. Succeeds when a short version results.
    pub fn scan(&self, bytes: &[u8], record: &mut VersionRecord) -> bool {
        let mut zing = false;
        for line in PrintableStrings::new(bytes) {
            self.apply(line, &mut zing, record);
            if record.is_identified() {
                break;
            }
        }
        record.derive_short_version();
        !record.version.is_empty()
    }
}
