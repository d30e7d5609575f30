use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io;
use std::path::Path;
use tracing::{info, warn};

use crate::home::{find_java_home, is_jdk, locate_archives, RuntimeArchives};
use crate::probe::{ProbeTarget, VersionProbe};
use crate::version::VersionRecord;

/// One discovered JVM library and what is known about the runtime that
/// ships it. Field order is the persisted JSON key order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JvmInstallation {
    pub host: String,
    pub java_home: String,
    pub is_jdk: bool,
    pub libjvm: String,
    pub libjvm_hash: String,
    pub version_info: VersionRecord,
    /// Only meaningful at report time; scans persist zero.
    pub running_instances: u32,
}

impl JvmInstallation {
    /// Resolves the home, hashes the library and runs the version probes.
    pub fn inspect(libjvm: &Path, host: &str, probe: &VersionProbe) -> Self {
        let libjvm_hash = hash_file(libjvm).unwrap_or_else(|err| {
            warn!(libjvm = %libjvm.display(), err = %format!("{err:#}"), "cannot hash library");
            String::new()
        });

        let java_home = find_java_home(libjvm);
        let (archives, jdk) = match java_home.as_deref() {
            Some(home) => (locate_archives(home), is_jdk(home)),
            None => (RuntimeArchives::default(), false),
        };

        let version_info = probe.probe(&ProbeTarget {
            libjvm,
            java_home: java_home.as_deref(),
            archives: &archives,
        });

        let installation = Self {
            host: host.to_string(),
            java_home: java_home
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default(),
            is_jdk: jdk,
            libjvm: libjvm.to_string_lossy().into_owned(),
            libjvm_hash,
            version_info,
            running_instances: 0,
        };
        info!(
            libjvm = %installation.libjvm,
            version = %installation.version_info.version,
            vendor = %installation.version_info.vm_vendor,
            "inspected installation"
        );
        installation
    }
}

/// Hex SHA-256 of a file's content, streamed.
pub fn hash_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).with_context(|| format!("cannot read {}", path.display()))?;
    Ok(hex::encode(hasher.finalize()))
}
