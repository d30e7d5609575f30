use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

const LAUNCHER: &str = "bin/java";
const COMPILER: &str = "bin/javac";
const LEGACY_ARCHIVE: &str = "rt.jar";
const BASE_MODULE: &str = "java.base.jmod";

/// Walks up from `libjvm` to the directory that owns a `bin/java` launcher.
///
/// When both a directory and its parent carry a launcher (a JDK 8 `jre/`
/// nested inside a JDK) the outer one wins. The filesystem root itself is
/// never considered.
pub fn find_java_home(libjvm: &Path) -> Option<PathBuf> {
    let mut current = libjvm;
    loop {
        let parent = current.parent()?;
        if current.as_os_str().is_empty() {
            return None;
        }
        if current.join(LAUNCHER).exists() {
            if !parent.as_os_str().is_empty() && parent.join(LAUNCHER).exists() {
                return Some(parent.to_path_buf());
            }
            return Some(current.to_path_buf());
        }
        current = parent;
    }
}

pub fn is_jdk(java_home: &Path) -> bool {
    java_home.join(COMPILER).exists()
}

/// Version-bearing archives found under a Java home. At most one is set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeArchives {
    pub rt_jar: Option<PathBuf>,
    pub base_jmod: Option<PathBuf>,
}

/// Returns the first `rt.jar` or `java.base.jmod` in a depth-first walk of
/// `java_home` ordered by file name.
pub fn locate_archives(java_home: &Path) -> RuntimeArchives {
    let walker = WalkBuilder::new(java_home)
        .standard_filters(false)
        .follow_links(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    for entry in walker.flatten() {
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let name = entry.file_name();
        if name == LEGACY_ARCHIVE {
            return RuntimeArchives {
                rt_jar: Some(entry.into_path()),
                base_jmod: None,
            };
        }
        if name == BASE_MODULE {
            return RuntimeArchives {
                rt_jar: None,
                base_jmod: Some(entry.into_path()),
            };
        }
    }
    RuntimeArchives::default()
}
