//! Runtime identity record and the mapping from known property keys and
//! class-constant field names onto it.

use serde::{Deserialize, Serialize};

use crate::classfile::ClassFile;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionRecord {
    #[serde(rename = "java_version")]
    pub version: String,
    #[serde(rename = "runtime_name")]
    pub runtime_name: String,
    #[serde(rename = "java_runtime_vendor")]
    pub runtime_vendor: String,
    #[serde(rename = "java_runtime_version")]
    pub runtime_version: String,
    #[serde(rename = "java_vm_name")]
    pub vm_name: String,
    #[serde(rename = "java_vm_vendor")]
    pub vm_vendor: String,
    #[serde(rename = "java_vm_version")]
    pub vm_version: String,
}

impl VersionRecord {
    pub fn is_empty(&self) -> bool {
        self == &VersionRecord::default()
    }

    /// Vendor and VM version are both known; string scanning stops here.
    pub fn is_identified(&self) -> bool {
        !self.vm_version.is_empty() && !self.vm_vendor.is_empty()
    }

    /// Applies one `java -XshowSettings` property. Returns whether the key
    /// was recognized.
    pub fn apply_property(&mut self, key: &str, value: &str) -> bool {
        let slot = match key {
            "java.version" => &mut self.version,
            "java.runtime.name" => &mut self.runtime_name,
            "java.vendor" => &mut self.runtime_vendor,
            "java.runtime.version" => &mut self.runtime_version,
            "java.vm.name" => &mut self.vm_name,
            "java.vm.vendor" => &mut self.vm_vendor,
            "java.vm.version" => &mut self.vm_version,
            _ => return false,
        };
        *slot = value.to_string();
        true
    }

    /// Applies a static string field of `sun/misc/Version` or
    /// `java/lang/VersionProps`. Field names compare case-insensitively.
    pub fn apply_class_field(&mut self, name: &str, value: &str) -> bool {
        if value.is_empty() {
            return false;
        }
        match name.to_ascii_lowercase().as_str() {
            "version" | "java_version" => {
                self.version = value.to_string();
            }
            "runtimename" | "java_runtime_name" => {
                self.runtime_name = value.to_string();
                self.vm_name = value.to_string();
            }
            "vendor" => {
                self.runtime_vendor = value.to_string();
                self.vm_vendor = value.to_string();
            }
            "runtimeversion" | "java_runtime_version" => {
                self.runtime_version = value.to_string();
                self.vm_version = value.to_string();
            }
            _ => return false,
        }
        true
    }

    /// Sets `version` to the runtime version up to its first `-`, `+` or
    /// `_`, or to the whole runtime version when there is no separator.
    pub fn derive_short_version(&mut self) {
        let full = self.runtime_version.as_str();
        self.version = match full.find(['-', '+', '_']) {
            Some(idx) if idx > 0 => full[..idx].to_string(),
            _ => full.to_string(),
        };
    }
}

/// Parses a version-bearing class file and copies every recognized string
/// constant into `record`. Returns the number of fields applied.
///
/// # Panics
///
/// Panics on malformed class bytes; see [`ClassFile::parse`].
pub fn extract_from_class_bytes(bytes: &[u8], record: &mut VersionRecord) -> usize {
    let class = ClassFile::parse(bytes);
    let mut applied = 0;
    for (name, value) in class.string_constants() {
        if record.apply_class_field(name, value) {
            applied += 1;
        }
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::fixtures::ClassBuilder;

    #[test]
    fn extracts_legacy_version_fields() {
        let mut builder = ClassBuilder::new();
        builder
            .string_field("launcher_name", "java")
            .string_field("java_version", "1.8.0_292")
            .string_field("java_runtime_name", "OpenJDK Runtime Environment")
            .string_field("java_runtime_version", "1.8.0_292-b10");
        let bytes = builder.build();

        let mut record = VersionRecord::default();
        let applied = extract_from_class_bytes(&bytes, &mut record);

        assert_eq!(applied, 3);
        assert_eq!(record.version, "1.8.0_292");
        assert_eq!(record.runtime_name, "OpenJDK Runtime Environment");
        assert_eq!(record.vm_name, "OpenJDK Runtime Environment");
        assert_eq!(record.runtime_version, "1.8.0_292-b10");
        assert_eq!(record.vm_version, "1.8.0_292-b10");
        assert!(record.runtime_vendor.is_empty());
    }

    #[test]
    fn field_names_match_case_insensitively() {
        let mut builder = ClassBuilder::new();
        builder
            .string_field("VERSION", "17.0.2")
            .string_field("RuntimeName", "OpenJDK Runtime Environment")
            .string_field("VENDOR", "Eclipse Adoptium")
            .string_field("RuntimeVersion", "17.0.2+8")
            .string_field("VENDOR_URL", "https://adoptium.net/");
        let bytes = builder.build();

        let mut record = VersionRecord::default();
        assert_eq!(extract_from_class_bytes(&bytes, &mut record), 4);
        assert_eq!(record.version, "17.0.2");
        assert_eq!(record.runtime_vendor, "Eclipse Adoptium");
        assert_eq!(record.vm_vendor, "Eclipse Adoptium");
        assert_eq!(record.vm_version, "17.0.2+8");
    }

    #[test]
    fn missing_fields_leave_record_empty() {
        let mut builder = ClassBuilder::new();
        builder.string_field("unrelated", "value");
        let bytes = builder.build();

        let mut record = VersionRecord::default();
        assert_eq!(extract_from_class_bytes(&bytes, &mut record), 0);
        assert!(record.is_empty());
    }

    #[test]
    fn short_version_stops_at_first_separator() {
        let cases = [
            ("11.0.2+9", "11.0.2"),
            ("1.8.0_292-b10", "1.8.0"),
            ("17-ea", "17"),
            ("21", "21"),
            ("", ""),
        ];
        for (runtime, expected) in cases {
            let mut record = VersionRecord {
                runtime_version: runtime.to_string(),
                ..VersionRecord::default()
            };
            record.derive_short_version();
            assert_eq!(record.version, expected, "runtime version {runtime}");
        }
    }

    #[test]
    fn properties_map_to_record() {
        let mut record = VersionRecord::default();
        assert!(record.apply_property("java.vm.vendor", "Azul Systems, Inc."));
        assert!(record.apply_property("java.vm.version", "25.292-b10"));
        assert!(!record.apply_property("user.home", "/root"));
        assert!(record.is_identified());
    }

    #[test]
    fn serializes_with_report_keys() {
        let record = VersionRecord {
            version: "11.0.2".to_string(),
            ..VersionRecord::default()
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["java_version"], "11.0.2");
        assert_eq!(json["runtime_name"], "");
        assert!(json.get("java_vm_vendor").is_some());
    }
}
