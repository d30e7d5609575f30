//! Text, CSV and JSON rendering of installations and scan status.

use anyhow::Result;
use chrono::{Local, TimeZone};
use std::io::Write;

use crate::cli::OutputFormat;
use crate::installation::JvmInstallation;
use crate::status::ScanStatus;

pub const INSTALLATION_COLUMNS: [&str; 13] = [
    "host",
    "libjvm",
    "libjvm_hash",
    "java_home",
    "is_jdk",
    "java_version",
    "java_runtime_name",
    "java_runtime_version",
    "java_runtime_vendor",
    "java_vm_name",
    "java_vm_version",
    "java_vm_vendor",
    "running_instances",
];

pub const STATUS_COLUMNS: [&str; 5] = ["host", "state", "start_time", "end_time", "args"];

/// Streams pretty-printed values as the elements of one JSON array.
pub struct JsonArrayWriter<W: Write> {
    out: W,
    first: bool,
}

impl<W: Write> JsonArrayWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out, first: true }
    }

    pub fn write<T: serde::Serialize>(&mut self, value: &T) -> Result<()> {
        let body = serde_json::to_string_pretty(value)?.replace('\n', "\n  ");
        let sep = if self.first { "[\n  " } else { ",\n  " };
        self.first = false;
        write!(self.out, "{sep}{body}")?;
        Ok(())
    }

    /// Closes the array; an array with no elements renders as `[]`.
    pub fn finish(mut self) -> Result<W> {
        if self.first {
            writeln!(self.out, "[]")?;
        } else {
            writeln!(self.out, "\n]")?;
        }
        Ok(self.out)
    }
}

fn installation_row(inst: &JvmInstallation) -> [String; 13] {
    let v = &inst.version_info;
    [
        inst.host.clone(),
        inst.libjvm.clone(),
        inst.libjvm_hash.clone(),
        inst.java_home.clone(),
        inst.is_jdk.to_string(),
        v.version.clone(),
        v.runtime_name.clone(),
        v.runtime_version.clone(),
        v.runtime_vendor.clone(),
        v.vm_name.clone(),
        v.vm_version.clone(),
        v.vm_vendor.clone(),
        inst.running_instances.to_string(),
    ]
}

/// Renders installations as they arrive, in the requested format.
pub enum InstallationRenderer<W: Write> {
    Text(W),
    Csv(csv::Writer<W>),
    Json(JsonArrayWriter<W>),
}

impl<W: Write> InstallationRenderer<W> {
    pub fn new(format: OutputFormat, out: W) -> Result<Self> {
        Ok(match format {
            OutputFormat::Text => InstallationRenderer::Text(out),
            OutputFormat::Csv => {
                let mut writer = csv::Writer::from_writer(out);
                writer.write_record(INSTALLATION_COLUMNS)?;
                InstallationRenderer::Csv(writer)
            }
            OutputFormat::Json => InstallationRenderer::Json(JsonArrayWriter::new(out)),
        })
    }

    pub fn render(&mut self, inst: &JvmInstallation) -> Result<()> {
        match self {
            InstallationRenderer::Text(out) => {
                for (key, value) in INSTALLATION_COLUMNS.iter().zip(installation_row(inst)) {
                    writeln!(out, "{key}: {value}")?;
                }
                writeln!(out)?;
            }
            InstallationRenderer::Csv(writer) => writer.write_record(installation_row(inst))?,
            InstallationRenderer::Json(writer) => writer.write(inst)?,
        }
        Ok(())
    }

    pub fn finish(self) -> Result<()> {
        match self {
            InstallationRenderer::Text(mut out) => out.flush()?,
            InstallationRenderer::Csv(mut writer) => writer.flush()?,
            InstallationRenderer::Json(writer) => writer.finish()?.flush()?,
        }
        Ok(())
    }
}

/// Local time for a Unix timestamp; sentinels are printed as-is.
pub fn format_timestamp(secs: i64) -> String {
    if secs < 0 {
        return secs.to_string();
    }
    match Local.timestamp_opt(secs, 0).single() {
        Some(t) => t.format("%Y-%m-%d %H:%M:%S %z").to_string(),
        None => secs.to_string(),
    }
}

pub fn render_status<W: Write>(format: OutputFormat, status: &ScanStatus, mut out: W) -> Result<()> {
    let start = format_timestamp(status.start_time);
    let end = format_timestamp(status.end_time);
    let args = status.args.join(" ");
    match format {
        OutputFormat::Json => {
            writeln!(out, "{}", serde_json::to_string_pretty(status)?)?;
        }
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(&mut out);
            writer.write_record(STATUS_COLUMNS)?;
            writer.write_record([
                status.host.as_str(),
                status.state.as_str(),
                start.as_str(),
                end.as_str(),
                args.as_str(),
            ])?;
            writer.flush()?;
        }
        OutputFormat::Text => {
            writeln!(out, "host: {}", status.host)?;
            writeln!(out, "state: {}", status.state.as_str())?;
            writeln!(out, "start_time: {start}")?;
            writeln!(out, "end_time: {end}")?;
            writeln!(out, "args: {args}")?;
            if !status.error.is_empty() {
                writeln!(out, "error: {}", status.error.join(" "))?;
            }
        }
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::{ScanState, NOT_STARTED};
    use crate::version::VersionRecord;

    fn sample() -> JvmInstallation {
        JvmInstallation {
            host: "h1".to_string(),
            java_home: "/opt/jdk".to_string(),
            is_jdk: true,
            libjvm: "/opt/jdk/lib/server/libjvm.so".to_string(),
            libjvm_hash: "abc".to_string(),
            version_info: VersionRecord {
                version: "11.0.2".to_string(),
                runtime_name: "OpenJDK, Runtime".to_string(),
                ..VersionRecord::default()
            },
            running_instances: 2,
        }
    }

    fn render_all(format: OutputFormat, items: &[JvmInstallation]) -> String {
        let mut buf = Vec::new();
        let mut renderer = InstallationRenderer::new(format, &mut buf).unwrap();
        for item in items {
            renderer.render(item).unwrap();
        }
        renderer.finish().unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn empty_json_array() {
        assert_eq!(render_all(OutputFormat::Json, &[]), "[]\n");
    }

    #[test]
    fn json_array_is_valid_and_indented() {
        let out = render_all(OutputFormat::Json, &[sample(), sample()]);
        assert!(out.starts_with("[\n  {\n    \"host\": \"h1\""));
        assert!(out.ends_with("}\n]\n"));
        let parsed: Vec<JvmInstallation> = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].running_instances, 2);
    }

    #[test]
    fn csv_has_header_and_quotes_commas() {
        let out = render_all(OutputFormat::Csv, &[sample()]);
        let mut lines = out.lines();
        assert_eq!(lines.next().unwrap(), INSTALLATION_COLUMNS.join(","));
        let row = lines.next().unwrap();
        assert!(row.starts_with("h1,/opt/jdk/lib/server/libjvm.so,abc,/opt/jdk,true,11.0.2,\"OpenJDK, Runtime\","));
        assert!(row.ends_with(",2"));
    }

    #[test]
    fn text_lists_keys_in_order() {
        let out = render_all(OutputFormat::Text, &[sample()]);
        let keys: Vec<&str> = out
            .lines()
            .filter_map(|l| l.split_once(": ").map(|(k, _)| k))
            .collect();
        assert_eq!(keys, INSTALLATION_COLUMNS);
        assert!(out.ends_with("running_instances: 2\n\n"));
    }

    #[test]
    fn status_text_shows_sentinels_and_errors() {
        let mut status = ScanStatus::new("h1", vec!["--nojvmrun".to_string()]);
        status.state = ScanState::Error;
        status.error = vec!["find failed".to_string()];
        let mut buf = Vec::new();
        render_status(OutputFormat::Text, &status, &mut buf).unwrap();
        let out = String::from_utf8(buf).unwrap();
        assert_eq!(
            out,
            "host: h1\nstate: Error\nstart_time: -1\nend_time: -1\nargs: --nojvmrun\nerror: find failed\n"
        );
        assert_eq!(format_timestamp(NOT_STARTED), "-1");
    }

    #[test]
    fn status_csv_has_fixed_header() {
        let status = ScanStatus::new("h1", Vec::new());
        let mut buf = Vec::new();
        render_status(OutputFormat::Csv, &status, &mut buf).unwrap();
        let out = String::from_utf8(buf).unwrap();
        assert_eq!(out, "host,state,start_time,end_time,args\nh1,Unknown,-1,-1,\n");
    }
}
