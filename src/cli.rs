use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "jdowser")]
#[command(about = "Utility to find JVMs/JDKs and report their versions")]
#[command(disable_version_flag = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Dump output in JSON format
    #[arg(long, global = true, conflicts_with = "csv")]
    pub json: bool,

    /// Dump output in CSV format
    #[arg(long, global = true)]
    pub csv: bool,

    /// Root scan directory
    #[arg(long, global = true, value_name = "SCANROOT", default_value = "/")]
    pub root: PathBuf,

    /// Comma separated filesystem types to skip
    #[arg(long, global = true, value_name = "FSTYPE[,FSTYPE..]", default_value = "nfs,tmp,proc")]
    pub skipfs: String,

    /// Do not run `java -version` to detect the version
    #[arg(long, global = true)]
    pub nojvmrun: bool,

    /// Wait for the scan process to complete
    #[arg(long, global = true)]
    pub wait: bool,

    /// Show version and exit
    #[arg(long)]
    pub version: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Subcommand)]
pub enum Commands {
    /// Start a background scan for JVM installations
    Start,
    /// Terminate a running scan
    Stop,
    /// Show the state of the last scan
    Status,
    /// Print the installations found by the last scan
    Report,
}

impl Commands {
    pub fn as_str(self) -> &'static str {
        match self {
            Commands::Start => "start",
            Commands::Stop => "stop",
            Commands::Status => "status",
            Commands::Report => "report",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Csv,
    Json,
}

impl Cli {
    pub fn format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else if self.csv {
            OutputFormat::Csv
        } else {
            OutputFormat::Text
        }
    }
}
