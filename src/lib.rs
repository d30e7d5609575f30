//! # jdowser
//!
//! Finds JVM and JDK installations on a host and reports their versions.
//!
//! ## Architecture
//!
//! - **scan**: `find`-driven discovery of `libjvm` files under a root
//! - **home**: java home and runtime archive resolution for a library
//! - **probe**: ordered version probe strategies
//! - **strings** / **elf**: banner scanning over a library's read-only data
//! - **classfile** / **reader**: constant pool parsing of `.class` payloads
//! - **version** / **installation**: the records a scan produces
//! - **daemon**: detached background scan and its start handshake
//! - **lock** / **status** / **signals**: coordination between invocations
//! - **running**: live JVM instance counts and scan termination via `/proc`
//! - **commands** / **report**: the `status`, `report` and `stop` views

pub mod classfile;
pub mod cli;
pub mod commands;
pub mod config;
pub mod daemon;
pub mod elf;
pub mod error;
pub mod home;
pub mod installation;
pub mod lock;
pub mod logging;
pub mod probe;
pub mod reader;
pub mod report;
pub mod running;
pub mod scan;
pub mod signals;
pub mod status;
pub mod strings;
pub mod version;
