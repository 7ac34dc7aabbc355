//! Command-line front end for live reads and writes

pub mod cli;
pub mod config;
pub mod logging;
pub mod reader;
pub mod runtime;
pub mod writer;

pub use config::{GlobalSettings, ReadSettings, WriteSettings};
pub use writer::WriteReport;
