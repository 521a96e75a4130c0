//! CLI layer for triage-rs.
//!
//! Provides the command-line interface using clap, with commands for
//! validating knowledge, probing retrieval and running sessions.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{Cli, Commands, ProfileArgs, SessionArgs};
