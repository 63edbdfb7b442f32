//! CLI layer for medchat-rs.
//!
//! Provides the command-line interface using clap, with commands for
//! maintaining the knowledge base and talking to the response pipeline.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{BackendKind, Cli, Commands, ModeArg};
