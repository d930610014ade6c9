//! CLI module
//!
//! Command-line interface for running the ETL.
//!
//! # Commands
//!
//! - `run` - Extract, map and load one run
//! - `validate` - Check a configuration file without touching any data
//! - `cluster up|down` - Walk the provisioning steps for the `cluster`
//!   section against the in-memory provider and print the calls made

mod commands;
mod runner;

pub use commands::{Cli, ClusterAction, Commands, SinkKind};
pub use runner::{ClusterReport, RunOverrides, Runner};
