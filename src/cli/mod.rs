//! Command-line interface

pub mod commands;
pub mod environment;

use clap::{Parser, Subcommand};
use commands::{RunCommand, ValidateCommand};
use std::ffi::OsString;

/// Lowers a stage-oriented pipeline description into Buildkite steps
#[derive(Debug, Parser, Clone)]
#[command(name = "jobsworth")]
#[command(version = "0.1.0")]
#[command(about = "Lowers a stage-oriented pipeline description into Buildkite steps", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Lower the pipeline and upload it to the running build
    Run(RunCommand),

    /// Check that a pipeline file parses
    Validate(ValidateCommand),
}

impl Cli {
    /// Parse CLI arguments from the environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
