//! CLI command definitions

use clap::Args;

/// Lower the pipeline and upload it to the running build
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to the pipeline YAML file
    pub file: String,

    /// Print the lowered output document instead of uploading it
    #[arg(long)]
    pub dry_run: bool,
}

/// Check that a pipeline file parses
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to the pipeline YAML file
    pub file: String,
}
