//! jobsworth - lowers a stage-oriented pipeline description into the flat,
//! barrier-separated step list Buildkite executes.

pub mod buildkite;
pub mod cli;
pub mod core;
pub mod driver;
pub mod scm;

// Re-export commonly used types
pub use self::buildkite::{
    ApiError, BuildkiteClient, BuildkiteConfig, MetadataClient, PipelineUploader, RetryPolicy,
};
pub use self::core::{
    BkStep, InterpolateError, LowerError, Pipeline, RunContext, StageContext, Step,
    TriggerDirective,
};
pub use self::driver::{run_build, BuildError, Collaborators};
pub use self::scm::{CommitInfo, CommitResolver, GitCli};
