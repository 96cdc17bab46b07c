//! Build driver
//!
//! Ties the collaborators and the core engine together for one run: resolve
//! directives, establish the build identity, lower the pipeline, publish
//! metadata, and upload the lowered steps.

use crate::buildkite::{ApiError, MetadataClient, PipelineUploader};
use crate::core::{
    build_code_version, marshal_steps, parse_trigger_message, LowerError, Pipeline, RunContext,
    TriggerDirective,
};
use crate::scm::{CommitResolver, ScmError};
use std::collections::HashMap;
use thiserror::Error;
use tracing::info;

/// Metadata key the build's code version is published under. Reads of a
/// reused build depend on it, so it is written on every successful run.
pub const META_CODE_VERSION: &str = "jobsworth:code_version";

/// Metadata key the build's source commit id is published under.
pub const META_SOURCE_COMMIT: &str = "jobsworth:source_commit_id";

/// Prefix of metadata keys forwarded verbatim from a reused build.
const FORWARD_PREFIX: &str = "build:";

/// Deprecated forwarding prefix, still honored for older builds.
const DEPRECATED_FORWARD_PREFIX: &str = "artifact_";

/// Error running a build. All of these are terminal for the run; no
/// partially lowered output is ever uploaded.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("error reading metadata of build #{build}: {source}")]
    MetadataRead { build: String, source: ApiError },

    #[error("build #{build} has no {key} metadata; was it created by jobsworth?")]
    ReuseMetadata { build: String, key: &'static str },

    #[error("error resolving current commit: {0}")]
    Commit(#[from] ScmError),

    #[error(transparent)]
    Lower(#[from] LowerError),

    #[error("error serializing lowered steps: {0}")]
    Marshal(serde_yaml::Error),

    #[error("error writing metadata: {0}")]
    MetadataWrite(ApiError),

    #[error("error uploading pipeline steps: {0}")]
    Upload(ApiError),
}

/// The external collaborators one run needs.
pub struct Collaborators<'a> {
    pub metadata: &'a dyn MetadataClient,
    pub uploader: &'a dyn PipelineUploader,
    pub commits: &'a dyn CommitResolver,
}

/// Run one build: fix the context, lower the pipeline, publish the results.
///
/// With `dry_run` set, everything up to and including lowering still
/// happens, but the output document is printed to stdout and nothing is
/// written to Buildkite.
pub async fn run_build(
    pipeline: &Pipeline,
    context: &mut RunContext,
    collaborators: &Collaborators<'_>,
    dry_run: bool,
) -> Result<(), BuildError> {
    // Certain micro-syntaxes in the build message trigger special
    // behaviors, like rolling back to an earlier artifact. Directive fields
    // are fixed here, before any lowering.
    if let Some(directive) = parse_trigger_message(&context.build_message) {
        info!(directive = ?directive, "trigger message carries a directive");
        apply_directive(context, directive);
    }

    let mut metadata = HashMap::new();

    if let Some(build) = context.artifacts_from_build.clone() {
        let published = collaborators
            .metadata
            .read_other_build_metadata(&build)
            .await
            .map_err(|source| BuildError::MetadataRead {
                build: build.clone(),
                source,
            })?;

        // Recomputing the version would wrongly claim a different artifact;
        // the referenced build's published identity is copied verbatim.
        context.code_version = published
            .get(META_CODE_VERSION)
            .ok_or(BuildError::ReuseMetadata {
                build: build.clone(),
                key: META_CODE_VERSION,
            })?
            .clone();
        context.source_commit_id = published
            .get(META_SOURCE_COMMIT)
            .ok_or(BuildError::ReuseMetadata {
                build: build.clone(),
                key: META_SOURCE_COMMIT,
            })?
            .clone();

        // Forward the reused build's artifact keys so a later rollback can
        // reuse this build in turn.
        for (key, value) in &published {
            if key.starts_with(FORWARD_PREFIX) || key.starts_with(DEPRECATED_FORWARD_PREFIX) {
                metadata.insert(key.clone(), value.clone());
            }
        }
        info!(build = %build, "reusing artifacts from earlier build");
    } else {
        let commit = collaborators.commits.current_commit().await?;
        context.code_version =
            build_code_version(&commit.id, commit.committer_time, context.build_number);
        context.source_commit_id = commit.id;
    }

    metadata.insert(META_CODE_VERSION.to_string(), context.code_version.clone());
    metadata.insert(META_SOURCE_COMMIT.to_string(), context.source_commit_id.clone());

    let steps = pipeline.lower(context)?;

    if dry_run {
        let document = marshal_steps(&steps).map_err(BuildError::Marshal)?;
        print!("{}", document);
        info!(steps = steps.len(), "dry run, skipping metadata write and upload");
        return Ok(());
    }

    collaborators
        .metadata
        .write_metadata(&metadata)
        .await
        .map_err(BuildError::MetadataWrite)?;

    collaborators
        .uploader
        .insert_pipeline_steps(&steps)
        .await
        .map_err(BuildError::Upload)?;

    info!(
        steps = steps.len(),
        code_version = %context.code_version,
        "uploaded lowered pipeline"
    );
    Ok(())
}

fn apply_directive(context: &mut RunContext, directive: TriggerDirective) {
    match directive {
        TriggerDirective::Rollback { build_number } => {
            context.artifacts_from_build = Some(build_number);
        }
        TriggerDirective::DeployOverride {
            build_number,
            environment,
        } => {
            context.artifacts_from_build = build_number;
            context.override_deploy_environment = Some(environment);
        }
    }
}
