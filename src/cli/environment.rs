//! Process environment ingestion
//!
//! Buildkite hands the run its context through `BUILDKITE_*` environment
//! variables; the deploy target for non-deploy stages comes from
//! `JOBSWORTH_ENVIRONMENT`. Everything here is a thin wrapper shaping those
//! variables into the core's `RunContext` and the client configuration.

use crate::buildkite::{BuildkiteConfig, RetryPolicy};
use crate::core::RunContext;
use std::env;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnvironmentError {
    #[error("this tool is intended to run within a Buildkite job")]
    NotInBuildkite,

    #[error("{name} invalid: {message}")]
    Invalid { name: &'static str, message: String },
}

/// Refuse to run outside a Buildkite job (skipped for dry runs).
pub fn require_buildkite() -> Result<(), EnvironmentError> {
    if env::var("BUILDKITE").as_deref() == Ok("true") {
        Ok(())
    } else {
        Err(EnvironmentError::NotInBuildkite)
    }
}

/// Build the run context from the process environment.
pub fn run_context_from_env() -> Result<RunContext, EnvironmentError> {
    run_context_from_vars(|name| env::var(name).ok())
}

fn run_context_from_vars(
    get: impl Fn(&str) -> Option<String>,
) -> Result<RunContext, EnvironmentError> {
    let build_number = match get("BUILDKITE_BUILD_NUMBER") {
        Some(raw) => raw.parse().map_err(|e| EnvironmentError::Invalid {
            name: "BUILDKITE_BUILD_NUMBER",
            message: format!("{}", e),
        })?,
        None => 0,
    };

    let var = |name: &str| get(name).unwrap_or_default();

    Ok(RunContext {
        build_number,
        pipeline_slug: var("BUILDKITE_PIPELINE_SLUG"),
        organization_slug: var("BUILDKITE_ORGANIZATION_SLUG"),
        branch_name: var("BUILDKITE_BRANCH"),
        build_message: var("BUILDKITE_MESSAGE"),
        repo_url: var("BUILDKITE_REPO"),
        // Anything but an explicit "false" counts as a pull request.
        in_pull_request: var("BUILDKITE_PULL_REQUEST") != "false",
        build_environment: var("JOBSWORTH_ENVIRONMENT"),
        ..RunContext::default()
    })
}

/// Build the Buildkite client configuration from the process environment.
pub fn buildkite_config_from_env(context: &RunContext) -> BuildkiteConfig {
    let defaults = BuildkiteConfig::default();
    BuildkiteConfig {
        agent_endpoint: env::var("BUILDKITE_AGENT_ENDPOINT")
            .unwrap_or(defaults.agent_endpoint),
        agent_token: env::var("BUILDKITE_AGENT_ACCESS_TOKEN").unwrap_or_default(),
        api_base: defaults.api_base,
        api_token: env::var("BUILDKITE_API_ACCESS_TOKEN").unwrap_or_default(),
        organization_slug: context.organization_slug.clone(),
        pipeline_slug: context.pipeline_slug.clone(),
        job_id: env::var("BUILDKITE_JOB_ID").unwrap_or_default(),
        retry: RetryPolicy::default(),
    }
}
