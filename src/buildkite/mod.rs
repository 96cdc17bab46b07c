//! Buildkite API collaborators
//!
//! There are two different Buildkite APIs in use here:
//! - the agent API interacts with the build and job currently in progress
//!   (metadata writes, pipeline upload);
//! - the regular REST API interacts with pre-existing builds (metadata
//!   reads for artifact reuse).
//!
//! The core engine only sees the narrow traits below, so tests drive it
//! with in-memory fakes instead of a live endpoint.

pub mod client;
pub mod retry;

pub use client::{BuildkiteClient, BuildkiteConfig};
pub use retry::{retry_api, RetryPolicy};

use crate::core::BkStep;
use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

/// Error talking to a Buildkite API.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected response body: {0}")]
    Body(String),
}

impl ApiError {
    /// Authorization and not-found responses are configuration errors, not
    /// transient ones; retrying them would only exhaust the budget.
    pub fn breaks_retry(&self) -> bool {
        matches!(self, ApiError::Status { status: 401 | 404, .. })
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Transport(err.to_string())
    }
}

/// Read and write build metadata.
#[async_trait]
pub trait MetadataClient: Send + Sync {
    /// Fetch the published metadata of another build of this pipeline.
    async fn read_other_build_metadata(
        &self,
        build_number: &str,
    ) -> Result<HashMap<String, String>, ApiError>;

    /// Publish metadata on the current build.
    async fn write_metadata(&self, metadata: &HashMap<String, String>) -> Result<(), ApiError>;
}

/// Insert lowered steps into the currently running build.
#[async_trait]
pub trait PipelineUploader: Send + Sync {
    async fn insert_pipeline_steps(&self, steps: &[BkStep]) -> Result<(), ApiError>;
}
