//! Test utility functions for jobsworth

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use jobsworth::buildkite::{ApiError, MetadataClient, PipelineUploader};
use jobsworth::core::{BkStep, Pipeline, RunContext};
use jobsworth::scm::{CommitInfo, CommitResolver, ScmError};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory Buildkite fake recording everything the driver publishes.
pub struct InMemoryBuildkite {
    other_builds: RwLock<HashMap<String, HashMap<String, String>>>,
    written: RwLock<Vec<HashMap<String, String>>>,
    uploaded: RwLock<Vec<Vec<BkStep>>>,
}

impl InMemoryBuildkite {
    pub fn new() -> Self {
        Self {
            other_builds: RwLock::new(HashMap::new()),
            written: RwLock::new(Vec::new()),
            uploaded: RwLock::new(Vec::new()),
        }
    }

    /// Seed the metadata of a pre-existing build.
    pub async fn publish_build(&self, number: &str, metadata: HashMap<String, String>) {
        self.other_builds
            .write()
            .await
            .insert(number.to_string(), metadata);
    }

    pub async fn written_metadata(&self) -> Vec<HashMap<String, String>> {
        self.written.read().await.clone()
    }

    pub async fn uploaded_steps(&self) -> Vec<Vec<BkStep>> {
        self.uploaded.read().await.clone()
    }
}

impl Default for InMemoryBuildkite {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataClient for InMemoryBuildkite {
    async fn read_other_build_metadata(
        &self,
        build_number: &str,
    ) -> Result<HashMap<String, String>, ApiError> {
        self.other_builds
            .read()
            .await
            .get(build_number)
            .cloned()
            .ok_or_else(|| ApiError::Status {
                status: 404,
                url: format!("in-memory://builds/{}", build_number),
            })
    }

    async fn write_metadata(&self, metadata: &HashMap<String, String>) -> Result<(), ApiError> {
        self.written.write().await.push(metadata.clone());
        Ok(())
    }
}

#[async_trait]
impl PipelineUploader for InMemoryBuildkite {
    async fn insert_pipeline_steps(&self, steps: &[BkStep]) -> Result<(), ApiError> {
        self.uploaded.write().await.push(steps.to_vec());
        Ok(())
    }
}

/// Commit resolver pinned to a fixed revision.
pub struct FixedCommit(pub CommitInfo);

impl FixedCommit {
    pub fn example() -> Self {
        FixedCommit(CommitInfo {
            id: "abc1234def5678900000000000000000000000ff".to_string(),
            committer_time: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        })
    }
}

#[async_trait]
impl CommitResolver for FixedCommit {
    async fn current_commit(&self) -> Result<CommitInfo, ScmError> {
        Ok(self.0.clone())
    }
}

/// Commit resolver that always fails, for paths that must not consult git.
pub struct NoCommit;

#[async_trait]
impl CommitResolver for NoCommit {
    async fn current_commit(&self) -> Result<CommitInfo, ScmError> {
        Err(ScmError::Spawn(
            "commit lookup should not happen in this test".to_string(),
        ))
    }
}

/// A run context for a plain primary-branch build.
pub fn master_context(message: &str) -> RunContext {
    RunContext {
        build_number: 42,
        pipeline_slug: "widgets".to_string(),
        organization_slug: "example".to_string(),
        branch_name: "master".to_string(),
        build_message: message.to_string(),
        repo_url: "git@github.com:example/widgets.git".to_string(),
        build_environment: "build".to_string(),
        ..RunContext::default()
    }
}

/// Parse a pipeline from YAML, panicking on failure.
pub fn pipeline_from_yaml(yaml: &str) -> Pipeline {
    Pipeline::from_yaml(yaml).unwrap_or_else(|e| panic!("failed to parse pipeline YAML: {}", e))
}

/// A pipeline definition exercising all four stages.
pub const FULL_PIPELINE: &str = r#"
smoke_test:
  - command: make lint
    name: lint
build:
  - command: make build
    name: build
deploy:
  - command: deploy.sh ${environment}
    name: deploy
validation_test:
  - command: validate.sh
    name: validate
trivial_deploy_environments: [qa]
cautious_deploy_environments: [prod]
"#;

/// Reduce lowered output to a readable shape: "wait" for barriers, the
/// display name for steps.
pub fn shape(steps: &[BkStep]) -> Vec<String> {
    steps
        .iter()
        .map(|entry| match entry {
            BkStep::Wait => "wait".to_string(),
            BkStep::Step(step) => step
                .get_str("name")
                .or_else(|| step.get_str("label"))
                .unwrap_or("?")
                .to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fake_read_of_unknown_build_is_not_found() {
        let buildkite = InMemoryBuildkite::new();
        let err = buildkite.read_other_build_metadata("9").await.unwrap_err();
        assert!(err.breaks_retry());
    }

    #[tokio::test]
    async fn test_fake_records_writes_and_uploads() {
        let buildkite = InMemoryBuildkite::new();
        let mut metadata = HashMap::new();
        metadata.insert("k".to_string(), "v".to_string());
        buildkite.write_metadata(&metadata).await.unwrap();
        buildkite
            .insert_pipeline_steps(&[BkStep::Wait])
            .await
            .unwrap();

        assert_eq!(buildkite.written_metadata().await.len(), 1);
        assert_eq!(buildkite.uploaded_steps().await, vec![vec![BkStep::Wait]]);
    }
}
