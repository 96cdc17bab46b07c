//! HTTP client for the Buildkite agent and REST APIs

use crate::buildkite::retry::{retry_api, RetryPolicy};
use crate::buildkite::{ApiError, MetadataClient, PipelineUploader};
use crate::core::{marshal_steps, BkStep};
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

/// Connection settings for both Buildkite APIs.
#[derive(Debug, Clone)]
pub struct BuildkiteConfig {
    /// Agent API endpoint, e.g. `https://agent.buildkite.com/v3`.
    pub agent_endpoint: String,

    /// Agent access token for the running job.
    pub agent_token: String,

    /// REST API base, e.g. `https://api.buildkite.com/v2`.
    pub api_base: String,

    /// REST API access token used for other-build metadata reads.
    pub api_token: String,

    /// Organization owning the pipeline.
    pub organization_slug: String,

    /// Pipeline the current build belongs to.
    pub pipeline_slug: String,

    /// Job the metadata writes and pipeline upload attach to.
    pub job_id: String,

    /// Retry behavior for all calls.
    pub retry: RetryPolicy,
}

impl Default for BuildkiteConfig {
    fn default() -> Self {
        Self {
            agent_endpoint: "https://agent.buildkite.com/v3".to_string(),
            agent_token: String::new(),
            api_base: "https://api.buildkite.com/v2".to_string(),
            api_token: String::new(),
            organization_slug: String::new(),
            pipeline_slug: String::new(),
            job_id: String::new(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Client speaking to both Buildkite APIs.
pub struct BuildkiteClient {
    http: reqwest::Client,
    config: BuildkiteConfig,
}

impl BuildkiteClient {
    pub fn new(config: BuildkiteConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    async fn api_get(&self, path: &str) -> Result<serde_json::Value, ApiError> {
        let url = format!("{}/{}", self.config.api_base.trim_end_matches('/'), path);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.config.api_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                url,
            });
        }
        response
            .json()
            .await
            .map_err(|e| ApiError::Body(e.to_string()))
    }

    async fn agent_post(&self, path: &str, body: serde_json::Value) -> Result<(), ApiError> {
        let url = format!(
            "{}/{}",
            self.config.agent_endpoint.trim_end_matches('/'),
            path
        );
        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Token {}", self.config.agent_token))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                url,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MetadataClient for BuildkiteClient {
    async fn read_other_build_metadata(
        &self,
        build_number: &str,
    ) -> Result<HashMap<String, String>, ApiError> {
        let path = format!(
            "organizations/{}/pipelines/{}/builds/{}",
            self.config.organization_slug, self.config.pipeline_slug, build_number
        );
        let body = retry_api(&self.config.retry, || self.api_get(&path)).await?;

        let raw = body
            .get("meta_data")
            .and_then(serde_json::Value::as_object)
            .ok_or_else(|| ApiError::Body("build has no meta_data object".to_string()))?;

        let mut metadata = HashMap::new();
        for (key, value) in raw {
            if let Some(s) = value.as_str() {
                metadata.insert(key.clone(), s.to_string());
            }
        }
        debug!(build = build_number, keys = metadata.len(), "read build metadata");
        Ok(metadata)
    }

    async fn write_metadata(&self, metadata: &HashMap<String, String>) -> Result<(), ApiError> {
        let path = format!("jobs/{}/data/set", self.config.job_id);
        for (key, value) in metadata {
            retry_api(&self.config.retry, || {
                self.agent_post(&path, json!({ "key": key, "value": value }))
            })
            .await?;
            debug!(key = %key, "wrote metadata");
        }
        Ok(())
    }
}

#[async_trait]
impl PipelineUploader for BuildkiteClient {
    async fn insert_pipeline_steps(&self, steps: &[BkStep]) -> Result<(), ApiError> {
        let document = marshal_steps(steps).map_err(|e| ApiError::Body(e.to_string()))?;
        let path = format!("jobs/{}/pipelines", self.config.job_id);
        let body = json!({
            "uuid": Uuid::new_v4().to_string(),
            "pipeline": document,
            "file_name": "pipeline.yaml",
        });
        retry_api(&self.config.retry, || self.agent_post(&path, body.clone())).await
    }
}
