//! Pipeline definition from YAML

use crate::core::step::Step;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Error loading the pipeline definition. Fatal; no output is produced.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("error reading pipeline file: {0}")]
    Io(#[from] std::io::Error),

    #[error("error parsing pipeline: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Top-level pipeline definition.
///
/// Four ordered stage sequences plus the deploy-environment classification
/// lists. Immutable once loaded; orchestration reads it and never writes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pipeline {
    /// Steps run against every branch before anything else.
    #[serde(default)]
    pub smoke_test: Vec<Step>,

    /// Steps producing the deployable artifacts.
    #[serde(default)]
    pub build: Vec<Step>,

    /// Steps deploying the artifacts to one environment.
    #[serde(default)]
    pub deploy: Vec<Step>,

    /// Steps validating a deployed environment.
    #[serde(default)]
    pub validation_test: Vec<Step>,

    /// Environments that may deploy concurrently with their peers.
    #[serde(default)]
    pub trivial_deploy_environments: Vec<String>,

    /// Environments deployed strictly sequentially, potentially with manual
    /// approval steps.
    #[serde(default)]
    pub cautious_deploy_environments: Vec<String>,
}

impl Pipeline {
    /// Load the pipeline definition from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse the pipeline definition from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}
