//! Source revision lookup
//!
//! The build identity needs the current commit's id and committer timestamp.
//! The resolver is a trait so tests can pin a fixed revision instead of
//! depending on a real checkout.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Error resolving the current source revision.
#[derive(Debug, Error)]
pub enum ScmError {
    #[error("failed to run git: {0}")]
    Spawn(String),

    #[error("git exited with code {code}: {stderr}")]
    Command { code: i32, stderr: String },

    #[error("could not parse git output: {0}")]
    Parse(String),
}

/// The current source revision's identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    /// Full revision id.
    pub id: String,

    /// Committer timestamp, normalized to UTC.
    pub committer_time: DateTime<Utc>,
}

/// Looks up the revision the build is running against.
#[async_trait]
pub trait CommitResolver: Send + Sync {
    async fn current_commit(&self) -> Result<CommitInfo, ScmError>;
}

/// Resolver shelling out to the git CLI in the working directory.
#[derive(Debug, Clone)]
pub struct GitCli {
    git_path: String,
}

impl GitCli {
    pub fn new() -> Self {
        Self {
            git_path: "git".to_string(),
        }
    }
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommitResolver for GitCli {
    async fn current_commit(&self) -> Result<CommitInfo, ScmError> {
        let output = Command::new(&self.git_path)
            .args(["show", "-s", "--format=%H%n%cI", "HEAD"])
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ScmError::Spawn(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ScmError::Command {
                code: output.status.code().unwrap_or(-1),
                stderr: stderr.trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut lines = stdout.lines();
        let id = lines
            .next()
            .filter(|line| !line.is_empty())
            .ok_or_else(|| ScmError::Parse("missing commit id line".to_string()))?
            .to_string();
        let timestamp = lines
            .next()
            .ok_or_else(|| ScmError::Parse("missing committer timestamp line".to_string()))?;
        let committer_time = DateTime::parse_from_rfc3339(timestamp.trim())
            .map_err(|e| ScmError::Parse(format!("bad committer timestamp: {}", e)))?
            .with_timezone(&Utc);

        debug!(commit = %id, "resolved current commit");
        Ok(CommitInfo { id, committer_time })
    }
}
