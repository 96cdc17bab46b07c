//! Run and stage contexts - the inputs that parameterize lowering

/// Per-invocation context for one lowering run.
///
/// Effectively immutable after construction: the directive fields
/// (`artifacts_from_build`, `override_deploy_environment`) are resolved from
/// the trigger message exactly once, before any lowering begins, and the
/// identity fields (`code_version`, `source_commit_id`) are filled in by the
/// driver before `Pipeline::lower` runs.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    /// Buildkite build counter for this pipeline.
    pub build_number: u64,

    /// Slug of the pipeline this build belongs to.
    pub pipeline_slug: String,

    /// Slug of the organization owning the pipeline.
    pub organization_slug: String,

    /// Branch the build was triggered for.
    pub branch_name: String,

    /// Free-form trigger message, scanned for directives.
    pub build_message: String,

    /// Clone URL of the repository being built.
    pub repo_url: String,

    /// Whether this build runs for a pull request.
    pub in_pull_request: bool,

    /// Environment name used for non-deploy stages (smoke test, build).
    pub build_environment: String,

    /// Derived build identity string.
    pub code_version: String,

    /// Full id of the source revision being built.
    pub source_commit_id: String,

    /// Build number whose artifacts should be reused instead of rebuilding.
    pub artifacts_from_build: Option<String>,

    /// Environment name replacing the configured deploy environment lists.
    pub override_deploy_environment: Option<String>,
}

impl RunContext {
    /// Infer a name for the codebase from the repository URL.
    ///
    /// Extracts the final slash-separated portion of the URL and removes a
    /// `.git` suffix if present. For example,
    /// `git@github.com:example/foo.git` yields `foo`.
    pub fn codebase_name(&self) -> String {
        let last_part = match self.repo_url.rfind('/') {
            Some(idx) => &self.repo_url[idx + 1..],
            None => &self.repo_url,
        };
        last_part.strip_suffix(".git").unwrap_or(last_part).to_string()
    }
}

/// Per-(stage, environment) expansion data.
///
/// Built fresh for every stage expansion; never shared across expansions.
#[derive(Debug, Clone)]
pub struct StageContext {
    /// Target environment name injected into agent tags and env vars.
    pub environment: String,

    /// Agent queue the lowered steps are routed to.
    pub queue: &'static str,

    /// Emoji name prefixed onto step display names.
    pub emoji: &'static str,

    /// Whether this expansion targets a cautious deploy environment.
    pub cautious: bool,

    /// Inject concurrency and concurrency_group so only one job per
    /// (environment, pipeline) pair runs at a time.
    pub prevent_concurrency: bool,
}

impl StageContext {
    /// The `"1"`/`"0"` form of the cautious flag used in env vars and the
    /// interpolation scope.
    pub fn cautious_str(&self) -> &'static str {
        if self.cautious {
            "1"
        } else {
            "0"
        }
    }
}
