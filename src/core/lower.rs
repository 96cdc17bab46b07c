//! Step lowering
//!
//! Lowering turns one step template into one environment/queue-specific step
//! ready for Buildkite: interpolated, tagged with agent targeting, loaded
//! with the standard env vars, display-name-prefixed, and (for deploys)
//! guarded against concurrent runs.

use crate::core::context::{RunContext, StageContext};
use crate::core::interpolate::{interpolate_step, InterpolateError, InterpolationScope};
use crate::core::step::Step;
use serde_yaml::Value;
use thiserror::Error;

/// Error raised while lowering a batch of steps. Any one failure aborts the
/// whole batch; no partial step list is ever returned.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LowerError {
    #[error("step {index}: {source}")]
    Step {
        index: usize,
        source: InterpolateError,
    },
}

/// Produce one fully independent lowered copy of `template`.
///
/// The template is never mutated; the returned step shares no sub-structure
/// with it or with any sibling variant.
pub fn lower_step(
    template: &Step,
    run: &RunContext,
    stage: &StageContext,
) -> Result<Step, InterpolateError> {
    let mut step = template.clone();

    let scope = InterpolationScope::new(run, stage);
    interpolate_step(&mut step, &scope)?;

    // Pure synchronization markers carry no job content. They pass through
    // with no agent tags, env vars, or display name attached.
    if step.is_wait_marker() {
        return Ok(step);
    }

    let agents = step.ensure_mapping("agents");
    agents.insert(
        Value::String("queue".to_string()),
        Value::String(stage.queue.to_string()),
    );
    agents.insert(
        Value::String("environment".to_string()),
        Value::String(stage.environment.clone()),
    );

    let codebase = run.codebase_name();
    let env = step.ensure_mapping("env");
    env.insert(
        Value::String("JOBSWORTH_CAUTIOUS".to_string()),
        Value::String(stage.cautious_str().to_string()),
    );
    env.insert(
        Value::String("JOBSWORTH_CODEBASE".to_string()),
        Value::String(codebase),
    );
    env.insert(
        Value::String("JOBSWORTH_CODE_VERSION".to_string()),
        Value::String(run.code_version.clone()),
    );
    env.insert(
        Value::String("JOBSWORTH_SOURCE_GIT_COMMIT_ID".to_string()),
        Value::String(run.source_commit_id.clone()),
    );
    env.insert(
        Value::String("JOBSWORTH_ENVIRONMENT".to_string()),
        Value::String(stage.environment.clone()),
    );

    rewrite_display_name(&mut step, stage.emoji);

    // Cap in-flight jobs to one per (environment, pipeline) pair, so two
    // deploys to the same target can never overlap. Steps that declare
    // their own concurrency settings keep them.
    if step.has_value("command")
        && stage.prevent_concurrency
        && !step.has_value("concurrency")
        && !step.has_value("concurrency_group")
    {
        step.set(
            "concurrency_group",
            Value::String(format!("{}/{}", stage.environment, run.pipeline_slug)),
        );
        step.set("concurrency", Value::from(1));
        if !step.has_value("concurrency_method") {
            step.set("concurrency_method", Value::String("eager".to_string()));
        }
    }

    Ok(step)
}

/// Lower every template in order; the first failure aborts with the step's
/// position for diagnostics.
pub fn lower_steps(
    steps: &[Step],
    run: &RunContext,
    stage: &StageContext,
) -> Result<Vec<Step>, LowerError> {
    steps
        .iter()
        .enumerate()
        .map(|(index, template)| {
            lower_step(template, run, stage)
                .map_err(|source| LowerError::Step { index, source })
        })
        .collect()
}

/// Prefix the display name with the stage's emoji marker, preserving any
/// existing text as a suffix. Steps that only carry a `label` keep their
/// text under that key; everything else uses `name`.
fn rewrite_display_name(step: &mut Step, emoji: &str) {
    let field = if step.get("name").is_none() && step.get("label").is_some() {
        "label"
    } else {
        "name"
    };
    let existing = step.get_str(field).unwrap_or("");
    let prefixed = format!(":{}: {}", emoji, existing).trim().to_string();
    step.set(field, Value::String(prefixed));
}
