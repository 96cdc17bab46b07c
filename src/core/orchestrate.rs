//! Stage orchestration
//!
//! Lowers the stage-oriented pipeline definition into Buildkite's level of
//! abstraction: a flat list of steps with sync points. The output order and
//! barrier placement are part of the contract consumed by the execution
//! fabric, not cosmetic.

use crate::core::config::Pipeline;
use crate::core::context::{RunContext, StageContext};
use crate::core::lower::{lower_step, lower_steps, LowerError};
use crate::core::step::Step;
use serde::{Serialize, Serializer};
use serde_yaml::Value;
use tracing::debug;

/// Buildkite models sync points as a string containing literally "wait".
pub const WAIT: &str = "wait";

/// The branch whose builds are allowed to proceed past smoke testing.
pub const PRIMARY_BRANCH: &str = "master";

/// One entry in the lowered output: either the barrier sentinel or a fully
/// lowered step.
#[derive(Debug, Clone, PartialEq)]
pub enum BkStep {
    /// Blocks progression until all preceding steps complete.
    Wait,
    /// A lowered job step.
    Step(Step),
}

impl Serialize for BkStep {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            BkStep::Wait => serializer.serialize_str(WAIT),
            BkStep::Step(step) => step.serialize(serializer),
        }
    }
}

/// Render lowered steps as the output document Buildkite accepts.
pub fn marshal_steps(steps: &[BkStep]) -> Result<String, serde_yaml::Error> {
    #[derive(Serialize)]
    struct Document<'a> {
        steps: &'a [BkStep],
    }
    serde_yaml::to_string(&Document { steps })
}

impl Pipeline {
    /// Lower the whole pipeline for one run.
    ///
    /// Deterministic, single pass: identical inputs produce identical output,
    /// barriers included. Builds on non-primary branches stop after the
    /// smoke-test stage. Any lowering failure aborts the whole pass.
    pub fn lower(&self, run: &RunContext) -> Result<Vec<BkStep>, LowerError> {
        let mut out: Vec<BkStep> = Vec::with_capacity(20);

        if run.artifacts_from_build.is_none() && !self.smoke_test.is_empty() {
            let stage = StageContext {
                environment: run.build_environment.clone(),
                queue: "smoke_test",
                emoji: "interrobang",
                cautious: false,
                prevent_concurrency: false,
            };
            let lowered = lower_steps(&self.smoke_test, run, &stage)?;
            out.push(BkStep::Wait);
            out.extend(lowered.into_iter().map(BkStep::Step));
        }

        if run.branch_name != PRIMARY_BRANCH {
            debug!(branch = %run.branch_name, "not the primary branch, stopping after smoke test");
            return Ok(out);
        }

        if let Some(build_number) = &run.artifacts_from_build {
            // Synthesize a step that copies the artifact metadata keys from
            // the referenced build, so this deployment re-uses its artifacts
            // instead of rebuilding.
            let mut synth = Step::new();
            synth.set(
                "command",
                Value::String(format!("jobsworth-copy-artifact-meta \"{}\"", build_number)),
            );
            synth.set(
                "label",
                Value::String(format!("Artifacts from #{}", build_number)),
            );
            let stage = StageContext {
                environment: run.build_environment.clone(),
                queue: "plan_pipeline",
                emoji: "repeat",
                cautious: false,
                prevent_concurrency: false,
            };
            let lowered = lower_step(&synth, run, &stage)
                .map_err(|source| LowerError::Step { index: 0, source })?;
            out.push(BkStep::Wait);
            out.push(BkStep::Step(lowered));
        } else if !self.build.is_empty() {
            let stage = StageContext {
                environment: run.build_environment.clone(),
                queue: "build",
                emoji: "package",
                cautious: false,
                prevent_concurrency: false,
            };
            let lowered = lower_steps(&self.build, run, &stage)?;
            out.push(BkStep::Wait);
            out.extend(lowered.into_iter().map(BkStep::Step));
        }

        if !self.deploy.is_empty() {
            // An override directive replaces the configured environment
            // lists entirely, and the override target is always treated as
            // cautious.
            let (trivial_envs, cautious_envs) = match &run.override_deploy_environment {
                Some(env) => (Vec::new(), vec![env.clone()]),
                None => (
                    self.trivial_deploy_environments.clone(),
                    self.cautious_deploy_environments.clone(),
                ),
            };

            if !trivial_envs.is_empty() {
                out.push(BkStep::Wait);

                // Trivial deploys to different environments can run
                // concurrently.
                for env_name in &trivial_envs {
                    let stage = StageContext {
                        environment: env_name.clone(),
                        queue: "deploy",
                        emoji: "truck",
                        cautious: false,
                        prevent_concurrency: true,
                    };
                    let lowered = lower_steps(&self.deploy, run, &stage)?;
                    out.extend(lowered.into_iter().map(BkStep::Step));
                }

                if !self.validation_test.is_empty() {
                    out.push(BkStep::Wait);
                    for env_name in &trivial_envs {
                        let stage = StageContext {
                            environment: env_name.clone(),
                            queue: "validation_test",
                            emoji: "curly_loop",
                            cautious: false,
                            prevent_concurrency: true,
                        };
                        let lowered = lower_steps(&self.validation_test, run, &stage)?;
                        out.extend(lowered.into_iter().map(BkStep::Step));
                    }
                }
            }

            // Cautious deploys run strictly sequentially, so that they can
            // potentially add blocking steps whose order matters. Each
            // environment gets its own barrier before its deploy steps and
            // another before its validation steps.
            for env_name in &cautious_envs {
                let deploy_stage = StageContext {
                    environment: env_name.clone(),
                    queue: "deploy",
                    emoji: "truck",
                    cautious: true,
                    prevent_concurrency: true,
                };
                let validate_stage = StageContext {
                    environment: env_name.clone(),
                    queue: "validation_test",
                    emoji: "curly_loop",
                    cautious: false,
                    prevent_concurrency: true,
                };

                out.push(BkStep::Wait);
                let lowered = lower_steps(&self.deploy, run, &deploy_stage)?;
                out.extend(lowered.into_iter().map(BkStep::Step));

                if !self.validation_test.is_empty() {
                    out.push(BkStep::Wait);
                    let lowered = lower_steps(&self.validation_test, run, &validate_stage)?;
                    out.extend(lowered.into_iter().map(BkStep::Step));
                }
            }
        }

        debug!(steps = out.len(), "lowered pipeline");
        Ok(out)
    }
}
