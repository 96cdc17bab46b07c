//! Expression interpolation over step trees
//!
//! Step fields may embed `${var}` markers anywhere in string values. The
//! language is intentionally flat: a marker holds a bare variable name
//! resolved against a fixed scope, nothing more. No arithmetic, no
//! conditionals, no nesting.

use crate::core::context::{RunContext, StageContext};
use crate::core::step::Step;
use serde_yaml::{Mapping, Value};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Error raised while expanding `${var}` markers in a step.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InterpolateError {
    #[error("unknown variable \"{variable}\" at {path}")]
    UnknownVariable { variable: String, path: String },

    #[error("unterminated ${{...}} expression at {path}")]
    Unterminated { path: String },
}

/// The flat variable scope a step is interpolated against.
///
/// Rebuilt per (RunContext, StageContext) pair and never mutated mid-walk.
#[derive(Debug, Clone)]
pub struct InterpolationScope {
    vars: HashMap<&'static str, String>,
}

impl InterpolationScope {
    pub fn new(run: &RunContext, stage: &StageContext) -> Self {
        let mut vars = HashMap::new();
        vars.insert("environment", stage.environment.clone());
        vars.insert("branch", run.branch_name.clone());
        vars.insert("codebase", run.codebase_name());
        vars.insert("code_version", run.code_version.clone());
        vars.insert("source_git_commit", run.source_commit_id.clone());
        vars.insert("cautious", stage.cautious_str().to_string());
        InterpolationScope { vars }
    }

    /// Exact-match, case-sensitive lookup.
    fn resolve(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }
}

/// One segment of the structural location of a field, used in error
/// messages so an unresolved variable can be traced back to its step field.
#[derive(Debug, Clone)]
enum PathSegment {
    Key(String),
    Index(usize),
}

struct FieldPath<'a>(&'a [PathSegment]);

impl fmt::Display for FieldPath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "(step root)");
        }
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Key(k) => {
                    if i > 0 {
                        write!(f, ".")?;
                    }
                    write!(f, "{}", k)?;
                }
                PathSegment::Index(n) => write!(f, "[{}]", n)?,
            }
        }
        Ok(())
    }
}

/// Expand every `${var}` marker in the step, in place.
///
/// Only string leaves are candidates; mapping keys and non-string scalars
/// pass through untouched. The first unresolved reference aborts the walk
/// with no partial result escaping to the caller (the step copy is discarded
/// by the lowerer on error).
pub fn interpolate_step(
    step: &mut Step,
    scope: &InterpolationScope,
) -> Result<(), InterpolateError> {
    let mut path = Vec::new();
    walk_mapping(&mut step.0, scope, &mut path)
}

fn walk_mapping(
    mapping: &mut Mapping,
    scope: &InterpolationScope,
    path: &mut Vec<PathSegment>,
) -> Result<(), InterpolateError> {
    for (key, value) in mapping.iter_mut() {
        let label = key
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| "(non-string key)".to_string());
        path.push(PathSegment::Key(label));
        walk_value(value, scope, path)?;
        path.pop();
    }
    Ok(())
}

fn walk_value(
    value: &mut Value,
    scope: &InterpolationScope,
    path: &mut Vec<PathSegment>,
) -> Result<(), InterpolateError> {
    match value {
        Value::String(s) => {
            if let Some(expanded) = expand(s, scope, path)? {
                *s = expanded;
            }
            Ok(())
        }
        Value::Sequence(seq) => {
            for (i, item) in seq.iter_mut().enumerate() {
                path.push(PathSegment::Index(i));
                walk_value(item, scope, path)?;
                path.pop();
            }
            Ok(())
        }
        Value::Mapping(m) => walk_mapping(m, scope, path),
        Value::Tagged(tagged) => walk_value(&mut tagged.value, scope, path),
        Value::Null | Value::Bool(_) | Value::Number(_) => Ok(()),
    }
}

/// Expand the markers in a single string leaf. Returns `None` when the
/// string holds no marker, preserving surrounding literal text otherwise.
fn expand(
    input: &str,
    scope: &InterpolationScope,
    path: &[PathSegment],
) -> Result<Option<String>, InterpolateError> {
    if !input.contains("${") {
        return Ok(None);
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find('}').ok_or_else(|| InterpolateError::Unterminated {
            path: FieldPath(path).to_string(),
        })?;
        let name = after[..end].trim();
        let value =
            scope
                .resolve(name)
                .ok_or_else(|| InterpolateError::UnknownVariable {
                    variable: name.to_string(),
                    path: FieldPath(path).to_string(),
                })?;
        out.push_str(value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(Some(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_scope() -> InterpolationScope {
        let run = RunContext {
            branch_name: "master".to_string(),
            repo_url: "git@github.com:example/widgets.git".to_string(),
            code_version: "2024-03-01-120000-abc1234-000042".to_string(),
            source_commit_id: "abc1234def".to_string(),
            ..RunContext::default()
        };
        let stage = StageContext {
            environment: "myenv".to_string(),
            queue: "deploy",
            emoji: "truck",
            cautious: false,
            prevent_concurrency: true,
        };
        InterpolationScope::new(&run, &stage)
    }

    fn step_from_yaml(yaml: &str) -> Step {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_bare_variable_substitution() {
        let mut step = step_from_yaml("command: \"${environment}\"");
        interpolate_step(&mut step, &test_scope()).unwrap();
        assert_eq!(step.get_str("command"), Some("myenv"));
    }

    #[test]
    fn test_surrounding_text_preserved() {
        let mut step =
            step_from_yaml("command: \"deploy.sh --env ${environment} --version ${code_version}\"");
        interpolate_step(&mut step, &test_scope()).unwrap();
        assert_eq!(
            step.get_str("command"),
            Some("deploy.sh --env myenv --version 2024-03-01-120000-abc1234-000042")
        );
    }

    #[test]
    fn test_nested_values_interpolated() {
        let yaml = r#"
command:
  - "echo ${branch}"
  - "echo ${cautious}"
env:
  TARGET: "${environment}"
"#;
        let mut step = step_from_yaml(yaml);
        interpolate_step(&mut step, &test_scope()).unwrap();

        let command = step.get("command").unwrap().as_sequence().unwrap();
        assert_eq!(command[0], "echo master");
        assert_eq!(command[1], "echo 0");
        assert_eq!(step.get("env").unwrap()["TARGET"], "myenv");
    }

    #[test]
    fn test_codebase_variable() {
        let mut step = step_from_yaml("command: \"build ${codebase}\"");
        interpolate_step(&mut step, &test_scope()).unwrap();
        assert_eq!(step.get_str("command"), Some("build widgets"));
    }

    #[test]
    fn test_unknown_variable_fails_with_name_and_path() {
        let mut step = step_from_yaml("env:\n  TARGET: \"${badvar}\"");
        let err = interpolate_step(&mut step, &test_scope()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("badvar"), "message was: {}", message);
        assert!(message.contains("env.TARGET"), "message was: {}", message);
    }

    #[test]
    fn test_unknown_variable_in_sequence_reports_index() {
        let mut step = step_from_yaml("command:\n  - \"ok\"\n  - \"${nope}\"");
        let err = interpolate_step(&mut step, &test_scope()).unwrap_err();
        assert!(err.to_string().contains("command[1]"));
    }

    #[test]
    fn test_unterminated_expression_fails() {
        let mut step = step_from_yaml("command: \"echo ${environment\"");
        let err = interpolate_step(&mut step, &test_scope()).unwrap_err();
        assert!(matches!(err, InterpolateError::Unterminated { .. }));
    }

    #[test]
    fn test_resolution_is_case_sensitive() {
        let mut step = step_from_yaml("command: \"${Environment}\"");
        let err = interpolate_step(&mut step, &test_scope()).unwrap_err();
        assert!(matches!(err, InterpolateError::UnknownVariable { .. }));
    }

    #[test]
    fn test_non_string_leaves_untouched() {
        let mut step = step_from_yaml("concurrency: 1\nretry: true\nnothing: ~");
        interpolate_step(&mut step, &test_scope()).unwrap();
        assert_eq!(step.get("concurrency").unwrap(), 1);
        assert_eq!(step.get("retry").unwrap(), &Value::Bool(true));
    }
}
