//! Step domain model

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

/// A single step template from the pipeline definition.
///
/// Buildkite steps are schema-flexible: jobs may carry arbitrary keys and we
/// only recognize a handful of them (`command`, `name`/`label`, `agents`,
/// `env`, the `concurrency*` family, and the `wait` sentinel). Everything
/// else must pass through lowering untouched, so the representation is the
/// raw YAML mapping rather than a fixed struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Step(pub Mapping);

impl Step {
    /// Create an empty step.
    pub fn new() -> Self {
        Step(Mapping::new())
    }

    /// A step whose mapping carries a `wait` key is a pure synchronization
    /// marker, not a job.
    pub fn is_wait_marker(&self) -> bool {
        self.0.contains_key("wait")
    }

    /// Look up a top-level field.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Look up a top-level string field.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    /// True when the field exists and holds a non-null value.
    pub fn has_value(&self, name: &str) -> bool {
        self.0.get(name).is_some_and(|v| !v.is_null())
    }

    /// Set a top-level field, replacing any existing value.
    pub fn set(&mut self, name: &str, value: Value) {
        self.0.insert(Value::String(name.to_string()), value);
    }

    /// Borrow the sub-mapping under `name`, creating it if absent. A
    /// pre-existing mapping keeps its keys; any other kind of value is
    /// replaced with a fresh mapping.
    pub fn ensure_mapping(&mut self, name: &str) -> &mut Mapping {
        if !matches!(self.0.get(name), Some(Value::Mapping(_))) {
            self.0.insert(
                Value::String(name.to_string()),
                Value::Mapping(Mapping::new()),
            );
        }
        match self.0.get_mut(name) {
            Some(Value::Mapping(m)) => m,
            _ => unreachable!("field was just set to a mapping"),
        }
    }
}

impl Default for Step {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_from_yaml(yaml: &str) -> Step {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_wait_marker_detection() {
        let wait = step_from_yaml("wait: ~");
        assert!(wait.is_wait_marker());

        let job = step_from_yaml("command: make test");
        assert!(!job.is_wait_marker());
    }

    #[test]
    fn test_ensure_mapping_preserves_existing_keys() {
        let mut step = step_from_yaml("agents:\n  queue: custom\n");
        let agents = step.ensure_mapping("agents");
        agents.insert(
            Value::String("environment".to_string()),
            Value::String("prod".to_string()),
        );

        assert_eq!(step.get("agents").unwrap()["queue"], "custom");
        assert_eq!(step.get("agents").unwrap()["environment"], "prod");
    }

    #[test]
    fn test_ensure_mapping_replaces_non_mapping() {
        let mut step = step_from_yaml("env: \"not a mapping\"");
        let env = step.ensure_mapping("env");
        assert!(env.is_empty());
    }

    #[test]
    fn test_has_value_ignores_null() {
        let step = step_from_yaml("command: ~\nname: deploy");
        assert!(!step.has_value("command"));
        assert!(step.has_value("name"));
        assert!(!step.has_value("missing"));
    }
}
