//! Trigger-message directives
//!
//! Certain micro-syntaxes at the start of the build message trigger special
//! behaviors, like rolling back to an earlier build's artifacts or deploying
//! an existing build to a single named environment.

use once_cell::sync::Lazy;
use regex::Regex;

static ROLLBACK_MESSAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[Rr]oll\s*back\s+(to\s+)?#?(\d+)").expect("rollback pattern is valid")
});

static ENV_OVERRIDE_MESSAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[Dd]eploy\s*(#?(\d+)\s*)?(to\s+)?(\S+)").expect("deploy pattern is valid")
});

/// A directive extracted from the build trigger message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerDirective {
    /// Reuse the artifacts of a previous build instead of rebuilding.
    Rollback { build_number: String },

    /// Deploy to a single named environment, optionally reusing a previous
    /// build's artifacts.
    DeployOverride {
        build_number: Option<String>,
        environment: String,
    },
}

/// Match the message against the directive patterns, first match wins.
/// A non-matching message is a valid "no directive" outcome, not an error.
pub fn parse_trigger_message(message: &str) -> Option<TriggerDirective> {
    if let Some(captures) = ROLLBACK_MESSAGE.captures(message) {
        return Some(TriggerDirective::Rollback {
            build_number: captures[2].to_string(),
        });
    }

    if let Some(captures) = ENV_OVERRIDE_MESSAGE.captures(message) {
        return Some(TriggerDirective::DeployOverride {
            build_number: captures.get(2).map(|m| m.as_str().to_string()),
            environment: captures[4].to_string(),
        });
    }

    None
}
