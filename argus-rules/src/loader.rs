use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::RuleError;
use crate::expression::Expression;
use crate::rule::{Metadata, Rule};

/// Shape-level representation of one rule before expression compilation.
#[derive(Debug, Deserialize)]
struct RawRule {
    #[serde(default)]
    target: String,
    #[serde(default)]
    phase: String,
    #[serde(default)]
    subject: String,
    #[serde(default)]
    expression: Option<serde_json::Value>,
    #[serde(default)]
    metadata: Option<Metadata>,
}

/// Wrapped document form: `{"rules": [...]}`.
#[derive(Debug, Deserialize)]
struct RawRuleSet {
    #[serde(default)]
    rules: Vec<RawRule>,
}

/// Load and compile a rule catalog from a JSON file.
pub fn rules_from_path(path: impl AsRef<Path>) -> Result<Vec<Rule>, RuleError> {
    let path = path.as_ref();
    let payload = std::fs::read_to_string(path).map_err(|source| RuleError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let rules = rules_from_str(&payload)?;
    debug!(count = rules.len(), path = %path.display(), "rule catalog loaded");
    Ok(rules)
}

/// Load and compile a rule catalog from a JSON string.
///
/// The document is either a top-level array of rules or an object with a
/// `rules` array. The array form is tried first; if both forms fail, both
/// errors are reported. Expressions are compiled (regexes included) and
/// operands normalized here, so evaluation never re-parses.
pub fn rules_from_str(payload: &str) -> Result<Vec<Rule>, RuleError> {
    let raw = match serde_json::from_str::<Vec<RawRule>>(payload) {
        Ok(rules) => rules,
        Err(array_err) => match serde_json::from_str::<RawRuleSet>(payload) {
            Ok(wrapped) => wrapped.rules,
            Err(object_err) => {
                return Err(RuleError::Malformed {
                    array_err,
                    object_err,
                });
            }
        },
    };

    raw.into_iter()
        .enumerate()
        .map(|(index, rule)| compile(rule).map_err(|err| RuleError::in_rule(index, err)))
        .collect()
}

fn compile(raw: RawRule) -> Result<Rule, RuleError> {
    let expression = match &raw.expression {
        Some(value) => Expression::from_value(value)?,
        None => None,
    };

    Ok(Rule {
        target: raw.target,
        phase: raw.phase,
        subject: raw.subject,
        expression,
        metadata: raw.metadata,
    })
}
