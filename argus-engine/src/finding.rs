use serde::{Deserialize, Serialize};

use argus_rules::Rule;

use crate::step::SourceRef;

/// A materialized rule violation.
///
/// Descriptive fields are copied from the rule's metadata when present;
/// `code_sample` and `location` come from the offending step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// Rule identifier.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Rule name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Severity label.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub severity: String,
    /// Confidence label.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub confidence: String,
    /// Violation description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// The offending instruction's source text.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub code_sample: String,
    /// Source range of the offending instruction.
    #[serde(default)]
    pub location: SourceRef,
}

impl Finding {
    /// Build a finding for a rule violation observed at a step.
    pub fn for_rule(rule: &Rule, raw: &str, location: SourceRef) -> Self {
        let mut finding = Self {
            code_sample: raw.to_owned(),
            location,
            ..Self::default()
        };
        if let Some(meta) = &rule.metadata {
            finding.id = meta.id.clone().unwrap_or_default();
            finding.name = meta.name.clone().unwrap_or_default();
            finding.severity = meta.severity.clone().unwrap_or_default();
            finding.confidence = meta.confidence.clone().unwrap_or_default();
            finding.description = meta.description.clone().unwrap_or_default();
        }
        finding
    }
}
