use serde::{Deserialize, Serialize};

use crate::expression::Expression;

/// A single catalog rule.
///
/// `target` selects the recipe dialect the rule applies to, `phase` selects
/// the pre- or post-transfer pass (empty means post), and `subject` is
/// matched case-insensitively against the step subject. The expression is
/// absent for inert rules.
#[derive(Debug, Clone, Serialize)]
pub struct Rule {
    /// Recipe dialect tag, compared case- and whitespace-insensitively.
    pub target: String,
    /// Evaluation phase: `pre`, `post`, or empty (≡ `post`).
    #[serde(skip_serializing_if = "String::is_empty")]
    pub phase: String,
    /// Step subject this rule applies to.
    pub subject: String,
    /// The compiled expression, absent for inert rules.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<Expression>,
    /// Descriptive metadata copied into findings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

/// Descriptive rule metadata, used verbatim in findings and reports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Stable rule identifier (e.g. `ARG-001`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Short human-readable rule name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Longer description of the violation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Free-form rule category.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Severity label (`low`, `medium`, `high`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    /// Confidence label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<String>,
    /// Related CWE identifiers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cwes: Vec<String>,
    /// Related CVE identifiers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cves: Vec<String>,
    /// Suggested mitigation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mitigation: Option<String>,
    /// Reference link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Example of a compliant instruction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safe_example: Option<String>,
    /// Example of a violating instruction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unsafe_example: Option<String>,
}
