use regex::Regex;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::RuleError;
use crate::expr::ExprNode;

/// The polymorphic rule expression: a closed set of four variants selected
/// by the `expr_kind` (or legacy `kind`) tag in the rule document.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "expr_kind", rename_all = "snake_case")]
pub enum Expression {
    /// Pattern matching against instruction text (and env/arg pairs).
    Regex(RegexExpression),
    /// Numeric comparison against the UID of a `USER` instruction.
    UserIdCompare(UserIdCompareExpression),
    /// Aggregate constraint over the assembled stage model, fired at `eof`.
    DockerfileConstraint(ConstraintExpression),
    /// Nested match DSL over facts extracted from a `RUN` instruction.
    Dsl(DslExpression),
}

impl Expression {
    /// The kind tag of this expression.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Regex(_) => "regex",
            Self::UserIdCompare(_) => "user_id_compare",
            Self::DockerfileConstraint(_) => "dockerfile_constraint",
            Self::Dsl(_) => "dsl",
        }
    }

    /// Probe and decode an expression subtree.
    ///
    /// The kind is read from `expr_kind`, falling back to `kind`, and
    /// compared lower-cased. An empty kind yields `None` (an inert rule);
    /// an unknown kind is a load-time error. Regex patterns are compiled
    /// here so that catalog loading fails fast on invalid rules.
    pub fn from_value(value: &serde_json::Value) -> Result<Option<Self>, RuleError> {
        if value.is_null() {
            return Ok(None);
        }

        #[derive(Deserialize)]
        struct Probe {
            #[serde(default)]
            expr_kind: String,
            #[serde(default)]
            kind: String,
        }

        let probe: Probe = serde_json::from_value(value.clone())
            .map_err(|err| RuleError::Parse(format!("probe expression kind: {err}")))?;
        let kind = if probe.expr_kind.is_empty() {
            probe.kind
        } else {
            probe.expr_kind
        };

        match kind.to_lowercase().as_str() {
            "" => Ok(None),
            "regex" => RegexExpression::from_value(value).map(|expr| Some(Self::Regex(expr))),
            "user_id_compare" => decode(value).map(|expr| Some(Self::UserIdCompare(expr))),
            "dockerfile_constraint" => {
                decode(value).map(|expr| Some(Self::DockerfileConstraint(expr)))
            }
            "dsl" => decode(value).map(|expr| Some(Self::Dsl(expr))),
            other => Err(RuleError::UnknownExpressionKind(other.to_owned())),
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(value: &serde_json::Value) -> Result<T, RuleError> {
    serde_json::from_value(value.clone()).map_err(|err| RuleError::Parse(err.to_string()))
}

/// Whether a pattern list matches on any pattern or requires all of them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Any pattern matching is sufficient.
    #[default]
    Any,
    /// Every pattern must match, and there must be at least one.
    All,
}

impl<'de> Deserialize<'de> for MatchMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        // Legacy catalogs encode the mode as an integer enum (0 = any,
        // 1 = all); the symbolic spelling is also accepted.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(i64),
            Symbol(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Number(1) => Ok(Self::All),
            Repr::Number(_) => Ok(Self::Any),
            Repr::Symbol(s) if s.eq_ignore_ascii_case("all") => Ok(Self::All),
            Repr::Symbol(s) if s.eq_ignore_ascii_case("any") => Ok(Self::Any),
            Repr::Symbol(s) => Err(serde::de::Error::custom(format!(
                "invalid match mode {s:?}"
            ))),
        }
    }
}

/// A list of regular expressions matched against instruction text.
#[derive(Debug, Clone)]
pub struct RegexExpression {
    /// Combination mode for the pattern list.
    pub mode: MatchMode,
    /// The compiled patterns.
    pub patterns: Vec<Regex>,
}

impl RegexExpression {
    fn from_value(value: &serde_json::Value) -> Result<Self, RuleError> {
        #[derive(Deserialize)]
        struct Raw {
            #[serde(rename = "type", default)]
            mode: MatchMode,
            #[serde(default)]
            expressions: Vec<String>,
        }

        let raw: Raw = decode(value)?;
        let mut patterns = Vec::with_capacity(raw.expressions.len());
        for pattern in &raw.expressions {
            let compiled = Regex::new(pattern).map_err(|err| RuleError::InvalidRegex {
                pattern: pattern.clone(),
                source: Box::new(err),
            })?;
            patterns.push(compiled);
        }

        Ok(Self {
            mode: raw.mode,
            patterns,
        })
    }

    /// Match the pattern list against one input string.
    ///
    /// In `all` mode an empty pattern list never matches.
    pub fn matches(&self, input: &str) -> bool {
        match self.mode {
            MatchMode::Any => self.patterns.iter().any(|pattern| pattern.is_match(input)),
            MatchMode::All => {
                !self.patterns.is_empty()
                    && self.patterns.iter().all(|pattern| pattern.is_match(input))
            }
        }
    }
}

impl Serialize for RegexExpression {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Shadow<'a> {
            #[serde(rename = "type")]
            mode: MatchMode,
            expressions: Vec<&'a str>,
        }

        Shadow {
            mode: self.mode,
            expressions: self.patterns.iter().map(Regex::as_str).collect(),
        }
        .serialize(serializer)
    }
}

/// Compares the UID named by a `USER` instruction against a fixed value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserIdCompareExpression {
    /// One of `<`, `<=`, `>`, `>=`, `=`, `==`, `!=`; anything else never matches.
    #[serde(default)]
    pub operator: String,
    /// The right-hand side of the comparison.
    #[serde(default)]
    pub value: i64,
}

impl UserIdCompareExpression {
    /// Evaluate against the raw text of a `USER` instruction.
    pub fn matches_raw(&self, raw: &str) -> bool {
        match extract_user_id(raw) {
            Some(uid) => compare_int(uid, self.operator.trim(), self.value),
            None => false,
        }
    }
}

/// Extract the numeric UID from `USER` instruction text.
///
/// Strips a leading `USER ` keyword, keeps the principal before any `:`
/// group suffix, and treats `root` as UID 0. Named non-root users have no
/// known UID and yield `None`.
fn extract_user_id(raw: &str) -> Option<i64> {
    let mut clean = raw.trim();
    if let Some(prefix) = clean.get(..5)
        && prefix.eq_ignore_ascii_case("USER ")
    {
        clean = clean[5..].trim();
    }

    let principal = clean.split_whitespace().next()?.split(':').next()?;
    if principal.eq_ignore_ascii_case("root") {
        return Some(0);
    }
    principal.parse().ok()
}

fn compare_int(left: i64, op: &str, right: i64) -> bool {
    match op {
        ">" => left > right,
        ">=" => left >= right,
        "<" => left < right,
        "<=" => left <= right,
        "==" | "=" => left == right,
        "!=" => left != right,
        _ => false,
    }
}

/// A named whole-recipe predicate evaluated against the stage model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintExpression {
    /// The check tag. Unknown tags are silently false, never an error.
    #[serde(default)]
    pub check: String,
}

/// The nested match DSL over `RUN` facts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DslExpression {
    /// Fact selector; only `run.script` and `run.mounts` are live.
    #[serde(default)]
    pub select: String,
    /// The root of the match expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expr: Option<ExprNode>,
}

impl DslExpression {
    /// Whether the selector names a supported fact scope.
    pub fn selects_run_facts(&self) -> bool {
        matches!(
            self.select.trim().to_lowercase().as_str(),
            "run.script" | "run.mounts"
        )
    }
}
