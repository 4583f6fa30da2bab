use regex::Regex;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

/// A leaf string predicate used throughout the expression DSL.
///
/// The operator is one of `eq`, `contains`, `in`, or `regex`. For the first
/// three, the input is lower-cased and compared against operands that were
/// lower-cased at load time. `regex` matches the original-case input against
/// a pattern compiled at load time. Any other operator never matches.
#[derive(Debug, Clone, Serialize)]
pub struct Matcher {
    /// The operator tag, normalized to lower-case.
    pub op: String,
    /// Operand for `eq` and `contains`, lower-cased at load.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,
    /// Operands for `in`, trimmed and lower-cased at load.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
    /// Source pattern for `regex`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pattern: String,
    #[serde(skip)]
    compiled: Option<Regex>,
}

impl Matcher {
    /// Evaluate the matcher against an input string.
    pub fn matches(&self, input: &str) -> bool {
        let value = input.to_lowercase();
        match self.op.as_str() {
            "eq" => value == self.value,
            "contains" => value.contains(&self.value),
            "in" => self.values.iter().any(|item| &value == item),
            "regex" => self
                .compiled
                .as_ref()
                .is_some_and(|pattern| pattern.is_match(input)),
            _ => false,
        }
    }
}

/// Evaluate an optional matcher; absence means "no constraint".
pub(crate) fn matches_opt(matcher: Option<&Matcher>, input: &str) -> bool {
    matcher.is_none_or(|m| m.matches(input))
}

impl<'de> Deserialize<'de> for Matcher {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            #[serde(default)]
            op: String,
            #[serde(default)]
            value: String,
            #[serde(default)]
            values: Vec<String>,
            #[serde(default)]
            pattern: String,
        }

        let raw = Raw::deserialize(deserializer)?;
        let op = raw.op.trim().to_lowercase();

        let compiled = if op == "regex" {
            let regex = Regex::new(&raw.pattern).map_err(|err| {
                D::Error::custom(format!("compile regex pattern {:?}: {err}", raw.pattern))
            })?;
            Some(regex)
        } else {
            None
        };

        Ok(Self {
            op,
            value: raw.value.to_lowercase(),
            values: raw
                .values
                .iter()
                .map(|item| item.trim().to_lowercase())
                .collect(),
            pattern: raw.pattern,
            compiled,
        })
    }
}

/// Lower-cases and trims every element while deserializing a string list.
pub(crate) fn lower_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = Vec::<String>::deserialize(deserializer)?;
    Ok(items
        .iter()
        .map(|item| item.trim().to_lowercase())
        .collect())
}

/// Lower-cases and trims an optional string while deserializing.
pub(crate) fn lower_opt<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.map(|item| item.trim().to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(json: serde_json::Value) -> Matcher {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn eq_compares_lowercased() {
        let m = matcher(serde_json::json!({"op": "eq", "value": "CURL"}));
        assert!(m.matches("curl"));
        assert!(m.matches("Curl"));
        assert!(!m.matches("wget"));
    }

    #[test]
    fn contains_compares_lowercased() {
        let m = matcher(serde_json::json!({"op": "contains", "value": "Secret"}));
        assert!(m.matches("/run/SECRETS/aws"));
        assert!(!m.matches("/run/config"));
    }

    #[test]
    fn in_is_any_of_eq() {
        let m = matcher(serde_json::json!({"op": "in", "values": ["sh", "Bash"]}));
        for candidate in ["sh", "SH", "bash", "BASH"] {
            assert!(m.matches(candidate));
        }
        assert!(!m.matches("zsh"));

        // `in` over a list is equivalent to any(eq v) over the same list.
        for candidate in ["sh", "bash", "zsh"] {
            let any_eq = ["sh", "bash"].iter().any(|v| {
                matcher(serde_json::json!({"op": "eq", "value": v})).matches(candidate)
            });
            assert_eq!(m.matches(candidate), any_eq);
        }
    }

    #[test]
    fn regex_matches_original_case() {
        let m = matcher(serde_json::json!({"op": "regex", "pattern": "^[A-Z]+$"}));
        assert!(m.matches("TOKEN"));
        assert!(!m.matches("token"));
    }

    #[test]
    fn unknown_op_never_matches() {
        let m = matcher(serde_json::json!({"op": "startswith", "value": "x"}));
        assert!(!m.matches("x"));
        assert!(!m.matches(""));
    }

    #[test]
    fn op_is_normalized() {
        let m = matcher(serde_json::json!({"op": " EQ ", "value": "a"}));
        assert_eq!(m.op, "eq");
        assert!(m.matches("A"));
    }

    #[test]
    fn invalid_regex_is_a_load_error() {
        let err = serde_json::from_value::<Matcher>(
            serde_json::json!({"op": "regex", "pattern": "("}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("compile regex pattern"));
    }

    #[test]
    fn serialized_matcher_reloads_normalized() {
        let m = matcher(serde_json::json!({"op": "IN", "values": [" SH ", "Bash"]}));
        let json = serde_json::to_value(&m).unwrap();
        let back: Matcher = serde_json::from_value(json).unwrap();
        assert_eq!(back.op, "in");
        assert_eq!(back.values, vec!["sh", "bash"]);
    }
}
