use std::collections::BTreeMap;

/// Structured observations extracted from one `RUN` instruction.
///
/// Facts are recomputed per rule evaluation and are the sole input of the
/// [`ExprNode`](crate::ExprNode) DSL. All strings are lower-cased by the
/// extractor so matchers can rely on the documented case policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunFacts {
    /// Every command invocation found in the shell script, in source order.
    pub calls: Vec<CallFact>,
    /// One fact per pipe boundary, endpoints only.
    pub pipes: Vec<PipeFact>,
    /// Every distinct `--mount=` specification on the instruction.
    pub mounts: Vec<MountSpec>,
}

/// One command invocation: lower-cased name plus lower-cased arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallFact {
    /// The command name (first word), lower-cased.
    pub name: String,
    /// The remaining words, trimmed and lower-cased, empties dropped.
    pub args: Vec<String>,
}

impl CallFact {
    /// Convenience constructor used by extractors and tests.
    pub fn new(name: impl Into<String>, args: impl IntoIterator<Item = String>) -> Self {
        Self {
            name: name.into(),
            args: args.into_iter().collect(),
        }
    }
}

/// The endpoints of one shell pipeline boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipeFact {
    /// The first call on the producing side.
    pub first: CallFact,
    /// The last call on the consuming side.
    pub last: CallFact,
}

/// One parsed `--mount=<spec>` flag.
///
/// Well-known keys are promoted to dedicated fields; the full option map is
/// retained for `has`/`missing` checks. Keys and values are lower-cased.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountSpec {
    /// The `type` option (`cache`, `secret`, `bind`, ...), empty if absent.
    pub mount_type: String,
    /// The `target` option, empty if absent.
    pub target: String,
    /// The `id` option, empty if absent.
    pub id: String,
    /// The `sharing` option, empty if absent.
    pub sharing: String,
    /// The raw specification text after `--mount=`.
    pub raw: String,
    /// Every `key[=value]` pair of the specification.
    pub options: BTreeMap<String, String>,
}

impl MountSpec {
    /// Parse a raw `key=value,key=value` mount specification.
    pub fn parse(raw: &str) -> Self {
        let mut options = BTreeMap::new();
        for part in raw.split(',') {
            let item = part.trim();
            if item.is_empty() {
                continue;
            }
            let (key, value) = match item.split_once('=') {
                Some((key, value)) => (key, value),
                None => (item, ""),
            };
            options.insert(
                key.trim().to_lowercase(),
                value.trim().to_lowercase(),
            );
        }

        let get = |key: &str| options.get(key).cloned().unwrap_or_default();
        Self {
            mount_type: get("type"),
            target: get("target"),
            id: get("id"),
            sharing: get("sharing"),
            raw: raw.to_owned(),
            options,
        }
    }
}
