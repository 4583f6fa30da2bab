use thiserror::Error;

/// Errors that can occur while loading or compiling a rule catalog.
#[derive(Debug, Error)]
pub enum RuleError {
    /// The rules file could not be read.
    #[error("cannot read rules file {path}: {source}")]
    Io {
        /// Path that failed to open or read.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The document parsed neither as a top-level array nor as a wrapped
    /// `{rules: [...]}` object. Both errors are reported.
    #[error("malformed rules document: as array: {array_err}; as object: {object_err}")]
    Malformed {
        /// Error from the top-level array attempt.
        array_err: serde_json::Error,
        /// Error from the wrapped-object attempt.
        object_err: serde_json::Error,
    },

    /// A rule expression carried a kind tag outside the closed set.
    #[error("unknown expression kind {0:?}")]
    UnknownExpressionKind(String),

    /// A rule-level regular expression failed to compile.
    #[error("compile regex {pattern:?}: {source}")]
    InvalidRegex {
        /// The pattern that failed to compile.
        pattern: String,
        /// The compiler error.
        #[source]
        source: Box<regex::Error>,
    },

    /// A general parse error while decoding a rule or expression subtree.
    #[error("parse error: {0}")]
    Parse(String),

    /// Wraps an error with the index of the offending rule in the catalog.
    #[error("rule {index}: {source}")]
    InRule {
        /// Zero-based index of the rule in the loaded document.
        index: usize,
        /// The underlying error.
        #[source]
        source: Box<RuleError>,
    },
}

impl RuleError {
    pub(crate) fn in_rule(index: usize, source: RuleError) -> Self {
        Self::InRule {
            index,
            source: Box::new(source),
        }
    }
}
