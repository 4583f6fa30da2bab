use serde::{Deserialize, Serialize};

/// A position in the recipe source. Lines are 1-based; the character column
/// is 0 for whole-instruction locations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// 1-based source line.
    pub line: u32,
    /// 0-based column.
    pub character: u32,
}

/// A source range covering one instruction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    /// Start of the range.
    pub start: Position,
    /// End of the range (inclusive line).
    pub end: Position,
}

impl SourceRef {
    /// A range spanning whole lines, character 0.
    pub fn lines(start: u32, end: u32) -> Self {
        Self {
            start: Position { line: start, character: 0 },
            end: Position { line: end, character: 0 },
        }
    }
}

impl std::fmt::Display for SourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.start.line == self.end.line {
            write!(f, "L{}", self.start.line)
        } else {
            write!(f, "L{}-L{}", self.start.line, self.end.line)
        }
    }
}

/// The subject tag of the terminal step.
pub const EOF_SUBJECT: &str = "eof";

/// One event in the engine's stream: one per parsed instruction, plus a
/// single terminal `eof` step. `C` is the driver's typed command handle,
/// used for structured inspection; the `eof` step carries none.
#[derive(Debug, Clone)]
pub struct Step<C> {
    /// Recipe dialect tag of the producing driver.
    pub target: String,
    /// Normalized lower-case instruction name, or `eof`.
    pub subject: String,
    /// Original source text of the instruction, trimmed.
    pub raw: String,
    /// Source range of the instruction.
    pub location: SourceRef,
    /// Typed handle to the parsed instruction.
    pub command: Option<C>,
}

impl<C> Step<C> {
    /// The terminal step for a target.
    pub fn eof(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            subject: EOF_SUBJECT.to_owned(),
            raw: String::new(),
            location: SourceRef::default(),
            command: None,
        }
    }

    /// Whether this is the terminal step.
    pub fn is_eof(&self) -> bool {
        self.subject == EOF_SUBJECT
    }
}

/// The two evaluation passes around a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Before the step is folded into the domain state.
    Pre,
    /// After the step is folded into the domain state.
    Post,
}

impl Phase {
    /// The phase tag as it appears in rule documents.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pre => "pre",
            Self::Post => "post",
        }
    }
}

/// Case- and whitespace-insensitive tag equality, used for targets,
/// subjects, and phases.
pub fn tags_equal(left: &str, right: &str) -> bool {
    left.trim().eq_ignore_ascii_case(right.trim())
}

/// Whether a rule's phase tag selects it for the given pass.
///
/// An empty tag means `post`; any other non-matching value excludes the
/// rule from the pass.
pub(crate) fn phase_matches(rule_phase: &str, phase: Phase) -> bool {
    if tags_equal(rule_phase, phase.as_str()) {
        return true;
    }
    rule_phase.trim().is_empty() && phase == Phase::Post
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eof_step_has_empty_raw() {
        let step: Step<()> = Step::eof("dockerfile");
        assert!(step.is_eof());
        assert_eq!(step.raw, "");
        assert!(step.command.is_none());
    }

    #[test]
    fn tags_compare_case_and_whitespace_insensitively() {
        assert!(tags_equal(" Dockerfile ", "dockerfile"));
        assert!(tags_equal("RUN", "run"));
        assert!(!tags_equal("run", "user"));
    }

    #[test]
    fn empty_phase_means_post() {
        assert!(phase_matches("", Phase::Post));
        assert!(phase_matches("  ", Phase::Post));
        assert!(!phase_matches("", Phase::Pre));
    }

    #[test]
    fn explicit_phase_matches_loosely() {
        assert!(phase_matches("PRE", Phase::Pre));
        assert!(phase_matches(" post ", Phase::Post));
        assert!(!phase_matches("pre", Phase::Post));
        assert!(!phase_matches("weird", Phase::Pre));
        assert!(!phase_matches("weird", Phase::Post));
    }

    #[test]
    fn source_ref_displays_line_range() {
        assert_eq!(SourceRef::lines(3, 3).to_string(), "L3");
        assert_eq!(SourceRef::lines(3, 5).to_string(), "L3-L5");
    }
}
