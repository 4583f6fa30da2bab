use std::collections::BTreeMap;

use argus_engine::SourceRef;

/// A value plus the source range where it was last set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tracked<T> {
    /// The tracked value.
    pub value: T,
    /// Where the value was last assigned.
    pub location: SourceRef,
}

impl<T> Tracked<T> {
    /// Track a value at a location.
    pub fn new(value: T, location: SourceRef) -> Self {
        Self { value, location }
    }
}

/// An abstract string value in the stage model.
///
/// Only literal values are evaluated here: `kind` is `"literal"` and
/// `known` holds the text. `expr` and `deps` exist for expression-valued
/// strings (e.g. values referencing build args) and stay empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AbsString {
    /// The value kind tag.
    pub kind: String,
    /// The known literal text.
    pub known: String,
    /// Unevaluated expression text.
    pub expr: String,
    /// Names the expression depends on.
    pub deps: Vec<String>,
}

impl AbsString {
    /// A literal string value.
    pub fn literal(known: impl Into<String>) -> Self {
        Self {
            kind: "literal".to_owned(),
            known: known.into(),
            ..Self::default()
        }
    }
}

/// The evaluated state of one build stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageState {
    /// 0-based stage index in emission order.
    pub index: usize,
    /// Stage alias, empty when unnamed.
    pub name: String,
    /// The base image reference.
    pub base_image: String,
    /// Last `USER`, if any.
    pub user: Option<Tracked<AbsString>>,
    /// Last `WORKDIR`, if any.
    pub workdir: Option<Tracked<AbsString>>,
    /// Last `SHELL`, if any.
    pub shell: Option<Tracked<Vec<String>>>,
    /// Last `ENTRYPOINT`, if any.
    pub entrypoint: Option<Tracked<Vec<String>>>,
    /// Last `CMD`, if any.
    pub cmd: Option<Tracked<Vec<String>>>,
    /// Environment variables, last assignment wins.
    pub env: BTreeMap<String, Tracked<AbsString>>,
    /// Build arguments, last assignment wins.
    pub args: BTreeMap<String, Tracked<AbsString>>,
    /// The stage contains a `USER` instruction.
    pub has_user: bool,
    /// The stage copies from another stage (`COPY --from=...`).
    pub has_copy_from: bool,
    /// The stage declares a `HEALTHCHECK`.
    pub has_healthcheck: bool,
    /// A `RUN` in the stage looks like it installs or invokes build tooling.
    pub has_build_tooling: bool,
}

impl StageState {
    /// Open a new stage.
    pub fn new(index: usize, name: impl Into<String>, base_image: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
            base_image: base_image.into(),
            ..Self::default()
        }
    }
}

/// The evaluated model of a whole recipe: finalized stages in emission
/// order plus at most one currently-building stage during the fold.
#[derive(Debug, Clone, Default)]
pub struct StageModel {
    stages: Vec<StageState>,
    current: Option<StageState>,
}

impl StageModel {
    /// Finalize any open stage and open a new one.
    pub fn start_stage(&mut self, stage: StageState) {
        if let Some(previous) = self.current.take() {
            self.stages.push(previous);
        }
        self.current = Some(stage);
    }

    /// Finalize the open stage, if any. Called when the instruction stream
    /// is exhausted, before the `eof` step is emitted.
    pub fn finalize(&mut self) {
        if let Some(stage) = self.current.take() {
            self.stages.push(stage);
        }
    }

    /// The currently-building stage.
    pub fn current_mut(&mut self) -> Option<&mut StageState> {
        self.current.as_mut()
    }

    /// The finalized stages, in emission order.
    pub fn stages(&self) -> &[StageState] {
        &self.stages
    }

    /// The final stage of the recipe (meaningful after finalization).
    pub fn final_stage(&self) -> Option<&StageState> {
        self.stages.last()
    }

    /// Whether the recipe has two or more stages.
    pub fn is_multi_stage(&self) -> bool {
        self.stages.len() >= 2
    }
}

/// Substrings of `RUN` text that indicate compilers or build tooling being
/// installed or invoked in the stage.
const BUILD_TOOLING_HINTS: &[&str] = &[
    "apk add build-base",
    "build-essential",
    "apt-get install gcc",
    "apt-get install g++",
    " apt install gcc",
    " apt install g++",
    " make ",
    "go build",
    "gradle build",
    "mvn package",
    "cargo build",
];

/// Case-insensitive scan of `RUN` text for build-tooling hints.
pub(crate) fn looks_like_build_tooling(raw: &str) -> bool {
    let lowered = raw.to_lowercase();
    BUILD_TOOLING_HINTS.iter().any(|hint| lowered.contains(hint))
}
