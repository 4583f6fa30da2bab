//! The driver/runner engine loop of the Argus recipe analyzer.
//!
//! A [`Driver`] streams [`Step`]s (one per parsed instruction plus a
//! terminal `eof`) and folds them into its domain state; a [`Runner`]
//! evaluates catalog rules against each step. The [`Engine`] wires the two
//! together with deterministic ordering guarantees.

pub mod engine;
pub mod finding;
pub mod step;

pub use engine::{Driver, Engine, RunError, Runner};
pub use finding::Finding;
pub use step::{EOF_SUBJECT, Phase, Position, SourceRef, Step, tags_equal};
