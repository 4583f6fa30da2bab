//! Rule catalog, matcher and expression DSL for the Argus recipe analyzer.
//!
//! Rules are loaded from JSON once, compiled (regexes included) and then
//! evaluated repeatedly against instruction steps and `RUN` facts without
//! further parsing.

pub mod error;
pub mod expr;
pub mod expression;
pub mod facts;
pub mod loader;
pub mod matcher;
pub mod rule;

pub use error::RuleError;
pub use expr::{CallArgs, EvalContext, ExprNode};
pub use expression::{
    ConstraintExpression, DslExpression, Expression, MatchMode, RegexExpression,
    UserIdCompareExpression,
};
pub use facts::{CallFact, MountSpec, PipeFact, RunFacts};
pub use loader::{rules_from_path, rules_from_str};
pub use matcher::Matcher;
pub use rule::{Metadata, Rule};
