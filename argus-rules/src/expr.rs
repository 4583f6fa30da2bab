use serde::{Deserialize, Serialize};

use crate::facts::{CallFact, MountSpec, PipeFact, RunFacts};
use crate::matcher::{Matcher, lower_opt, lower_vec, matches_opt};

/// Argument constraints attached to a `call` node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallArgs {
    /// The group as a whole requires that some matcher hits some argument.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub any: Vec<Matcher>,
    /// Every matcher here must hit at least one argument individually.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub all: Vec<Matcher>,
}

/// A node of the recursive match DSL evaluated over [`RunFacts`].
///
/// The `op` tag selects the variant. Boolean operators short-circuit;
/// `exists` binds one fact at a time into the evaluation context; `call`,
/// `pipe` and `mount` match the bound fact when one is in scope and
/// otherwise quantify over the whole fact list.
///
/// `all` over an empty argument list is false: a degenerate rule that
/// constrains nothing must not fire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum ExprNode {
    /// Every child must hold, and there must be at least one child.
    All {
        /// The conjuncts.
        args: Vec<ExprNode>,
    },
    /// At least one child must hold.
    Any {
        /// The disjuncts.
        args: Vec<ExprNode>,
    },
    /// Negation.
    Not {
        /// The negated node.
        arg: Box<ExprNode>,
    },
    /// Existential quantification over calls, pipes, or mounts.
    Exists {
        /// The predicate; its operator selects the fact list to iterate.
        #[serde(rename = "where")]
        where_: Box<ExprNode>,
    },
    /// Match a command invocation.
    Call {
        /// Predicate on the call name.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<Matcher>,
        /// Predicates on the call arguments.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        args_match: Option<CallArgs>,
    },
    /// Match a pipeline by its endpoint calls.
    Pipe {
        /// Predicate for the first call of the pipeline.
        left: Box<ExprNode>,
        /// Predicate for the last call of the pipeline.
        right: Box<ExprNode>,
    },
    /// Match a `--mount` specification.
    Mount {
        /// Case-insensitive equality on the mount type.
        #[serde(
            rename = "type",
            default,
            deserialize_with = "lower_opt",
            skip_serializing_if = "Option::is_none"
        )]
        mount_type: Option<String>,
        /// Predicate on the mount target.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<Matcher>,
        /// Predicate on the mount id.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<Matcher>,
        /// Predicate on the sharing mode.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sharing: Option<Matcher>,
        /// Option keys that must be present.
        #[serde(default, deserialize_with = "lower_vec", skip_serializing_if = "Vec::is_empty")]
        has: Vec<String>,
        /// Option keys that must be absent.
        #[serde(default, deserialize_with = "lower_vec", skip_serializing_if = "Vec::is_empty")]
        missing: Vec<String>,
    },
}

/// Evaluation scope for one [`ExprNode`] pass.
///
/// Holds the full fact set plus the fact currently bound by an enclosing
/// `exists` quantifier, if any.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    facts: &'a RunFacts,
    call: Option<&'a CallFact>,
    pipe: Option<&'a PipeFact>,
    mount: Option<&'a MountSpec>,
}

impl<'a> EvalContext<'a> {
    /// Create a context over a fact set with nothing bound.
    pub fn new(facts: &'a RunFacts) -> Self {
        Self {
            facts,
            call: None,
            pipe: None,
            mount: None,
        }
    }

    fn with_call(self, call: &'a CallFact) -> Self {
        Self {
            call: Some(call),
            ..self
        }
    }

    fn with_pipe(self, pipe: &'a PipeFact) -> Self {
        Self {
            pipe: Some(pipe),
            ..self
        }
    }

    fn with_mount(self, mount: &'a MountSpec) -> Self {
        Self {
            mount: Some(mount),
            ..self
        }
    }
}

impl ExprNode {
    /// Recursively evaluate this node in the given context.
    pub fn eval(&self, ctx: EvalContext<'_>) -> bool {
        match self {
            Self::All { args } => !args.is_empty() && args.iter().all(|child| child.eval(ctx)),
            Self::Any { args } => args.iter().any(|child| child.eval(ctx)),
            Self::Not { arg } => !arg.eval(ctx),

            Self::Exists { where_ } => match where_.as_ref() {
                Self::Call { .. } => ctx
                    .facts
                    .calls
                    .iter()
                    .any(|call| where_.eval(ctx.with_call(call))),
                Self::Pipe { .. } => ctx
                    .facts
                    .pipes
                    .iter()
                    .any(|pipe| where_.eval(ctx.with_pipe(pipe))),
                Self::Mount { .. } => ctx
                    .facts
                    .mounts
                    .iter()
                    .any(|mount| where_.eval(ctx.with_mount(mount))),
                _ => where_.eval(ctx),
            },

            Self::Call { name, args_match } => match ctx.call {
                Some(call) => call_matches(name.as_ref(), args_match.as_ref(), call),
                None => ctx
                    .facts
                    .calls
                    .iter()
                    .any(|call| call_matches(name.as_ref(), args_match.as_ref(), call)),
            },

            Self::Pipe { left, right } => match ctx.pipe {
                Some(pipe) => {
                    left.eval(ctx.with_call(&pipe.first)) && right.eval(ctx.with_call(&pipe.last))
                }
                None => ctx.facts.pipes.iter().any(|pipe| {
                    left.eval(ctx.with_call(&pipe.first)) && right.eval(ctx.with_call(&pipe.last))
                }),
            },

            Self::Mount { .. } => match ctx.mount {
                Some(mount) => self.mount_matches(mount),
                None => ctx
                    .facts
                    .mounts
                    .iter()
                    .any(|mount| self.mount_matches(mount)),
            },
        }
    }

    fn mount_matches(&self, mount: &MountSpec) -> bool {
        let Self::Mount {
            mount_type,
            target,
            id,
            sharing,
            has,
            missing,
        } = self
        else {
            return false;
        };

        if let Some(kind) = mount_type
            && !kind.eq_ignore_ascii_case(&mount.mount_type)
        {
            return false;
        }
        matches_opt(target.as_ref(), &mount.target)
            && matches_opt(id.as_ref(), &mount.id)
            && matches_opt(sharing.as_ref(), &mount.sharing)
            && has.iter().all(|key| mount.options.contains_key(key))
            && missing.iter().all(|key| !mount.options.contains_key(key))
    }
}

fn call_matches(name: Option<&Matcher>, args_match: Option<&CallArgs>, call: &CallFact) -> bool {
    if !matches_opt(name, &call.name) {
        return false;
    }
    let Some(constraints) = args_match else {
        return true;
    };

    if !constraints.any.is_empty() {
        let hit = constraints
            .any
            .iter()
            .any(|matcher| call.args.iter().any(|arg| matcher.matches(arg)));
        if !hit {
            return false;
        }
    }

    constraints
        .all
        .iter()
        .all(|matcher| call.args.iter().any(|arg| matcher.matches(arg)))
}
