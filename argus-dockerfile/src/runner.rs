use tracing::trace;

use argus_engine::{Finding, Runner, Step, tags_equal};
use argus_rules::{
    ConstraintExpression, DslExpression, EvalContext, Expression, RegexExpression, Rule,
};

use crate::command::DockerCommand;
use crate::facts::build_run_facts;
use crate::recipe::TARGET_DOCKERFILE;
use crate::stage::StageModel;

/// Evaluates catalog rules against Dockerfile steps.
///
/// Constraint expressions read only the finalized stage model and fire at
/// the terminal `eof` step; every other expression kind is gated on the
/// rule's subject and evaluated against the step itself.
pub struct RecipeRunner;

impl Runner for RecipeRunner {
    type Command = DockerCommand;
    type Domain = StageModel;

    fn target(&self) -> &str {
        TARGET_DOCKERFILE
    }

    fn eval(
        &self,
        model: &StageModel,
        rule: &Rule,
        step: &Step<DockerCommand>,
    ) -> Vec<Finding> {
        let Some(expression) = &rule.expression else {
            return Vec::new();
        };

        let matched = match expression {
            Expression::DockerfileConstraint(constraint) => {
                step.is_eof() && constraint_holds(model, constraint)
            }
            _ => tags_equal(&rule.subject, &step.subject) && matches_step(expression, step),
        };
        if !matched {
            return Vec::new();
        }

        trace!(subject = %step.subject, location = %step.location, "rule matched");
        vec![Finding::for_rule(rule, &step.raw, step.location)]
    }
}

fn matches_step(expression: &Expression, step: &Step<DockerCommand>) -> bool {
    match expression {
        Expression::Regex(regex) => regex_matches(regex, step),
        Expression::UserIdCompare(compare) => {
            tags_equal(&step.subject, "user") && compare.matches_raw(&step.raw)
        }
        Expression::Dsl(dsl) => dsl_matches(dsl, step),
        // Handled before subject gating.
        Expression::DockerfileConstraint(_) => false,
    }
}

/// On `env` and `arg` steps the patterns see each key, value and
/// `key=value` pair; everywhere (and as a fallback) they see the raw text.
fn regex_matches(regex: &RegexExpression, step: &Step<DockerCommand>) -> bool {
    match &step.command {
        Some(DockerCommand::Env { pairs }) => {
            pairs.iter().any(|(key, value)| {
                regex.matches(key)
                    || regex.matches(value)
                    || regex.matches(&format!("{key}={value}"))
            }) || regex.matches(&step.raw)
        }
        Some(DockerCommand::Arg { name, default }) => {
            regex.matches(name)
                || default.as_ref().is_some_and(|value| {
                    regex.matches(value) || regex.matches(&format!("{name}={value}"))
                })
                || regex.matches(&step.raw)
        }
        _ => regex.matches(&step.raw),
    }
}

fn dsl_matches(dsl: &DslExpression, step: &Step<DockerCommand>) -> bool {
    if !tags_equal(&step.subject, "run") {
        return false;
    }
    let Some(expr) = &dsl.expr else {
        return false;
    };
    if !dsl.selects_run_facts() {
        return false;
    }

    let facts = build_run_facts(step.command.as_ref(), &step.raw);
    expr.eval(EvalContext::new(&facts))
}

/// Evaluate one aggregate constraint against the finalized stage model.
/// Unknown tags and an empty model are silently false.
fn constraint_holds(model: &StageModel, constraint: &ConstraintExpression) -> bool {
    let Some(final_stage) = model.final_stage() else {
        return false;
    };

    match constraint.check.as_str() {
        "missing_user_final_stage" => !final_stage.has_user,
        "missing_healthcheck_final_stage" => !final_stage.has_healthcheck,
        "missing_copy_from_in_multistage" => {
            model.is_multi_stage() && !final_stage.has_copy_from
        }
        "single_stage_with_build_tools" => {
            model.stages().len() == 1 && final_stage.has_build_tooling
        }
        _ => false,
    }
}
