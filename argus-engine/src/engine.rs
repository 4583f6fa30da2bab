use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, trace};

use argus_rules::Rule;

use crate::finding::Finding;
use crate::step::{Phase, Step, phase_matches, tags_equal};

/// A lazy pull-based producer of steps for one recipe dialect.
///
/// The driver owns the domain state (the evaluated model of the recipe) and
/// folds each step into it on `transfer`. The engine is the sole consumer:
/// evaluation and mutation never interleave within a step.
pub trait Driver {
    /// The typed command handle carried by steps.
    type Command;
    /// The domain state runners evaluate aggregate rules against.
    type Domain;
    /// Error produced while streaming or folding steps.
    type Error: std::error::Error + Send + Sync + 'static;

    /// The recipe dialect tag this driver produces steps for.
    fn target(&self) -> &str;

    /// Produce the next step, or `None` when the stream is exhausted.
    ///
    /// Exactly one `eof` step is produced, after the last instruction.
    fn next(&mut self) -> Result<Option<Step<Self::Command>>, Self::Error>;

    /// Fold a step into the domain state.
    fn transfer(&mut self, step: &Step<Self::Command>) -> Result<(), Self::Error>;

    /// Read access to the domain state.
    fn domain(&self) -> &Self::Domain;
}

/// Evaluates one rule against one step for a recipe dialect.
pub trait Runner {
    /// The typed command handle carried by steps.
    type Command;
    /// The domain state for aggregate rules.
    type Domain;

    /// The recipe dialect tag this runner evaluates rules for.
    fn target(&self) -> &str;

    /// Evaluate a rule against a step, returning any findings produced.
    fn eval(
        &self,
        domain: &Self::Domain,
        rule: &Rule,
        step: &Step<Self::Command>,
    ) -> Vec<Finding>;
}

/// A run aborted by a driver error. Findings accumulated before the error
/// are preserved alongside it.
#[derive(Debug, Error)]
#[error("analysis aborted after {} findings: {source}", .findings.len())]
pub struct RunError<E: std::error::Error + 'static> {
    /// Findings collected before the abort.
    pub findings: Vec<Finding>,
    /// The driver error that ended the run.
    #[source]
    pub source: E,
}

/// The driver/runner loop.
///
/// Holds an immutable rule catalog and a runner per target. For every step
/// the engine runs a pre-transfer pass over the catalog, asks the driver to
/// fold the step into the domain state, then runs a post-transfer pass.
/// Within a pass, rules are visited in catalog order; findings append in
/// the order produced, so output is a pure function of catalog and recipe.
pub struct Engine<C, D> {
    rules: Vec<Rule>,
    runners: HashMap<String, Box<dyn Runner<Command = C, Domain = D>>>,
}

impl<C, D> Engine<C, D> {
    /// Create an engine over a rule catalog with no runners registered.
    pub fn new(rules: Vec<Rule>) -> Self {
        Self {
            rules,
            runners: HashMap::new(),
        }
    }

    /// Register a runner under its lower-cased target tag.
    #[must_use]
    pub fn with_runner(mut self, runner: Box<dyn Runner<Command = C, Domain = D>>) -> Self {
        self.runners
            .insert(runner.target().trim().to_lowercase(), runner);
        self
    }

    /// The rule catalog, in evaluation order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Stream every step out of the driver and evaluate the catalog.
    ///
    /// If no runner matches the driver's target, the result is empty and
    /// not an error. A driver error terminates the run; findings collected
    /// so far are returned inside the error.
    pub fn run<Dr>(&self, driver: &mut Dr) -> Result<Vec<Finding>, RunError<Dr::Error>>
    where
        Dr: Driver<Command = C, Domain = D>,
    {
        let Some(runner) = self.runners.get(&driver.target().trim().to_lowercase()) else {
            debug!(dialect = driver.target(), "no runner for target");
            return Ok(Vec::new());
        };

        let mut findings = Vec::new();
        loop {
            let step = match driver.next() {
                Ok(Some(step)) => step,
                Ok(None) => break,
                Err(source) => return Err(RunError { findings, source }),
            };
            trace!(subject = %step.subject, location = %step.location, "step");

            self.eval_phase(runner.as_ref(), driver.domain(), &step, Phase::Pre, &mut findings);
            if let Err(source) = driver.transfer(&step) {
                return Err(RunError { findings, source });
            }
            self.eval_phase(runner.as_ref(), driver.domain(), &step, Phase::Post, &mut findings);
        }

        debug!(count = findings.len(), "analysis complete");
        Ok(findings)
    }

    fn eval_phase(
        &self,
        runner: &dyn Runner<Command = C, Domain = D>,
        domain: &D,
        step: &Step<C>,
        phase: Phase,
        findings: &mut Vec<Finding>,
    ) {
        for rule in &self.rules {
            if !tags_equal(&rule.target, &step.target) {
                continue;
            }
            if !phase_matches(&rule.phase, phase) {
                continue;
            }
            findings.extend(runner.eval(domain, rule, step));
        }
    }
}
