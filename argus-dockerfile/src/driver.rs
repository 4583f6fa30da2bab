use argus_engine::{Driver, Step};

use crate::command::{DockerCommand, instruction_span, location, raw_text};
use crate::error::RecipeError;
use crate::recipe::{Recipe, TARGET_DOCKERFILE};
use crate::stage::{AbsString, StageModel, StageState, Tracked, looks_like_build_tooling};

/// Streams one step per parsed instruction, finalizes the stage model when
/// the stream is exhausted, then emits exactly one terminal `eof` step.
pub struct RecipeDriver<'a> {
    recipe: &'a Recipe,
    index: usize,
    model: StageModel,
    finalized: bool,
    eof_sent: bool,
}

impl<'a> RecipeDriver<'a> {
    /// Create a driver over a parsed recipe with an empty stage model.
    pub fn new(recipe: &'a Recipe) -> Self {
        Self {
            recipe,
            index: 0,
            model: StageModel::default(),
            finalized: false,
            eof_sent: false,
        }
    }

    /// The stage model evaluated so far.
    pub fn model(&self) -> &StageModel {
        &self.model
    }
}

impl Driver for RecipeDriver<'_> {
    type Command = DockerCommand;
    type Domain = StageModel;
    type Error = RecipeError;

    fn target(&self) -> &str {
        TARGET_DOCKERFILE
    }

    fn next(&mut self) -> Result<Option<Step<DockerCommand>>, RecipeError> {
        let instructions = self.recipe.instructions();
        if self.index >= instructions.len() {
            if !self.finalized {
                self.model.finalize();
                self.finalized = true;
            }
            if !self.eof_sent {
                self.eof_sent = true;
                return Ok(Some(Step::eof(TARGET_DOCKERFILE)));
            }
            return Ok(None);
        }

        let instruction = &instructions[self.index];
        self.index += 1;

        let content = self.recipe.content();
        let span = instruction_span(instruction);
        let command = DockerCommand::from_instruction(instruction, content);
        Ok(Some(Step {
            target: TARGET_DOCKERFILE.to_owned(),
            subject: command.subject().to_owned(),
            raw: raw_text(content, span),
            location: location(content, span),
            command: Some(command),
        }))
    }

    fn transfer(&mut self, step: &Step<DockerCommand>) -> Result<(), RecipeError> {
        let Some(command) = &step.command else {
            return Ok(());
        };

        if let DockerCommand::Stage {
            index,
            name,
            base_image,
        } = command
        {
            self.model
                .start_stage(StageState::new(*index, name.clone(), base_image.clone()));
            return Ok(());
        }

        // Anything before the first stage header has no stage to land in.
        let Some(stage) = self.model.current_mut() else {
            return Ok(());
        };
        let location = step.location;

        match command {
            DockerCommand::User { user } => {
                stage.user = Some(Tracked::new(AbsString::literal(user.clone()), location));
                stage.has_user = true;
            }
            DockerCommand::Workdir { path } => {
                stage.workdir = Some(Tracked::new(AbsString::literal(path.clone()), location));
            }
            DockerCommand::Env { pairs } => {
                for (key, value) in pairs {
                    stage.env.insert(
                        key.clone(),
                        Tracked::new(AbsString::literal(value.clone()), location),
                    );
                }
            }
            DockerCommand::Arg { name, default } => {
                stage.args.insert(
                    name.clone(),
                    Tracked::new(
                        AbsString::literal(default.clone().unwrap_or_default()),
                        location,
                    ),
                );
            }
            DockerCommand::Shell { tokens } => {
                stage.shell = Some(Tracked::new(tokens.clone(), location));
            }
            DockerCommand::Entrypoint { tokens } => {
                stage.entrypoint = Some(Tracked::new(tokens.clone(), location));
            }
            DockerCommand::Cmd { tokens } => {
                stage.cmd = Some(Tracked::new(tokens.clone(), location));
            }
            DockerCommand::Copy { from } => {
                if from.as_ref().is_some_and(|src| !src.trim().is_empty()) {
                    stage.has_copy_from = true;
                }
            }
            DockerCommand::Healthcheck => {
                stage.has_healthcheck = true;
            }
            DockerCommand::Run { .. } => {
                if looks_like_build_tooling(&step.raw) {
                    stage.has_build_tooling = true;
                }
            }
            DockerCommand::Stage { .. }
            | DockerCommand::Add
            | DockerCommand::Expose
            | DockerCommand::Unknown => {}
        }

        Ok(())
    }

    fn domain(&self) -> &StageModel {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argus_engine::EOF_SUBJECT;

    fn drain(driver: &mut RecipeDriver<'_>) -> Vec<Step<DockerCommand>> {
        let mut steps = Vec::new();
        while let Some(step) = driver.next().unwrap() {
            driver.transfer(&step).unwrap();
            steps.push(step);
        }
        steps
    }

    #[test]
    fn emits_one_step_per_instruction_plus_eof() {
        let recipe = Recipe::parse("FROM alpine\nRUN true\nUSER 1000\n").unwrap();
        let mut driver = RecipeDriver::new(&recipe);
        let steps = drain(&mut driver);

        assert_eq!(steps.len(), 4);
        let subjects: Vec<&str> = steps.iter().map(|s| s.subject.as_str()).collect();
        assert_eq!(subjects, ["from", "run", "user", EOF_SUBJECT]);
        // The terminal step is emitted exactly once.
        assert!(driver.next().unwrap().is_none());
        assert!(driver.next().unwrap().is_none());
    }

    #[test]
    fn empty_recipe_yields_only_eof() {
        let recipe = Recipe::parse("# just a comment\n").unwrap();
        let mut driver = RecipeDriver::new(&recipe);
        let steps = drain(&mut driver);
        assert_eq!(steps.len(), 1);
        assert!(steps[0].is_eof());
        assert!(driver.model().stages().is_empty());
    }

    #[test]
    fn finalized_stage_count_equals_from_count() {
        let recipe =
            Recipe::parse("FROM golang AS build\nRUN go build .\nFROM alpine\nCMD [\"/app\"]\n")
                .unwrap();
        let mut driver = RecipeDriver::new(&recipe);
        drain(&mut driver);

        let stages = driver.model().stages();
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[0].name, "build");
        assert_eq!(stages[0].index, 0);
        assert!(stages[0].has_build_tooling);
        assert_eq!(stages[1].base_image, "alpine");
        assert_eq!(stages[1].index, 1);
    }

    #[test]
    fn tracked_values_record_locations() {
        let recipe = Recipe::parse("FROM alpine\nUSER 1000\nWORKDIR /srv\n").unwrap();
        let mut driver = RecipeDriver::new(&recipe);
        drain(&mut driver);

        let stage = &driver.model().stages()[0];
        assert!(stage.has_user);
        let user = stage.user.as_ref().unwrap();
        assert_eq!(user.value.known, "1000");
        assert_eq!(user.value.kind, "literal");
        assert_eq!(user.location.start.line, 2);
        assert_eq!(stage.workdir.as_ref().unwrap().value.known, "/srv");
    }

    #[test]
    fn env_and_arg_upsert_with_absent_arg_default_empty() {
        let recipe = Recipe::parse(
            "FROM alpine\nENV A=1 B=2\nENV A=3\nARG VERSION\nARG VERSION=9\nARG OTHER\n",
        )
        .unwrap();
        let mut driver = RecipeDriver::new(&recipe);
        drain(&mut driver);

        let stage = &driver.model().stages()[0];
        assert_eq!(stage.env["A"].value.known, "3");
        assert_eq!(stage.env["B"].value.known, "2");
        assert_eq!(stage.args["VERSION"].value.known, "9");
        assert_eq!(stage.args["OTHER"].value.known, "");
    }

    #[test]
    fn copy_from_and_healthcheck_set_flags() {
        let recipe = Recipe::parse(
            "FROM alpine\nCOPY a b\nCOPY --from=builder /out /app\nHEALTHCHECK CMD true\n",
        )
        .unwrap();
        let mut driver = RecipeDriver::new(&recipe);
        drain(&mut driver);

        let stage = &driver.model().stages()[0];
        assert!(stage.has_copy_from);
        assert!(stage.has_healthcheck);
    }

    #[test]
    fn instructions_before_first_stage_are_ignored() {
        let recipe = Recipe::parse("ARG VERSION=1\nFROM alpine\n").unwrap();
        let mut driver = RecipeDriver::new(&recipe);
        drain(&mut driver);

        let stages = driver.model().stages();
        assert_eq!(stages.len(), 1);
        assert!(stages[0].args.is_empty());
    }

    #[test]
    fn flags_are_monotonic_across_the_fold() {
        let recipe = Recipe::parse(
            "FROM alpine\nUSER 1000\nUSER root\nRUN apk add build-base\nRUN apk add curl\n",
        )
        .unwrap();
        let mut driver = RecipeDriver::new(&recipe);
        drain(&mut driver);

        let stage = &driver.model().stages()[0];
        assert!(stage.has_user);
        assert!(stage.has_build_tooling);
        assert_eq!(stage.user.as_ref().unwrap().value.known, "root");
    }
}
