use std::path::Path;

use dockerfile_parser::{Dockerfile, Instruction};
use tracing::debug;

use argus_engine::{Engine, Finding, RunError};
use argus_rules::Rule;

use crate::command::DockerCommand;
use crate::driver::RecipeDriver;
use crate::error::RecipeError;
use crate::runner::RecipeRunner;
use crate::stage::StageModel;

/// The target tag of the Dockerfile dialect.
pub const TARGET_DOCKERFILE: &str = "dockerfile";

/// A parsed recipe, ready for validation.
#[derive(Debug)]
pub struct Recipe {
    dockerfile: Dockerfile,
}

impl Recipe {
    /// Parse recipe text.
    pub fn parse(content: &str) -> Result<Self, RecipeError> {
        let dockerfile = Dockerfile::parse(content)?;
        debug!(
            instructions = dockerfile.instructions.len(),
            "recipe parsed"
        );
        Ok(Self { dockerfile })
    }

    /// Read and parse a recipe file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RecipeError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| RecipeError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    /// The parsed instructions, in source order.
    pub fn instructions(&self) -> &[Instruction] {
        &self.dockerfile.instructions
    }

    /// The original source text.
    pub fn content(&self) -> &str {
        &self.dockerfile.content
    }

    /// Run the rule catalog over this recipe.
    ///
    /// Builds a fresh driver (and stage model) per call, so findings are a
    /// pure function of catalog and recipe, and a single catalog can serve
    /// concurrent validations of different recipes.
    pub fn validate(&self, rules: &[Rule]) -> Result<Vec<Finding>, RunError<RecipeError>> {
        let engine: Engine<DockerCommand, StageModel> =
            Engine::new(rules.to_vec()).with_runner(Box::new(RecipeRunner));
        let mut driver = RecipeDriver::new(self);
        engine.run(&mut driver)
    }
}
