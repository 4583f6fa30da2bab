//! Dockerfile support for the Argus recipe analyzer: the instruction
//! driver, the evaluated stage model, `RUN` fact extraction, and the rule
//! runner for the `dockerfile` target.

pub mod command;
pub mod driver;
pub mod error;
pub mod facts;
pub mod recipe;
pub mod runner;
pub mod stage;

pub use command::DockerCommand;
pub use driver::RecipeDriver;
pub use error::RecipeError;
pub use facts::build_run_facts;
pub use recipe::{Recipe, TARGET_DOCKERFILE};
pub use runner::RecipeRunner;
pub use stage::{AbsString, StageModel, StageState, Tracked};
