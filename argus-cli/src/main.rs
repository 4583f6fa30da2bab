//! The `argus` binary: load configuration, rules and a recipe, run the
//! analysis, and log one line per finding.

mod config;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

use argus_dockerfile::Recipe;
use argus_rules::rules_from_path;

use crate::config::{Cli, LoggerConfig, Settings};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match Settings::load(&cli) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("failed to load application settings: {err:#}");
            return ExitCode::FAILURE;
        }
    };

    init_logging(&settings.logger);
    info!(
        dockerfile = %settings.dockerfile,
        rules = %settings.rules,
        level = %settings.logger.level,
        "application config loaded"
    );

    match run(&settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            fatal(&settings.logger, &err);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(logger: &LoggerConfig) {
    let filter = EnvFilter::new(logger.level.to_string().to_lowercase());
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run(settings: &Settings) -> Result<()> {
    let rules = rules_from_path(&settings.rules)
        .with_context(|| format!("failed to load rules from {}", settings.rules))?;

    let recipe = Recipe::from_path(&settings.dockerfile)
        .with_context(|| format!("failed to load recipe {}", settings.dockerfile))?;

    let findings = recipe
        .validate(&rules)
        .context("failed to validate recipe")?;

    for finding in &findings {
        info!(
            "[{}][{}] {} | code={:?} | location={}",
            finding.severity, finding.id, finding.name, finding.code_sample, finding.location
        );
    }
    info!("total findings: {}", findings.len());
    Ok(())
}

/// Log a fatal error; the stack level decides whether the full source
/// chain is attached.
fn fatal(logger: &LoggerConfig, err: &anyhow::Error) {
    if logger.attaches_chain(Level::ERROR) {
        error!("{err:#}");
    } else {
        error!("{err}");
    }
}
