use anyhow::{Context, Result, bail};
use clap::Parser;
use serde::Deserialize;
use tracing::Level;

/// Default path of the optional YAML configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "argus.yaml";

/// Default recipe path when neither file, environment, nor flag names one.
const DEFAULT_DOCKERFILE: &str = "Dockerfile";

/// Default rules catalog path.
const DEFAULT_RULES: &str = "dockerfile-rules.json";

/// Static analyzer for container build recipes.
#[derive(Debug, Parser)]
#[command(name = "argus", about = "Static analyzer for container build recipes")]
pub struct Cli {
    /// Path to the YAML configuration file. The default path is optional;
    /// an explicitly passed file must exist.
    #[arg(short, long)]
    pub config: Option<String>,

    /// Path to the recipe to analyze.
    #[arg(long, env = "DOCKERFILE_PATH")]
    pub dockerfile: Option<String>,

    /// Path to the JSON rules catalog.
    #[arg(long, env = "RULES_PATH")]
    pub rules: Option<String>,
}

/// YAML file shape. Every key is optional; missing keys fall through to
/// environment variables and built-in defaults.
#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    dockerfile: Option<String>,
    rules: Option<String>,
    #[serde(default)]
    logger: FileLogger,
}

#[derive(Debug, Default, Deserialize)]
struct FileLogger {
    level: Option<String>,
    stack: Option<String>,
}

/// Validated logger configuration.
#[derive(Debug, Clone, Copy)]
pub struct LoggerConfig {
    /// Maximum verbosity emitted by the subscriber.
    pub level: Level,
    /// Severity threshold at which error logs carry the full source chain.
    pub stack: Level,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            stack: Level::ERROR,
        }
    }
}

impl LoggerConfig {
    /// Whether events at `level` should include the error source chain.
    pub fn attaches_chain(&self, level: Level) -> bool {
        level <= self.stack
    }
}

/// Fully resolved application settings.
///
/// Precedence, lowest to highest: built-in defaults, the YAML file,
/// environment variables, command-line flags.
#[derive(Debug)]
pub struct Settings {
    /// Recipe path.
    pub dockerfile: String,
    /// Rules catalog path.
    pub rules: String,
    /// Logger configuration.
    pub logger: LoggerConfig,
}

impl Settings {
    /// Resolve settings from the parsed command line and process environment.
    pub fn load(cli: &Cli) -> Result<Self> {
        Self::resolve(cli, |key| std::env::var(key).ok())
    }

    fn resolve(cli: &Cli, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let file = match &cli.config {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("cannot read config file {path}"))?;
                parse_file(&content, path)?
            }
            None => match std::fs::read_to_string(DEFAULT_CONFIG_PATH) {
                Ok(content) => parse_file(&content, DEFAULT_CONFIG_PATH)?,
                Err(_) => FileSettings::default(),
            },
        };

        // clap already applied DOCKERFILE_PATH / RULES_PATH and flag
        // precedence; what remains is the file value and the default.
        let dockerfile = cli
            .dockerfile
            .clone()
            .or(file.dockerfile)
            .unwrap_or_else(|| DEFAULT_DOCKERFILE.to_owned());
        let rules = cli
            .rules
            .clone()
            .or(file.rules)
            .unwrap_or_else(|| DEFAULT_RULES.to_owned());

        let defaults = LoggerConfig::default();
        let level = resolve_level(
            env("DEVP_LOG_LEVEL").or(file.logger.level),
            "logger level",
            defaults.level,
        )?;
        let stack = resolve_level(
            env("DEVP_LOG_STACK").or(file.logger.stack),
            "logger stack level",
            defaults.stack,
        )?;

        Ok(Self {
            dockerfile,
            rules,
            logger: LoggerConfig { level, stack },
        })
    }
}

fn parse_file(content: &str, path: &str) -> Result<FileSettings> {
    serde_yaml_ng::from_str(content).with_context(|| format!("cannot parse config file {path}"))
}

/// Parse a configured log level. An unparsable level is a fatal
/// configuration error rather than a silent fallback.
fn resolve_level(value: Option<String>, what: &str, default: Level) -> Result<Level> {
    let Some(text) = value else {
        return Ok(default);
    };
    let trimmed = text.trim();
    if trimmed.is_empty() {
        bail!("logic error: {what} is empty");
    }
    match trimmed.parse() {
        Ok(level) => Ok(level),
        Err(_) => bail!("logic error: invalid {what} {trimmed:?}"),
    }
}
