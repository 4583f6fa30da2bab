use std::sync::LazyLock;

use dockerfile_parser::{Instruction, ShellOrExecExpr, Span};
use regex::Regex;

use argus_engine::{Position, SourceRef};

/// The typed command handle carried by Dockerfile steps.
///
/// Each variant holds exactly the parsed data that transfer and rule
/// matching need; everything else stays behind the step's raw text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DockerCommand {
    /// A stage header (`FROM base [AS name]`).
    Stage {
        /// 0-based stage index in emission order.
        index: usize,
        /// Stage alias, empty when unnamed.
        name: String,
        /// The base image reference.
        base_image: String,
    },
    /// A `RUN` instruction; shell form keeps one element, exec form one per token.
    Run {
        /// The command line tokens.
        cmdline: Vec<String>,
    },
    /// `USER user[:group]`.
    User {
        /// The user (and optional group) spec.
        user: String,
    },
    /// `WORKDIR path`.
    Workdir {
        /// The working directory path.
        path: String,
    },
    /// `ENV k=v ...`.
    Env {
        /// Key/value pairs in source order.
        pairs: Vec<(String, String)>,
    },
    /// `ARG name[=default]`.
    Arg {
        /// The argument name.
        name: String,
        /// The default value, if declared.
        default: Option<String>,
    },
    /// `SHELL ["exe", ...]`.
    Shell {
        /// The shell command tokens.
        tokens: Vec<String>,
    },
    /// `ENTRYPOINT` in either form.
    Entrypoint {
        /// The command line tokens.
        tokens: Vec<String>,
    },
    /// `CMD` in either form.
    Cmd {
        /// The command line tokens.
        tokens: Vec<String>,
    },
    /// `COPY [--from=stage] src... dst`.
    Copy {
        /// The `--from` source stage, if present.
        from: Option<String>,
    },
    /// `ADD src... dst`.
    Add,
    /// `HEALTHCHECK ...`.
    Healthcheck,
    /// `EXPOSE port...`.
    Expose,
    /// Any instruction outside the analyzed set.
    Unknown,
}

impl DockerCommand {
    /// The normalized step subject for this command.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Stage { .. } => "from",
            Self::Run { .. } => "run",
            Self::User { .. } => "user",
            Self::Workdir { .. } => "workdir",
            Self::Env { .. } => "env",
            Self::Arg { .. } => "arg",
            Self::Shell { .. } => "shell",
            Self::Entrypoint { .. } => "entrypoint",
            Self::Cmd { .. } => "cmd",
            Self::Copy { .. } => "copy",
            Self::Add => "add",
            Self::Healthcheck => "healthcheck",
            Self::Expose => "expose",
            Self::Unknown => "unknown",
        }
    }

    /// Convert a parsed instruction into its typed command.
    pub(crate) fn from_instruction(instruction: &Instruction, content: &str) -> Self {
        match instruction {
            Instruction::From(from) => Self::Stage {
                index: from.index,
                name: from
                    .alias
                    .as_ref()
                    .map(|alias| alias.content.clone())
                    .unwrap_or_default(),
                base_image: from.image.content.clone(),
            },
            Instruction::Run(run) => Self::Run {
                cmdline: cmdline_of(&run.expr, content),
            },
            Instruction::Env(env) => Self::Env {
                pairs: env
                    .vars
                    .iter()
                    .map(|var| {
                        let value = flatten_continuations(slice(content, var.value.span));
                        (var.key.content.clone(), unquote(value.trim()).to_owned())
                    })
                    .collect(),
            },
            Instruction::Arg(arg) => Self::Arg {
                name: arg.name.content.clone(),
                default: arg
                    .value
                    .as_ref()
                    .map(|value| unquote(&value.content).to_owned()),
            },
            Instruction::Entrypoint(entrypoint) => Self::Entrypoint {
                tokens: cmdline_of(&entrypoint.expr, content),
            },
            Instruction::Cmd(cmd) => Self::Cmd {
                tokens: cmdline_of(&cmd.expr, content),
            },
            Instruction::Copy(copy) => Self::Copy {
                from: copy
                    .flags
                    .iter()
                    .find(|flag| flag.name.content.eq_ignore_ascii_case("from"))
                    .map(|flag| flag.value.content.clone()),
            },
            Instruction::Label(_) => Self::Unknown,
            Instruction::Misc(misc) => {
                let arguments =
                    flatten_continuations(slice(content, misc.arguments.span));
                let arguments = arguments.trim();
                match misc.instruction.content.to_lowercase().as_str() {
                    "user" => Self::User {
                        user: arguments.to_owned(),
                    },
                    "workdir" => Self::Workdir {
                        path: arguments.to_owned(),
                    },
                    "shell" => Self::Shell {
                        tokens: parse_string_array(arguments),
                    },
                    "add" => Self::Add,
                    "healthcheck" => Self::Healthcheck,
                    "expose" => Self::Expose,
                    _ => Self::Unknown,
                }
            }
        }
    }
}

fn cmdline_of(expr: &ShellOrExecExpr, content: &str) -> Vec<String> {
    match expr {
        ShellOrExecExpr::Shell(script) => {
            let text = flatten_continuations(slice(content, script.span));
            vec![text.trim().to_owned()]
        }
        ShellOrExecExpr::Exec(array) => array
            .elements
            .iter()
            .map(|element| element.content.clone())
            .collect(),
    }
}

/// Parse a JSON string array (`SHELL`/exec-form syntax), falling back to
/// whitespace splitting for malformed arrays.
fn parse_string_array(text: &str) -> Vec<String> {
    serde_json::from_str::<Vec<String>>(text)
        .unwrap_or_else(|_| text.split_whitespace().map(str::to_owned).collect())
}

/// The source span of any instruction variant.
pub(crate) fn instruction_span(instruction: &Instruction) -> Span {
    match instruction {
        Instruction::From(i) => i.span,
        Instruction::Arg(i) => i.span,
        Instruction::Label(i) => i.span,
        Instruction::Run(i) => i.span,
        Instruction::Entrypoint(i) => i.span,
        Instruction::Cmd(i) => i.span,
        Instruction::Copy(i) => i.span,
        Instruction::Env(i) => i.span,
        Instruction::Misc(i) => i.span,
    }
}

/// The original source text covered by a span.
pub(crate) fn slice(content: &str, span: Span) -> &str {
    content.get(span.start..span.end).unwrap_or("")
}

/// The trimmed original source text of an instruction.
pub(crate) fn raw_text(content: &str, span: Span) -> String {
    slice(content, span).trim().to_owned()
}

/// The 1-based line range covered by a span, character 0.
pub(crate) fn location(content: &str, span: Span) -> SourceRef {
    SourceRef {
        start: Position {
            line: line_at(content, span.start),
            character: 0,
        },
        end: Position {
            line: line_at(content, span.end),
            character: 0,
        },
    }
}

fn line_at(content: &str, offset: usize) -> u32 {
    let prefix = content.get(..offset).unwrap_or(content);
    prefix.bytes().filter(|b| *b == b'\n').count() as u32 + 1
}

static CONTINUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\\r?\n\s*").expect("continuation pattern compiles"));

/// Collapse backslash-newline continuations into single spaces.
pub(crate) fn flatten_continuations(text: &str) -> String {
    CONTINUATION.replace_all(text, " ").into_owned()
}

/// Strip one pair of matching single or double quotes.
pub(crate) fn unquote(text: &str) -> &str {
    let bytes = text.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && (first == b'"' || first == b'\'') {
            return &text[1..text.len() - 1];
        }
    }
    text
}
