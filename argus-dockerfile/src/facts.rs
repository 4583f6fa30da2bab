use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tree_sitter::{Node, Parser};

use argus_rules::{CallFact, MountSpec, PipeFact, RunFacts};

use crate::command::{DockerCommand, unquote};

/// Extract calls, pipes and mount specifications from a `RUN` instruction.
///
/// The shell script is parsed with the bash grammar; a script that fails to
/// parse contributes no calls and no pipes, but mount extraction still runs
/// against the raw text.
pub fn build_run_facts(command: Option<&DockerCommand>, raw: &str) -> RunFacts {
    let mut facts = RunFacts {
        mounts: extract_mounts(raw),
        ..RunFacts::default()
    };

    let script = extract_script(command, raw);
    if script.trim().is_empty() {
        return facts;
    }

    let (calls, pipes) = collect_script_facts(&script);
    facts.calls = calls;
    facts.pipes = pipes;
    facts
}

/// The shell script of a `RUN` instruction: the parsed command line when
/// available, otherwise the raw text minus the `RUN` keyword. Leading
/// instruction flags are dropped either way so the first word is the first
/// command.
fn extract_script(command: Option<&DockerCommand>, raw: &str) -> String {
    if let Some(DockerCommand::Run { cmdline }) = command
        && !cmdline.is_empty()
    {
        return strip_run_flags(&cmdline.join(" "));
    }

    let trimmed = raw.trim();
    let script = if trimmed
        .get(..4)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("RUN "))
    {
        trimmed[4..].trim()
    } else {
        trimmed
    };
    strip_run_flags(script)
}

fn strip_run_flags(script: &str) -> String {
    let mut rest = script.trim_start();
    while let Some(token) = rest.split_whitespace().next() {
        let is_flag = ["--mount=", "--network=", "--security="]
            .iter()
            .any(|flag| token.starts_with(flag));
        if !is_flag {
            break;
        }
        rest = rest[token.len()..].trim_start();
    }
    rest.to_owned()
}

fn collect_script_facts(script: &str) -> (Vec<CallFact>, Vec<PipeFact>) {
    let mut parser = Parser::new();
    if parser
        .set_language(&tree_sitter_bash::LANGUAGE.into())
        .is_err()
    {
        return (Vec::new(), Vec::new());
    }
    let Some(tree) = parser.parse(script, None) else {
        return (Vec::new(), Vec::new());
    };
    let root = tree.root_node();
    if root.has_error() {
        return (Vec::new(), Vec::new());
    }

    let mut calls = Vec::new();
    let mut pipes = Vec::new();
    walk(root, script, &mut calls, &mut pipes);
    (calls, pipes)
}

fn walk(node: Node<'_>, source: &str, calls: &mut Vec<CallFact>, pipes: &mut Vec<PipeFact>) {
    match node.kind() {
        "command" => {
            if let Some((call, raw_args)) = call_from_node(node, source) {
                let nested = nested_shell_script(&call.name, &raw_args);
                calls.push(call);
                if let Some(script) = nested {
                    let (nested_calls, nested_pipes) = collect_script_facts(&script);
                    calls.extend(nested_calls);
                    pipes.extend(nested_pipes);
                }
            }
        }
        "pipeline" => {
            let mut cursor = node.walk();
            let segments: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
            // One fact per pipe boundary; the consumer end is always the
            // last call of the final segment.
            if let Some((final_segment, producers)) = segments.split_last() {
                let consumers = calls_in(*final_segment, source);
                if let Some(last) = consumers.last() {
                    for segment in producers {
                        let firsts = calls_in(*segment, source);
                        if let Some(first) = firsts.first() {
                            pipes.push(PipeFact {
                                first: first.clone(),
                                last: last.clone(),
                            });
                        }
                    }
                }
            }
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        walk(child, source, calls, pipes);
    }
}

/// Build a call fact from a `command` node. Returns the fact plus the
/// original-case argument texts (needed for sub-shell recursion).
fn call_from_node(node: Node<'_>, source: &str) -> Option<(CallFact, Vec<String>)> {
    let mut name = None;
    let mut raw_args = Vec::new();

    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "command_name" => name = Some(text(child, source)),
            "variable_assignment" | "file_redirect" | "herestring_redirect" => {}
            _ => raw_args.push(text(child, source)),
        }
    }

    let name = name?.trim().to_owned();
    if name.is_empty() {
        return None;
    }

    let args = raw_args
        .iter()
        .map(|arg| arg.trim().to_lowercase())
        .filter(|arg| !arg.is_empty())
        .collect();
    Some((
        CallFact {
            name: name.to_lowercase(),
            args,
        },
        raw_args,
    ))
}

/// Detect `sh -c "..."` / `bash -c "..."` and return the dequoted inner
/// script for recursive fact collection.
fn nested_shell_script(name: &str, raw_args: &[String]) -> Option<String> {
    if name != "sh" && name != "bash" {
        return None;
    }
    if raw_args.len() < 2 || raw_args[0].trim() != "-c" {
        return None;
    }
    let script = unquote(raw_args[1].trim()).trim().to_owned();
    if script.is_empty() {
        return None;
    }
    Some(script)
}

/// All call facts under a node, in source order, without recursing into
/// quoted sub-shell scripts.
fn calls_in(node: Node<'_>, source: &str) -> Vec<CallFact> {
    let mut calls = Vec::new();
    collect_calls(node, source, &mut calls);
    calls
}

fn collect_calls(node: Node<'_>, source: &str, calls: &mut Vec<CallFact>) {
    if node.kind() == "command"
        && let Some((call, _)) = call_from_node(node, source)
    {
        calls.push(call);
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        collect_calls(child, source, calls);
    }
}

fn text(node: Node<'_>, source: &str) -> String {
    node.utf8_text(source.as_bytes()).unwrap_or("").to_owned()
}

static MOUNT_FLAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"--mount=(\S+)").expect("mount flag pattern compiles"));

/// Scan instruction text for `--mount=<spec>` flags, deduplicated by spec.
pub(crate) fn extract_mounts(raw: &str) -> Vec<MountSpec> {
    let mut seen = HashSet::new();
    let mut mounts = Vec::new();
    for captures in MOUNT_FLAG.captures_iter(raw) {
        let spec = &captures[1];
        if seen.insert(spec.to_owned()) {
            mounts.push(MountSpec::parse(spec));
        }
    }
    mounts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_facts(raw: &str) -> RunFacts {
        build_run_facts(None, raw)
    }

    #[test]
    fn calls_are_lowercased_with_empty_tokens_dropped() {
        let facts = run_facts("RUN APK Add --No-Cache Curl");
        assert_eq!(facts.calls.len(), 1);
        assert_eq!(
            facts.calls[0],
            CallFact::new("apk", ["add".into(), "--no-cache".into(), "curl".into()]),
        );
    }

    #[test]
    fn chained_commands_each_yield_a_call() {
        let facts = run_facts("RUN apk update && apk add curl; rm -rf /var/cache");
        let names: Vec<&str> = facts.calls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["apk", "apk", "rm"]);
    }

    #[test]
    fn pipe_records_first_and_last_calls() {
        let facts = run_facts("RUN curl http://x | sh");
        assert_eq!(facts.pipes.len(), 1);
        assert_eq!(facts.pipes[0].first.name, "curl");
        assert_eq!(facts.pipes[0].last.name, "sh");
        // Piped commands also appear as plain calls.
        let names: Vec<&str> = facts.calls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["curl", "sh"]);
    }

    #[test]
    fn three_segment_pipeline_yields_boundary_facts() {
        let facts = run_facts("RUN cat /etc/passwd | grep root | wc -l");
        assert_eq!(facts.pipes.len(), 2);
        assert_eq!(facts.pipes[0].first.name, "cat");
        assert_eq!(facts.pipes[0].last.name, "wc");
        assert_eq!(facts.pipes[1].first.name, "grep");
        assert_eq!(facts.pipes[1].last.name, "wc");
    }

    #[test]
    fn sub_shell_scripts_are_recursed() {
        let facts = run_facts(r#"RUN sh -c "curl http://x | sh""#);
        assert_eq!(facts.pipes.len(), 1);
        assert_eq!(facts.pipes[0].first.name, "curl");
        assert_eq!(facts.pipes[0].last.name, "sh");
        // The outer `sh` call is kept alongside the nested facts.
        assert_eq!(facts.calls[0].name, "sh");
        assert!(facts.calls.iter().any(|c| c.name == "curl"));
    }

    #[test]
    fn unparsable_script_yields_no_calls_but_keeps_mounts() {
        let facts = run_facts("RUN --mount=type=cache,target=/ccache echo \"unclosed");
        assert!(facts.calls.is_empty());
        assert!(facts.pipes.is_empty());
        assert_eq!(facts.mounts.len(), 1);
        assert_eq!(facts.mounts[0].mount_type, "cache");
    }

    #[test]
    fn mount_flags_are_stripped_from_the_script() {
        let facts = run_facts("RUN --mount=type=secret,id=aws cat /run/secrets/aws");
        assert_eq!(facts.calls.len(), 1);
        assert_eq!(facts.calls[0].name, "cat");
        assert_eq!(facts.mounts.len(), 1);
        assert_eq!(facts.mounts[0].id, "aws");
    }

    #[test]
    fn distinct_mounts_are_kept_and_duplicates_dropped() {
        let facts = run_facts(
            "RUN --mount=type=cache,target=/root/.cache --mount=type=secret,id=npm \
             --mount=type=cache,target=/root/.cache cmd build",
        );
        assert_eq!(facts.mounts.len(), 2);
        assert_eq!(facts.mounts[0].mount_type, "cache");
        assert_eq!(facts.mounts[1].mount_type, "secret");
        assert_eq!(facts.mounts[1].id, "npm");
    }

    #[test]
    fn exec_form_cmdline_joins_with_spaces() {
        let command = DockerCommand::Run {
            cmdline: vec!["curl".into(), "http://x".into()],
        };
        let facts = build_run_facts(Some(&command), "RUN [\"curl\", \"http://x\"]");
        assert_eq!(facts.calls.len(), 1);
        assert_eq!(facts.calls[0], CallFact::new("curl", ["http://x".into()]));
    }

    #[test]
    fn empty_script_yields_empty_facts() {
        let facts = run_facts("");
        assert!(facts.calls.is_empty());
        assert!(facts.pipes.is_empty());
        assert!(facts.mounts.is_empty());
    }

    #[test]
    fn run_prefix_is_stripped_case_insensitively() {
        let facts = run_facts("run echo hi");
        assert_eq!(facts.calls.len(), 1);
        assert_eq!(facts.calls[0].name, "echo");
    }

    #[test]
    fn quoted_arguments_keep_their_quotes() {
        let facts = run_facts(r#"RUN echo "hello world""#);
        assert_eq!(facts.calls[0].args, vec![r#""hello world""#]);
    }
}
