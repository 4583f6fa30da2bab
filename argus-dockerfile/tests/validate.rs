//! End-to-end validation scenarios.
//!
//! Each scenario drives a full validate run: parse a recipe, load a JSON
//! rule catalog, and check the findings that come out.

use argus_dockerfile::Recipe;
use argus_rules::rules_from_str;

// -- Rule fixtures --

const NON_ROOT_USER_RULE: &str = r#"[{
    "target": "dockerfile",
    "phase": "post",
    "subject": "user",
    "expression": {"kind": "user_id_compare", "operator": "<", "value": 1000},
    "metadata": {"id": "USR-001", "name": "low uid", "severity": "medium"}
}]"#;

const PIPE_TO_SHELL_RULE: &str = r#"[{
    "target": "dockerfile",
    "subject": "run",
    "expression": {
        "kind": "dsl",
        "select": "run.script",
        "expr": {
            "op": "exists",
            "where": {
                "op": "pipe",
                "left": {"op": "call", "name": {"op": "eq", "value": "curl"}},
                "right": {"op": "call", "name": {"op": "in", "values": ["sh", "bash"]}}
            }
        }
    },
    "metadata": {"id": "RUN-001", "name": "remote script piped to shell", "severity": "high"}
}]"#;

const SECRET_MOUNT_RULE: &str = r#"[{
    "target": "dockerfile",
    "subject": "run",
    "expression": {
        "kind": "dsl",
        "select": "run.mounts",
        "expr": {"op": "exists", "where": {"op": "mount", "type": "secret", "has": ["id"]}}
    },
    "metadata": {"id": "RUN-002", "severity": "low"}
}]"#;

const ENV_TOKEN_RULE: &str = r#"[{
    "target": "dockerfile",
    "subject": "env",
    "expression": {"kind": "regex", "expressions": ["(?i)token"]},
    "metadata": {"id": "ENV-001", "severity": "high"}
}]"#;

fn constraint_rule(check: &str) -> String {
    format!(
        r#"[{{
            "target": "dockerfile",
            "subject": "eof",
            "expression": {{"kind": "dockerfile_constraint", "check": "{check}"}},
            "metadata": {{"id": "DF-{check}"}}
        }}]"#
    )
}

fn findings(recipe: &str, rules_json: &str) -> Vec<argus_engine::Finding> {
    let recipe = Recipe::parse(recipe).expect("recipe parses");
    let rules = rules_from_str(rules_json).expect("rules load");
    recipe.validate(&rules).expect("validation runs")
}

mod user_id {
    use super::*;

    const RECIPE: &str = "FROM alpine\nRUN apk add curl\nUSER 1000\n";

    #[test]
    fn uid_at_threshold_does_not_fire_strict_less() {
        assert!(findings(RECIPE, NON_ROOT_USER_RULE).is_empty());
    }

    #[test]
    fn uid_at_threshold_fires_less_or_equal() {
        let rules = NON_ROOT_USER_RULE.replace("\"<\"", "\"<=\"");
        let found = findings(RECIPE, &rules);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "USR-001");
        assert_eq!(found[0].code_sample, "USER 1000");
        assert_eq!(found[0].location.start.line, 3);
    }

    #[test]
    fn root_and_zero_both_compare_as_uid_zero() {
        let rules = NON_ROOT_USER_RULE.replace("1000", "1");
        for user in ["USER root", "USER 0"] {
            let recipe = format!("FROM alpine\n{user}\n");
            let found = findings(&recipe, &rules);
            assert_eq!(found.len(), 1, "{user} should fire");
        }
    }
}

mod pipe_to_shell {
    use super::*;

    #[test]
    fn curl_piped_to_shell_fires_with_run_source_text() {
        let found = findings("FROM alpine\nRUN curl http://x | sh\n", PIPE_TO_SHELL_RULE);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "RUN-001");
        assert_eq!(found[0].code_sample, "RUN curl http://x | sh");
    }

    #[test]
    fn plain_curl_does_not_fire() {
        assert!(findings("FROM alpine\nRUN curl http://x\n", PIPE_TO_SHELL_RULE).is_empty());
    }

    #[test]
    fn sub_shell_pipe_is_detected() {
        let recipe = "FROM alpine\nRUN sh -c \"curl http://x | sh\"\n";
        let found = findings(recipe, PIPE_TO_SHELL_RULE);
        assert_eq!(found.len(), 1);
    }
}

mod constraints {
    use super::*;

    #[test]
    fn multistage_without_copy_from_fires_at_eof() {
        let recipe = "FROM build AS b\nRUN go build .\nFROM alpine\nCMD [\"/app\"]\n";
        let found = findings(recipe, &constraint_rule("missing_copy_from_in_multistage"));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "DF-missing_copy_from_in_multistage");
        // Constraint findings anchor to the terminal step, which has no text.
        assert_eq!(found[0].code_sample, "");
    }

    #[test]
    fn multistage_with_copy_from_does_not_fire() {
        let recipe =
            "FROM build AS b\nRUN go build .\nFROM alpine\nCOPY --from=b /out /app\n";
        assert!(
            findings(recipe, &constraint_rule("missing_copy_from_in_multistage")).is_empty()
        );
    }

    #[test]
    fn single_stage_with_build_tools_fires() {
        let recipe = "FROM ubuntu\nRUN apt-get install -y gcc\n";
        let found = findings(recipe, &constraint_rule("single_stage_with_build_tools"));
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn build_tools_in_builder_stage_of_multistage_do_not_fire() {
        let recipe = "FROM ubuntu AS build\nRUN apt-get install -y gcc\nFROM alpine\n";
        assert!(findings(recipe, &constraint_rule("single_stage_with_build_tools")).is_empty());
    }

    #[test]
    fn missing_user_in_final_stage_fires() {
        let recipe = "FROM build AS b\nUSER 10\nFROM alpine\n";
        let found = findings(recipe, &constraint_rule("missing_user_final_stage"));
        assert_eq!(found.len(), 1);

        let fixed = "FROM build AS b\nFROM alpine\nUSER 10\n";
        assert!(findings(fixed, &constraint_rule("missing_user_final_stage")).is_empty());
    }

    #[test]
    fn missing_healthcheck_fires() {
        let recipe = "FROM alpine\n";
        let found = findings(recipe, &constraint_rule("missing_healthcheck_final_stage"));
        assert_eq!(found.len(), 1);

        let fixed = "FROM alpine\nHEALTHCHECK CMD wget -q localhost || exit 1\n";
        assert!(
            findings(fixed, &constraint_rule("missing_healthcheck_final_stage")).is_empty()
        );
    }

    #[test]
    fn empty_recipe_produces_no_constraint_findings() {
        assert!(findings("# empty\n", &constraint_rule("missing_user_final_stage")).is_empty());
    }
}

mod env_and_mounts {
    use super::*;

    #[test]
    fn env_key_matching_pattern_fires() {
        let found = findings("FROM alpine\nENV DEBUG=1 TOKEN=abc\n", ENV_TOKEN_RULE);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "ENV-001");
    }

    #[test]
    fn secret_mount_with_id_fires() {
        let recipe = "FROM alpine\nRUN --mount=type=secret,id=aws cat /run/secrets/aws\n";
        let found = findings(recipe, SECRET_MOUNT_RULE);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "RUN-002");
    }

    #[test]
    fn cache_mount_does_not_fire_secret_rule() {
        let recipe = "FROM alpine\nRUN --mount=type=cache,target=/root/.cache make build\n";
        assert!(findings(recipe, SECRET_MOUNT_RULE).is_empty());
    }
}

mod determinism {
    use super::*;

    const RECIPE: &str = "FROM alpine\nENV TOKEN=x\nRUN curl http://x | sh\nUSER 0\n";

    fn combined_rules() -> String {
        let mut all = Vec::new();
        for json in [
            ENV_TOKEN_RULE,
            PIPE_TO_SHELL_RULE,
            NON_ROOT_USER_RULE,
            &constraint_rule("missing_healthcheck_final_stage"),
        ] {
            let mut rules: Vec<serde_json::Value> = serde_json::from_str(json).unwrap();
            all.append(&mut rules);
        }
        serde_json::to_string(&all).unwrap()
    }

    #[test]
    fn findings_follow_step_then_catalog_order() {
        let found = findings(RECIPE, &combined_rules());
        let ids: Vec<&str> = found.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(
            ids,
            [
                "ENV-001",
                "RUN-001",
                "USR-001",
                "DF-missing_healthcheck_final_stage",
            ]
        );
    }

    #[test]
    fn reruns_are_bit_identical() {
        let rules = combined_rules();
        let first = findings(RECIPE, &rules);
        let second = findings(RECIPE, &rules);
        assert_eq!(first, second);
    }

    #[test]
    fn wrapped_rules_document_loads_identically() {
        let wrapped = format!("{{\"rules\": {}}}", combined_rules());
        assert_eq!(findings(RECIPE, &wrapped), findings(RECIPE, &combined_rules()));
    }
}
