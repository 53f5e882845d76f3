//! CLI integration tests for eduweave
//!
//! Tests the eduweave CLI commands end-to-end using assert_cmd. Each test
//! gets its own config directory (and therefore its own database) via
//! EDUWEAVE_CONFIG_DIR; API keys are stripped from the environment so no
//! test can reach the network.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Command pointed at an isolated config/database directory.
///
/// The working directory is the temp dir too, so no ambient `.env` file
/// can leak credentials into a test.
fn eduweave_cmd(config_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("eduweave").unwrap();
    cmd.current_dir(config_dir.path());
    cmd.env("EDUWEAVE_CONFIG_DIR", config_dir.path());
    cmd.env_remove("EDUWEAVE_API_KEY");
    cmd.env_remove("OPENROUTER_API_KEY");
    cmd
}

#[test]
fn test_help_shows_about() {
    let dir = TempDir::new().unwrap();
    eduweave_cmd(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Cache-first question answering"))
        .stdout(predicate::str::contains("ask"))
        .stdout(predicate::str::contains("staged"));
}

#[test]
fn test_version_output() {
    let dir = TempDir::new().unwrap();
    eduweave_cmd(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("eduweave"));
}

#[test]
fn test_concepts_on_empty_graph() {
    let dir = TempDir::new().unwrap();
    eduweave_cmd(&dir)
        .arg("concepts")
        .assert()
        .success()
        .stdout(predicate::str::contains("No concepts in the graph"))
        .stdout(predicate::str::contains("demo-seed"));
}

#[test]
fn test_demo_seed_populates_the_graph() {
    let dir = TempDir::new().unwrap();

    eduweave_cmd(&dir)
        .arg("demo-seed")
        .assert()
        .success()
        .stdout(predicate::str::contains("limits, continuity, derivatives, integrals"));

    eduweave_cmd(&dir)
        .arg("concepts")
        .assert()
        .success()
        .stdout(predicate::str::contains("derivatives"))
        .stdout(predicate::str::contains("Integrals"));
}

#[test]
fn test_demo_seed_is_idempotent() {
    let dir = TempDir::new().unwrap();

    eduweave_cmd(&dir).arg("demo-seed").assert().success();
    eduweave_cmd(&dir).arg("demo-seed").assert().success();

    eduweave_cmd(&dir)
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("Concepts: 4"))
        .stdout(predicate::str::contains("Prerequisite edges: 3"))
        .stdout(predicate::str::contains("Content chunks: 4"))
        .stdout(predicate::str::contains("Resources: 3"));
}

#[test]
fn test_detail_walks_the_seeded_chain() {
    let dir = TempDir::new().unwrap();
    eduweave_cmd(&dir).arg("demo-seed").assert().success();

    eduweave_cmd(&dir)
        .args(["detail", "derivatives"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Derivatives (id: derivatives)"))
        .stdout(predicate::str::contains("Prerequisites:"))
        .stdout(predicate::str::contains("continuity"))
        .stdout(predicate::str::contains("Leads to:"))
        .stdout(predicate::str::contains("integrals"));
}

#[test]
fn test_detail_resolves_names_case_insensitively() {
    let dir = TempDir::new().unwrap();
    eduweave_cmd(&dir).arg("demo-seed").assert().success();

    eduweave_cmd(&dir)
        .args(["detail", "DERIVATIVES"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Derivatives (id: derivatives)"));
}

#[test]
fn test_detail_unknown_concept_fails_with_hint() {
    let dir = TempDir::new().unwrap();
    eduweave_cmd(&dir).arg("demo-seed").assert().success();

    eduweave_cmd(&dir)
        .args(["detail", "quantum chromodynamics"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"))
        .stderr(predicate::str::contains("eduweave concepts"));
}

#[test]
fn test_detail_emits_json() {
    let dir = TempDir::new().unwrap();
    eduweave_cmd(&dir).arg("demo-seed").assert().success();

    let output = eduweave_cmd(&dir)
        .args(["--format", "json", "detail", "limits"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let detail: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(detail["concept"]["id"], "limits");
    assert_eq!(detail["leads_to"][0]["id"], "continuity");
}

#[test]
fn test_import_loads_a_graph_document() {
    let dir = TempDir::new().unwrap();
    let doc = dir.path().join("graph.json");
    std::fs::write(
        &doc,
        r#"{
            "concepts": [
                {"name": "Vectors", "difficulty_level": 2},
                {"name": "Dot Product", "difficulty_level": 3}
            ],
            "edges": [
                {"from": "Vectors", "to": "Dot Product"}
            ]
        }"#,
    )
    .unwrap();

    eduweave_cmd(&dir)
        .args(["import", doc.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Concepts upserted: 2"))
        .stdout(predicate::str::contains("Edges inserted: 1"));

    eduweave_cmd(&dir)
        .args(["detail", "dot_product"])
        .assert()
        .success()
        .stdout(predicate::str::contains("vectors"));
}

#[test]
fn test_import_rejects_edges_to_unknown_concepts() {
    let dir = TempDir::new().unwrap();
    let doc = dir.path().join("broken.json");
    std::fs::write(
        &doc,
        r#"{
            "concepts": [{"name": "Vectors"}],
            "edges": [{"from": "Vectors", "to": "Matrices"}]
        }"#,
    )
    .unwrap();

    eduweave_cmd(&dir)
        .args(["import", doc.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown concept"));
}

#[test]
fn test_import_missing_file_fails() {
    let dir = TempDir::new().unwrap();
    eduweave_cmd(&dir)
        .args(["import", "/nonexistent/graph.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read graph document"));
}

#[test]
fn test_stats_counts_the_seeded_data() {
    let dir = TempDir::new().unwrap();
    eduweave_cmd(&dir).arg("demo-seed").assert().success();

    eduweave_cmd(&dir)
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("Concepts: 4"))
        .stdout(predicate::str::contains("Content chunks: 4"))
        .stdout(predicate::str::contains("Resources: 3"))
        .stdout(predicate::str::contains("0 approved"));
}

#[test]
fn test_stats_emits_json() {
    let dir = TempDir::new().unwrap();
    eduweave_cmd(&dir).arg("demo-seed").assert().success();

    let output = eduweave_cmd(&dir)
        .args(["--format", "json", "stats"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let stats: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(stats["concepts"], 4);
    assert_eq!(stats["edges"], 3);
    assert_eq!(stats["staged"]["pending"], 0);
}

#[test]
fn test_doctor_reports_on_fresh_install() {
    let dir = TempDir::new().unwrap();
    eduweave_cmd(&dir)
        .arg("doctor")
        .assert()
        .success()
        .stdout(predicate::str::contains("Eduweave Health Check"))
        // No API key in the environment and an empty graph
        .stdout(predicate::str::contains("[--] concept_graph"))
        .stdout(predicate::str::contains("[--] llm"));
}

#[test]
fn test_doctor_passes_after_seeding() {
    let dir = TempDir::new().unwrap();
    eduweave_cmd(&dir).arg("demo-seed").assert().success();

    eduweave_cmd(&dir)
        .arg("doctor")
        .assert()
        .success()
        .stdout(predicate::str::contains("[OK] database"))
        .stdout(predicate::str::contains("[OK] concept_graph"));
}

#[test]
fn test_ask_without_api_key_fails_with_guidance() {
    let dir = TempDir::new().unwrap();
    eduweave_cmd(&dir)
        .args(["ask", "What is a derivative?"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("EDUWEAVE_API_KEY"));
}

#[test]
fn test_staged_list_empty_queue() {
    let dir = TempDir::new().unwrap();
    eduweave_cmd(&dir)
        .args(["staged", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No pending staged concepts"));
}

#[test]
fn test_staged_list_rejects_unknown_status() {
    let dir = TempDir::new().unwrap();
    eduweave_cmd(&dir)
        .args(["staged", "list", "--status", "bogus"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown status"));
}

#[test]
fn test_staged_approve_missing_entry_fails() {
    let dir = TempDir::new().unwrap();
    eduweave_cmd(&dir)
        .args(["staged", "approve", "tensors"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("staged list"));
}

#[test]
fn test_config_set_get_roundtrip() {
    let dir = TempDir::new().unwrap();

    eduweave_cmd(&dir)
        .args(["config", "set", "orchestrator.cache_ttl_days", "7"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Set orchestrator.cache_ttl_days = 7"));

    eduweave_cmd(&dir)
        .args(["config", "get", "orchestrator.cache_ttl_days"])
        .assert()
        .success()
        .stdout(predicate::str::contains("7"));
}

#[test]
fn test_config_rejects_stored_api_keys() {
    let dir = TempDir::new().unwrap();
    eduweave_cmd(&dir)
        .args(["config", "set", "api_key", "sk-secret"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("environment variable"));
}

#[test]
fn test_config_path_points_into_config_dir() {
    let dir = TempDir::new().unwrap();
    eduweave_cmd(&dir)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(dir.path().to_str().unwrap()))
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_list_covers_sections() {
    let dir = TempDir::new().unwrap();
    eduweave_cmd(&dir)
        .args(["config", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("llm.default_model"))
        .stdout(predicate::str::contains("orchestrator.fetch_deadline_secs"))
        .stdout(predicate::str::contains("notifier.max_attempts"));
}

#[test]
fn test_quiet_mode_suppresses_chrome() {
    let dir = TempDir::new().unwrap();
    eduweave_cmd(&dir)
        .args(["--quiet", "demo-seed"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}
