//! Integration tests for the modgate binary

use modgate_core::{Decision, DecisionSource, Outcome};
use std::io::Write;
use std::process::{Command, Output};
use tempfile::NamedTempFile;

const POLICIES: &str = r#"
policies:
  - id: friendly
    name: Friendly chatter
    rule: { type: keyword, keywords: [friendly] }
    risk: LOW
  - id: bad-users
    rule: { type: user, ids: [bad_user] }
    risk: HIGH
    action_detail: BLOCK
  - id: future
    rule: { type: sentiment, threshold: 0.4 }
    risk: MEDIUM
"#;

fn modgate(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_modgate"))
        .args(["--config", "/nonexistent/modgate.yaml"])
        .args(args)
        .env_remove("MODGATE_CONFIG")
        .env_remove("MODGATE_POLICY_FILE")
        .env_remove("RUST_LOG")
        .output()
        .expect("modgate should run")
}

fn policy_file() -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    file.write_all(POLICIES.as_bytes()).unwrap();
    file
}

fn decision(output: &Output) -> Decision {
    assert!(
        output.status.success(),
        "modgate failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn test_evaluate_with_blacklist_only() {
    let blocked = decision(&modgate(&["evaluate", "--user", "u2", "buy spam now"]));
    assert_eq!(blocked.outcome, Outcome::Blocked);
    assert_eq!(blocked.source, DecisionSource::Blacklist);

    let queued = decision(&modgate(&["evaluate", "--user", "u2", "hello"]));
    assert_eq!(queued.outcome, Outcome::PendingReview);
    assert_eq!(queued.reason, "queued for manual review");
}

#[test]
fn test_evaluate_with_policy_file() {
    let file = policy_file();
    let path = file.path().to_str().unwrap();

    let approved = decision(&modgate(&[
        "--policy",
        path,
        "evaluate",
        "--user",
        "u1",
        "a friendly bit of spam",
    ]));
    assert_eq!(approved.outcome, Outcome::Approved);
    assert_eq!(approved.matched_policy_id.as_deref(), Some("friendly"));

    let blocked = decision(&modgate(&["--policy", path, "evaluate", "--user", "bad_user", "hi"]));
    assert_eq!(blocked.outcome, Outcome::Blocked);
    assert_eq!(blocked.source, DecisionSource::Policy);
}

#[test]
fn test_no_policies_flag() {
    let file = policy_file();
    let path = file.path().to_str().unwrap();

    let result = decision(&modgate(&[
        "--policy",
        path,
        "--no-policies",
        "evaluate",
        "--user",
        "u1",
        "a friendly bit of spam",
    ]));
    assert_eq!(result.outcome, Outcome::Blocked);
    assert_eq!(result.source, DecisionSource::Blacklist);
}

#[test]
fn test_validate_reports_policies_and_skipped_rules() {
    let file = policy_file();
    let output = modgate(&["validate", file.path().to_str().unwrap()]);
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["policies"].as_array().unwrap().len(), 3);
    assert_eq!(report["policies"][1]["outcome"], "BLOCKED");
    assert_eq!(report["skipped"][0]["type_tag"], "sentiment");
    assert_eq!(report["skipped"][0]["path"], "future.rule");
}

#[test]
fn test_validate_rejects_bad_document() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    file.write_all(br#"[{"id": "x", "rule": {"keywords": ["a"]}, "risk": "LOW"}]"#).unwrap();

    let output = modgate(&["validate", file.path().to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid policy document"));
}

#[test]
fn test_list() {
    let file = policy_file();
    let output = modgate(&["--policy", file.path().to_str().unwrap(), "list"]);
    assert!(output.status.success());

    let listed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let ids: Vec<&str> = listed
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["friendly", "bad-users", "future"]);
}

#[test]
fn test_missing_policy_file_fails() {
    let output = modgate(&["--policy", "/nonexistent/policies.yaml", "list"]);
    assert!(!output.status.success());
}
