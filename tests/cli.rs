use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;
use serde_json::Value;
use tempfile::TempDir;

/// Command isolated from the user's settings, database and credentials.
fn base_cmd(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("nsrc").unwrap();
    cmd.env("HOME", home.path())
        .env_remove("NSRC_DB")
        .env_remove("NACELLE_SPACE_ID")
        .env_remove("NACELLE_GRAPHQL_TOKEN")
        .env_remove("NACELLE_ENDPOINT")
        .env_remove("RUST_LOG")
        .current_dir(home.path());
    cmd
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn version_prints_json_when_piped() {
    let home = TempDir::new().unwrap();
    let output = base_cmd(&home).arg("version").assert().success().get_output().clone();

    let json = stdout_json(&output);
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(json["source"], "Nacelle");
    assert_eq!(json["store_schema"], 1);
}

#[test]
fn source_without_credentials_is_config_error() {
    let home = TempDir::new().unwrap();
    base_cmd(&home)
        .arg("source")
        .assert()
        .failure()
        .code(6)
        .stderr(contains("CONFIG_ERROR"))
        .stderr(contains("Missing space id"));

    // Nothing was sourced, so no database was created.
    assert!(!home.path().join(".nacelle").join("data").exists());
}

#[test]
fn source_without_token_is_config_error() {
    let home = TempDir::new().unwrap();
    base_cmd(&home)
        .args(["source", "--space-id", "space-1"])
        .assert()
        .failure()
        .code(6)
        .stderr(contains("Missing access token"));
}

#[test]
fn refresh_unknown_type_fails_before_network() {
    let home = TempDir::new().unwrap();
    base_cmd(&home)
        .env("NACELLE_SPACE_ID", "space-1")
        .env("NACELLE_GRAPHQL_TOKEN", "token")
        .env("NACELLE_ENDPOINT", "http://127.0.0.1:9/graphql")
        .args(["refresh", "widget", "some-handle"])
        .assert()
        .failure()
        .code(3)
        .stderr(contains("UNKNOWN_TYPE"));
}

#[test]
fn completions_mention_binary() {
    let home = TempDir::new().unwrap();
    base_cmd(&home)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(contains("nsrc"));
}

#[test]
fn empty_database_lists_no_nodes() {
    let home = TempDir::new().unwrap();
    let db = home.path().join("nodes.db");

    let output = base_cmd(&home)
        .args(["--db", db.to_str().unwrap(), "nodes", "list"])
        .assert()
        .success()
        .get_output()
        .clone();

    let json = stdout_json(&output);
    assert_eq!(json["count"], 0);
    assert_eq!(json["nodes"], Value::Array(vec![]));
    assert!(db.exists());
}

#[test]
fn missing_node_is_not_found() {
    let home = TempDir::new().unwrap();
    let db = home.path().join("nodes.db");

    base_cmd(&home)
        .args(["--db", db.to_str().unwrap(), "nodes", "get", "Productshirten-US"])
        .assert()
        .failure()
        .code(3)
        .stderr(contains("NODE_NOT_FOUND"));
}

#[test]
fn status_on_fresh_database() {
    let home = TempDir::new().unwrap();
    let db = home.path().join("data").join("nodes.db");

    let output = base_cmd(&home)
        .env("NSRC_DB", &db)
        .arg("status")
        .assert()
        .success()
        .get_output()
        .clone();

    let json = stdout_json(&output);
    assert_eq!(json["node_count"], 0);
    assert!(json["last_run"].is_null());
}

#[test]
fn config_set_show_reset() {
    let home = TempDir::new().unwrap();

    base_cmd(&home)
        .args(["config", "set", "--space-id", "space-1", "--token", "secret-token"])
        .assert()
        .success();
    assert!(home.path().join(".nacelle").join("config.json").exists());

    let output = base_cmd(&home)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(contains("secret-token").not())
        .get_output()
        .clone();
    let json = stdout_json(&output);
    assert_eq!(json["settings"]["spaceId"], "space-1");
    assert_eq!(json["settings"]["accessToken"], "****oken");

    let output = base_cmd(&home)
        .args(["config", "reset"])
        .assert()
        .success()
        .get_output()
        .clone();
    assert_eq!(stdout_json(&output)["removed"], true);
}

#[test]
fn config_set_without_values_is_rejected() {
    let home = TempDir::new().unwrap();
    base_cmd(&home)
        .args(["config", "set"])
        .assert()
        .failure()
        .code(4)
        .stderr(contains("INVALID_ARGUMENT"));
}
