use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::TempDir;

const FORM: &str = r#"
title: Equipment inspection
destination_table: inspections
form:
  columns:
    - id: name
      label: Name
      type: VARCHAR
      max_length: 10
    - id: age
      label: Age
      type: INTEGER
    - id: torque
      label: Torque
      type: DECIMAL
      precision: 1
    - id: checked_at
      label: Checked at
      type: DATETIME
    - id: passed
      label: Passed
      type: BOOLEAN
      default: true
"#;

fn dbforminator_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_dbforminator"))
}

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new(form: &str) -> Self {
        let dir = TempDir::new().expect("create temp dir");
        std::fs::write(dir.path().join("form.yml"), form).expect("write form");
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(dbforminator_bin())
            .arg("--config")
            .arg(self.path("form.yml"))
            .args(args)
            .env("DBFORMINATOR_HOME", self.dir.path())
            .env_remove("RUST_LOG")
            .output()
            .expect("failed to execute dbforminator CLI")
    }

    fn run_db(&self, command: &str, args: &[&str]) -> Output {
        let db = self.path("forms.db");
        let mut full = vec![command, "--dbtype", "sqlite", "--connection", path_str(&db)];
        full.extend_from_slice(args);
        self.run(&full)
    }
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("utf-8 temp path")
}

fn stdout_json(output: &Output) -> Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(stdout.trim()).unwrap_or_else(|err| {
        panic!(
            "invalid JSON ({})\nstdout:\n{}\nstderr:\n{}",
            err,
            stdout,
            String::from_utf8_lossy(&output.stderr)
        )
    })
}

#[test]
fn test_check_prints_layout() {
    let ws = Workspace::new(FORM);
    let output = ws.run(&["check", "--dialect", "mysql"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Equipment inspection"));
    assert!(stdout.contains("DECIMAL(38, 1)"));
    assert!(stdout.contains("CREATE TABLE IF NOT EXISTS `inspections`"));
}

#[test]
fn test_invalid_schema_exits_non_zero() {
    let ws = Workspace::new(
        "form:\n  columns:\n    - {id: name, type: VARCHAR}\n    - {id: name, type: INTEGER}\n",
    );
    let output = ws.run(&["check"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("name"));
}

#[test]
fn test_missing_config_exits_non_zero() {
    let ws = Workspace::new(FORM);
    let output = Command::new(dbforminator_bin())
        .args(["--config", path_str(&ws.path("nope.yml")), "template"])
        .env("DBFORMINATOR_HOME", ws.dir.path())
        .output()
        .unwrap();
    assert!(!output.status.success());
}

#[test]
fn test_template_json() {
    let ws = Workspace::new(FORM);
    let output = ws.run(&["template"]);
    assert!(output.status.success());

    let json = stdout_json(&output);
    assert_eq!(json["table"], "inspections");
    let fields = json["fields"].as_array().unwrap();
    assert_eq!(fields.len(), 5);
    assert_eq!(fields[0]["constraint"]["max_length"], 10);
    assert_eq!(fields[4]["initial"], true);
    assert_eq!(fields[3]["initial"].as_str().unwrap().len(), 19);
}

#[test]
fn test_submit_then_show() {
    let ws = Workspace::new(FORM);
    assert!(ws.run_db("init", &[]).status.success());

    let output = ws.run_db(
        "submit",
        &["--set", "name=Alice", "--set", "age=30", "--set", "torque=2.5", "--json"],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let submitted = stdout_json(&output);
    assert_eq!(submitted["status"], "persisted");
    let id = submitted["id"].as_i64().unwrap();
    assert!(id > 0);

    let id_arg = id.to_string();
    let output = ws.run_db("show", &[&id_arg, "--json"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let row = stdout_json(&output);
    assert_eq!(row["values"]["name"], "Alice");
    assert_eq!(row["values"]["age"], 30);
    assert_eq!(row["values"]["torque"], "2.5");
    assert_eq!(row["values"]["passed"], true);
}

#[test]
fn test_rejected_submit_stores_nothing() {
    let ws = Workspace::new(FORM);
    let output = ws.run_db(
        "submit",
        &["--set", "name=ThisNameIsWayTooLong", "--set", "age=thirty"],
    );
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("name:"));
    assert!(stderr.contains("age:"));

    let output = ws.run_db("show", &["1"]);
    assert!(!output.status.success());
}

#[test]
fn test_unsupported_backend() {
    let ws = Workspace::new(FORM);
    let output = ws.run(&["init", "--dbtype", "postgres", "--connection", "x"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unsupported database backend"));
}
