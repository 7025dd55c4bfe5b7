#![allow(dead_code)]

use assert_cmd::Command;
use std::fs;
use std::path::PathBuf;
use tempfile::{tempdir, TempDir};

/// Returns a configured Command for `ddlkit_rs`
pub fn ddlkit_cmd() -> Command {
    Command::cargo_bin("ddlkit_rs").expect("Binary not found")
}

pub const SAMPLE_SCHEMA: &str = r#"
[[tables]]
name = "users"

[[tables.columns]]
name = "id"
type = "bigint"
primary_key = true
auto_increment = true

[[tables.columns]]
name = "email"
type = "varchar(255)"
nullable = false

[[tables.columns]]
name = "status"
type = "varchar(16)"
default = "'active'"

[[tables.indexes]]
name = "email"
type = "unique"
columns = ["email"]

[[tables]]
name = "membership"
primary_keys = ["user_id", "group_id"]

[[tables.columns]]
name = "user_id"
type = "bigint"
nullable = false

[[tables.columns]]
name = "group_id"
type = "bigint"
nullable = false

[[tables.indexes]]
name = "group"
columns = ["group_id"]
"#;

/// Writes `content` as `schema.toml` in a fresh temp dir
pub fn write_schema(content: &str) -> (TempDir, PathBuf) {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let path = temp_dir.path().join("schema.toml");
    fs::write(&path, content).expect("Failed to write schema file");
    (temp_dir, path)
}
