//! Integration tests for --json output across all commands
//!
//! Tests verify that JSON output:
//! - Is valid JSON (can be parsed)
//! - Contains expected fields
//! - Has correct data types

use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

const DUMP: &str = r#"/*!40101 SET @OLD_CHARACTER_SET_CLIENT=@@CHARACTER_SET_CLIENT */;
USE `app`;

DROP TABLE IF EXISTS `users`;
CREATE TABLE `users` (id INT PRIMARY KEY, name VARCHAR(255));
INSERT INTO `users` VALUES (1,'Alice'),(2,'Bob');

SET CHARACTER_SET_CLIENT = @OLD_CHARACTER_SET_CLIENT;
"#;

fn write_dump(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

fn sql_deployer_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_sql-deployer"))
}

// =============================================================================
// Deploy Command JSON Tests
// =============================================================================

#[test]
fn test_deploy_json_dry_run() {
    let dir = TempDir::new().unwrap();
    let file = write_dump(&dir, "app.sql", DUMP);

    let output = sql_deployer_bin()
        .arg("deploy")
        .arg(&file)
        .arg("--dry-run")
        .arg("--json")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value =
        serde_json::from_str(&stdout).expect(&format!("Failed to parse JSON: {}", stdout));

    assert_eq!(json["dry_run"], true);
    assert_eq!(json["status"], "success");
    assert_eq!(json["mode"], "buffered");
    // Dump DROP + injected DROP + CREATE + INSERT; FK toggles are not counted.
    assert_eq!(json["statements_executed"], 4);
    assert_eq!(json["size_bytes"], DUMP.len() as u64);
    assert_eq!(json["tables"], serde_json::json!(["users"]));
    assert!(json.get("elapsed_secs").is_some());
    // Plain .sql file: no compression key at all.
    assert!(json.get("compression").is_none());
}

#[test]
fn test_deploy_json_without_sink_is_rejected() {
    let dir = TempDir::new().unwrap();
    let file = write_dump(&dir, "app.sql", DUMP);

    let output = sql_deployer_bin()
        .arg("deploy")
        .arg(&file)
        .arg("--json")
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("pass --output or --dry-run"), "{}", stderr);
}

#[test]
fn test_deploy_json_with_output_writes_script() {
    let dir = TempDir::new().unwrap();
    let file = write_dump(&dir, "app.sql", DUMP);
    let script_path = dir.path().join("out").join("deploy.sql");

    let output = sql_deployer_bin()
        .arg("deploy")
        .arg(&file)
        .arg("--output")
        .arg(&script_path)
        .arg("--json")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value = serde_json::from_str(&stdout).expect("Failed to parse JSON");
    assert_eq!(json["status"], "success");
    assert_eq!(json["dry_run"], false);

    let script = fs::read_to_string(&script_path).unwrap();
    assert!(script.starts_with("-- Deployment script"));
    assert!(script.contains("-- Generated by sql-deployer"));
    assert!(script.contains(&format!("-- Source: {}", file.display())));

    let disable = script.find("SET FOREIGN_KEY_CHECKS = 0;").unwrap();
    let drop = script.rfind("DROP TABLE IF EXISTS `users`;").unwrap();
    let create = script.find("CREATE TABLE `users`").unwrap();
    let enable = script.find("SET FOREIGN_KEY_CHECKS = 1;").unwrap();
    assert!(disable < drop && drop < create && create < enable);
}

#[test]
fn test_deploy_json_multi_file_glob() {
    let dir = TempDir::new().unwrap();
    write_dump(&dir, "a.sql", "CREATE TABLE alpha (id INT);\n");
    write_dump(&dir, "b.sql", "CREATE TABLE bravo (id INT);\n");

    let output = sql_deployer_bin()
        .arg("deploy")
        .arg(dir.path().join("*.sql"))
        .arg("--dry-run")
        .arg("--json")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value =
        serde_json::from_str(&stdout).expect(&format!("Failed to parse JSON: {}", stdout));

    assert_eq!(json["total_files"], 2);
    assert_eq!(json["succeeded"], 2);
    assert_eq!(json["failed"], 0);
    assert_eq!(json["skipped"], 0);
    assert_eq!(json["dry_run"], true);

    let results = json["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    for result in results {
        assert_eq!(result["status"], "success");
        assert_eq!(result["mode"], "buffered");
        assert_eq!(result["statements_executed"], 2);
    }
    // Glob expansion is sorted.
    assert!(results[0]["file"].as_str().unwrap().ends_with("a.sql"));
    assert!(results[1]["file"].as_str().unwrap().ends_with("b.sql"));
}

#[test]
fn test_deploy_manifest_order_is_preserved() {
    let dir = TempDir::new().unwrap();
    let schema = write_dump(&dir, "z_schema.sql", "CREATE TABLE users (id INT);\n");
    let data = write_dump(&dir, "a_data.sql", "INSERT INTO users VALUES (1);\n");

    // Schema first despite sorting after the data file alphabetically.
    let manifest = dir.path().join("deploy.yaml");
    fs::write(
        &manifest,
        format!("files:\n  - {}\n  - {}\n", schema.display(), data.display()),
    )
    .unwrap();

    let script_path = dir.path().join("deploy-script.sql");
    let output = sql_deployer_bin()
        .arg("deploy")
        .arg("--config")
        .arg(&manifest)
        .arg("--output")
        .arg(&script_path)
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let script = fs::read_to_string(&script_path).unwrap();
    let schema_pos = script.find("z_schema.sql").unwrap();
    let data_pos = script.find("a_data.sql").unwrap();
    assert!(schema_pos < data_pos);

    let create_pos = script.find("CREATE TABLE users").unwrap();
    let insert_pos = script.find("INSERT INTO users").unwrap();
    assert!(create_pos < insert_pos);
}

#[test]
fn test_deploy_manifest_missing_file_is_skipped() {
    let dir = TempDir::new().unwrap();
    let good = write_dump(&dir, "good.sql", "SELECT 1;\n");
    let gone = dir.path().join("gone.sql");

    let manifest = dir.path().join("deploy.yaml");
    fs::write(
        &manifest,
        format!("files:\n  - {}\n  - {}\n", good.display(), gone.display()),
    )
    .unwrap();

    let output = sql_deployer_bin()
        .arg("deploy")
        .arg("--config")
        .arg(&manifest)
        .arg("--dry-run")
        .arg("--json")
        .output()
        .expect("Failed to execute command");

    // A vanished listed file is passed over, not fatal.
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value = serde_json::from_str(&stdout).expect("Failed to parse JSON");

    assert_eq!(json["succeeded"], 1);
    assert_eq!(json["failed"], 0);
    assert_eq!(json["skipped"], 1);

    let results = json["results"].as_array().unwrap();
    assert_eq!(results[1]["status"], "skipped");
    assert!(results[1].get("error").is_some());
}

#[test]
fn test_deploy_missing_literal_file_fails() {
    let output = sql_deployer_bin()
        .arg("deploy")
        .arg("/nonexistent/dump.sql")
        .arg("--dry-run")
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("does not exist"), "{}", stderr);
}

// =============================================================================
// Extract Command JSON Tests
// =============================================================================

#[test]
fn test_extract_json_output() {
    let dir = TempDir::new().unwrap();
    let file = write_dump(&dir, "app.sql", DUMP);
    let out_path = dir.path().join("statements.sql");

    let output = sql_deployer_bin()
        .arg("extract")
        .arg(&file)
        .arg("--output")
        .arg(&out_path)
        .arg("--json")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value =
        serde_json::from_str(&stdout).expect(&format!("Failed to parse JSON: {}", stdout));

    assert!(json.get("input_file").is_some());
    assert!(json.get("output").is_some());

    let stats = &json["statistics"];
    assert_eq!(stats["statements_extracted"], 3);
    assert_eq!(stats["statements_skipped"], 3);
    assert_eq!(stats["bytes_read"], DUMP.len() as u64);
    assert!(stats.get("elapsed_secs").is_some());

    let skipped = &json["skipped"];
    assert_eq!(skipped["use_statements"], 1);
    assert_eq!(skipped["conditional_comments"], 1);
    assert_eq!(skipped["session_restores"], 1);

    let extracted = fs::read_to_string(&out_path).unwrap();
    assert!(extracted.contains("CREATE TABLE `users`"));
    assert!(!extracted.contains("/*!"));
    assert!(!extracted.contains("USE `app`"));
}

#[test]
fn test_extract_json_without_output_is_rejected() {
    let dir = TempDir::new().unwrap();
    let file = write_dump(&dir, "app.sql", DUMP);

    let output = sql_deployer_bin()
        .arg("extract")
        .arg(&file)
        .arg("--json")
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("pass --output"), "{}", stderr);
}

#[test]
fn test_extract_statements_go_to_stdout() {
    let dir = TempDir::new().unwrap();
    let file = write_dump(&dir, "app.sql", DUMP);

    let output = sql_deployer_bin()
        .arg("extract")
        .arg(&file)
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("CREATE TABLE `users` (id INT PRIMARY KEY, name VARCHAR(255));"));
    assert!(stdout.contains("INSERT INTO `users` VALUES (1,'Alice'),(2,'Bob');"));
    assert!(!stdout.contains("@OLD_CHARACTER_SET_CLIENT"));

    // Human-readable chatter stays on stderr.
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Statements extracted: 3"));
}

// =============================================================================
// Preprocess Command JSON Tests
// =============================================================================

#[test]
fn test_preprocess_json_output() {
    let dir = TempDir::new().unwrap();
    let file = write_dump(&dir, "app.sql", DUMP);
    let out_path = dir.path().join("rewritten.sql");

    let output = sql_deployer_bin()
        .arg("preprocess")
        .arg(&file)
        .arg("--output")
        .arg(&out_path)
        .arg("--json")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value =
        serde_json::from_str(&stdout).expect(&format!("Failed to parse JSON: {}", stdout));

    assert_eq!(json["statements"], 4);
    assert_eq!(json["tables"], serde_json::json!(["users"]));
    assert_eq!(json["views"], serde_json::json!([]));
    assert!(json.get("elapsed_secs").is_some());

    let script = fs::read_to_string(&out_path).unwrap();
    assert!(script.starts_with("SET FOREIGN_KEY_CHECKS = 0;"));
    assert!(script.trim_end().ends_with("SET FOREIGN_KEY_CHECKS = 1;"));
}

#[test]
fn test_preprocess_json_without_output_is_rejected() {
    let dir = TempDir::new().unwrap();
    let file = write_dump(&dir, "app.sql", DUMP);

    let output = sql_deployer_bin()
        .arg("preprocess")
        .arg(&file)
        .arg("--json")
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("pass --output"), "{}", stderr);
}

// =============================================================================
// Schema Command Tests
// =============================================================================

#[test]
fn test_schema_prints_all_schemas() {
    let output = sql_deployer_bin()
        .arg("schema")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value = serde_json::from_str(&stdout).expect("Failed to parse JSON");

    let map = json.as_object().unwrap();
    assert_eq!(map.len(), 3);
    assert!(map.contains_key("deploy"));
    assert!(map.contains_key("extract"));
    assert!(map.contains_key("preprocess"));
}

#[test]
fn test_schema_single_and_list() {
    let output = sql_deployer_bin()
        .arg("schema")
        .arg("deploy")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value = serde_json::from_str(&stdout).expect("Failed to parse JSON");
    assert!(json.is_object());

    let output = sql_deployer_bin()
        .arg("schema")
        .arg("--list")
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let names: Vec<&str> = stdout.lines().collect();
    assert_eq!(names, vec!["deploy", "extract", "preprocess"]);
}

#[test]
fn test_schema_unknown_name_fails() {
    let output = sql_deployer_bin()
        .arg("schema")
        .arg("bogus")
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown schema"), "{}", stderr);
}

// =============================================================================
// Completions Command Tests
// =============================================================================

#[test]
fn test_completions_bash() {
    let output = sql_deployer_bin()
        .arg("completions")
        .arg("bash")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("sql-deployer"));
}

// =============================================================================
// Edge Cases
// =============================================================================

#[test]
fn test_deploy_json_empty_file() {
    let dir = TempDir::new().unwrap();
    let file = write_dump(&dir, "empty.sql", "");

    let output = sql_deployer_bin()
        .arg("deploy")
        .arg(&file)
        .arg("--dry-run")
        .arg("--json")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value = serde_json::from_str(&stdout).expect("Failed to parse JSON");

    assert_eq!(json["status"], "success");
    assert_eq!(json["statements_executed"], 0);
    assert_eq!(json["tables"], serde_json::json!([]));
}

#[test]
fn test_deploy_json_quoted_statement_content_survives() {
    let dir = TempDir::new().unwrap();
    let file = write_dump(
        &dir,
        "tricky.sql",
        "INSERT INTO t VALUES (1, 'semi; colon \"quotes\" it''s');\n",
    );
    let script_path = dir.path().join("out.sql");

    let output = sql_deployer_bin()
        .arg("deploy")
        .arg(&file)
        .arg("--output")
        .arg(&script_path)
        .arg("--json")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value =
        serde_json::from_str(&stdout).expect("Failed to parse JSON with special characters");
    assert_eq!(json["statements_executed"], 1);

    let script = fs::read_to_string(&script_path).unwrap();
    assert!(script.contains("'semi; colon \"quotes\" it''s'"));
}
