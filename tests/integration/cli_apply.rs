//! Binary-level tests for `eapply apply` and `eapply validate`

use serde_json::{json, Value};
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn eapply(workspace: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_eapply"))
        .arg("--quiet")
        .arg("--workspace")
        .arg(workspace)
        .args(args)
        .env("XDG_CONFIG_HOME", workspace.join(".config"))
        .env_remove("EAPPLY_LOG")
        .output()
        .unwrap()
}

fn write_declaration(workspace: &Path, value: Value) {
    std::fs::write(workspace.join("decl.json"), value.to_string()).unwrap();
}

#[test]
fn test_apply_creates_state_then_reports_no_changes() {
    let workspace = TempDir::new().unwrap();
    write_declaration(
        workspace.path(),
        json!({
            "@servers": {
                "web": { "size": "small", "@containers": { "nginx": { "port": 80 } } }
            }
        }),
    );

    let output = eapply(
        workspace.path(),
        &["apply", "decl.json", "--state", "state.json", "--format", "json"],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let tx: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(tx["status"], "done");
    assert_eq!(tx["changes"].as_array().unwrap().len(), 2);
    let child = tx["changes"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["name"] == "nginx")
        .unwrap();
    assert_eq!(child["treePath"], json!(["web", "@containers", "nginx"]));
    assert_eq!(child["entityType"], "containers");

    let state: Value = serde_json::from_str(
        &std::fs::read_to_string(workspace.path().join("state.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(
        state,
        json!({
            "@servers": { "web": { "size": "small" } },
            "web/@containers": { "nginx": { "port": 80 } }
        })
    );

    let output = eapply(workspace.path(), &["apply", "decl.json", "--state", "state.json"]);
    assert!(output.status.success());
    let text = String::from_utf8_lossy(&output.stdout);
    assert!(text.contains("No changes"));
}

#[test]
fn test_apply_text_lists_changes() {
    let workspace = TempDir::new().unwrap();
    std::fs::write(
        workspace.path().join("state.json"),
        json!({ "@servers": { "old": { "size": "tiny" } } }).to_string(),
    )
    .unwrap();
    write_declaration(workspace.path(), json!({ "@servers": { "new": {} } }));

    let output = eapply(workspace.path(), &["apply", "decl.json", "--state", "state.json"]);
    assert!(output.status.success());
    let text = String::from_utf8_lossy(&output.stdout);
    assert!(text.contains("@servers/new"));
    assert!(text.contains("@servers/old"));
    assert!(text.contains("delete"));
}

#[test]
fn test_validate_lists_layers() {
    let workspace = TempDir::new().unwrap();
    write_declaration(
        workspace.path(),
        json!({ "@servers": { "web": { "@containers": { "a": {}, "b": {} } } } }),
    );

    let output = eapply(workspace.path(), &["validate", "decl.json"]);
    assert!(output.status.success());
    let text = String::from_utf8_lossy(&output.stdout);
    assert!(text.contains("@servers/web/@containers"));
}

#[test]
fn test_invalid_declaration_exits_with_error() {
    let workspace = TempDir::new().unwrap();
    write_declaration(workspace.path(), json!({ "@servers": ["not", "an", "object"] }));

    let output = eapply(workspace.path(), &["apply", "decl.json", "--state", "state.json"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid declaration"), "{}", stderr);
    assert!(!workspace.path().join("state.json").exists());
}

#[test]
fn test_workspace_config_changes_sigil() {
    let workspace = TempDir::new().unwrap();
    std::fs::write(
        workspace.path().join("eapply.toml"),
        "[engine]\nlayer_sigil = \"+\"\n",
    )
    .unwrap();
    write_declaration(
        workspace.path(),
        json!({ "+servers": { "web": { "@tag": "literal" } } }),
    );

    let output = eapply(
        workspace.path(),
        &["apply", "decl.json", "--state", "state.json", "--format", "json"],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let tx: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(tx["changes"][0]["request"], json!({ "@tag": "literal" }));
}
