//! Purpose: Drive the `user-contract-conformance` runner with manifests written to a temp dir.
//! Exports: None (integration test module).
//! Role: Validate step ops, user references, generated inputs, and fail-fast reporting.
//! Invariants: Manifests use the in-process reference target; no sockets are opened.

use serde_json::{Value, json};
use std::fs;
use std::process::{Command, Output};

fn run_manifest(manifest: &Value) -> Output {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("manifest.json");
    fs::write(&path, serde_json::to_vec_pretty(manifest).expect("encode")).expect("write");
    Command::new(env!("CARGO_BIN_EXE_user-contract-conformance"))
        .arg(&path)
        .env("RUST_LOG", "error")
        .output()
        .expect("run conformance")
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

#[test]
fn update_flow_manifest_passes() {
    let manifest = json!({
        "conformance_version": 0,
        "target": "local",
        "token": "secret",
        "steps": [
            {
                "id": "ada",
                "op": "create",
                "input": {
                    "attributes": {"name": "Ada Lovelace", "gender": "female", "status": "active"},
                    "generate": ["email"]
                },
                "expect": {"status": 201, "attributes": "input"}
            },
            {
                "op": "update",
                "user": "ada",
                "input": {"attributes": {"status": "inactive"}},
                "expect": {"status": 200, "consistent": true}
            },
            {
                "op": "get",
                "user": "ada",
                "expect": {"status": 200, "consistent": true, "attributes": {"status": "inactive"}}
            },
            {
                "op": "create",
                "input": {"generate": ["name", "gender", "status"], "copy": {"email": "ada"}},
                "expect": {
                    "status": 422,
                    "error": {"field": "email", "message": "has already been taken"}
                }
            },
            {
                "op": "update_raw",
                "user": "ada",
                "input": {"body": "{ \"name\": \"Bad Request\" "},
                "expect": {"status": 400}
            },
            {
                "op": "update",
                "user": "ada",
                "token": "INVALID_ACCESS_TOKEN",
                "input": {"attributes": {"name": "Nobody"}},
                "expect": {"status": 401}
            },
            {
                "op": "update",
                "id_value": 1,
                "expect": {"status": 404}
            }
        ]
    });
    let output = run_manifest(&manifest);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
}

#[test]
fn v2_steps_use_bare_shapes() {
    let manifest = json!({
        "conformance_version": 0,
        "target": "local",
        "steps": [
            {
                "op": "create",
                "version": "v2",
                "input": {
                    "attributes": {"name": "Grace Hopper", "gender": "Female", "status": "Active"},
                    "generate": ["email"]
                },
                "expect": {"status": 201, "shape": "bare_single_success", "attributes": "input"}
            },
            {
                "op": "create",
                "version": "v2",
                "input": {"attributes": {
                    "name": "Grace Hopper",
                    "email": "InvalidEmail",
                    "gender": "female",
                    "status": "active"
                }},
                "expect": {
                    "status": 422,
                    "error": {"index": 0, "field": "email", "message": "is invalid"}
                }
            }
        ]
    });
    let output = run_manifest(&manifest);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
}

#[test]
fn mismatch_reports_failing_step() {
    let manifest = json!({
        "conformance_version": 0,
        "target": "local",
        "steps": [
            {
                "id": "missing-status",
                "op": "create",
                "input": {"generate": ["name", "email", "gender"]},
                "expect": {"status": 422, "error": {"field": "status", "message": "is invalid"}}
            }
        ]
    });
    let output = run_manifest(&manifest);
    assert_eq!(output.status.code(), Some(1));
    let message = stderr(&output);
    assert!(message.starts_with("step 0 (missing-status):"), "{message}");
    assert!(message.contains("can't be blank"), "{message}");
}

#[test]
fn unknown_user_reference_fails_fast() {
    let manifest = json!({
        "conformance_version": 0,
        "target": "local",
        "steps": [
            {"op": "get", "user": "ghost", "expect": {"status": 200}},
            {"op": "unknown_op"}
        ]
    });
    let output = run_manifest(&manifest);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("unknown user reference: ghost"));
}

#[test]
fn unsupported_version_is_rejected() {
    let output = run_manifest(&json!({"conformance_version": 7, "steps": []}));
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("unsupported conformance_version: 7"));
}
