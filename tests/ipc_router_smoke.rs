
use serde_json::json;
use test_support::{request, request_err, request_ok, select_workspace, spawn_sidecar};

#[test]
fn health_reports_version_and_workspace() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(health.get("version").and_then(|v| v.as_str()).is_some());
    assert!(health
        .get("workspacePath")
        .map(|v| v.is_null())
        .unwrap_or(true));

    select_workspace(&mut stdin, &mut reader, "campusd-smoke");
    let health = request_ok(&mut stdin, &mut reader, "2", "health", json!({}));
    assert!(health.get("workspacePath").and_then(|v| v.as_str()).is_some());
}

#[test]
fn unknown_method_is_not_implemented() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let resp = request(&mut stdin, &mut reader, "1", "nope.nothing", json!({}));
    assert_eq!(resp.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        resp.get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str()),
        Some("not_implemented")
    );
}

#[test]
fn attendance_without_workspace_is_store_unavailable() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let code = request_err(
        &mut stdin,
        &mut reader,
        "1",
        "attendance.record",
        json!({
            "date": "2025-01-15",
            "subject": "Data Structures",
            "year": "2",
            "branch": "CSE",
            "section": "A",
            "facultyId": "FAC001",
            "records": [{ "studentId": "S1", "status": "Present" }]
        }),
    );
    assert_eq!(code, "store_unavailable");
}
