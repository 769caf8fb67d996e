
use serde_json::json;
use test_support::{request_ok, spawn_sidecar, temp_dir};

#[test]
fn two_processes_share_one_workspace_file() {
    let workspace = temp_dir("campusd-shared-workspace");
    let path = workspace.to_string_lossy().to_string();

    let (_writer, mut w_stdin, mut w_reader) = spawn_sidecar();
    let (_reader_proc, mut r_stdin, mut r_reader) = spawn_sidecar();
    let _ = request_ok(
        &mut w_stdin,
        &mut w_reader,
        "ws",
        "workspace.select",
        json!({ "path": path }),
    );
    let _ = request_ok(
        &mut r_stdin,
        &mut r_reader,
        "ws",
        "workspace.select",
        json!({ "path": path }),
    );

    let _ = request_ok(
        &mut w_stdin,
        &mut w_reader,
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

    // The second process reads what the first one committed.
    let view = request_ok(
        &mut r_stdin,
        &mut r_reader,
        "2",
        "attendance.student",
        json!({ "studentId": "S1" }),
    );
    assert_eq!(view.get("totalRecords").and_then(|v| v.as_i64()), Some(1));
    assert_eq!(
        view.get("overallPercentage").and_then(|v| v.as_i64()),
        Some(100)
    );
}
