
use serde_json::json;
use test_support::{request_err, request_ok, select_workspace, spawn_sidecar};

fn batch(date: &str, subject: &str, section: &str, records: serde_json::Value) -> serde_json::Value {
    json!({
        "date": date,
        "subject": subject,
        "year": "2",
        "branch": "CSE",
        "section": section,
        "facultyId": "FAC001",
        "records": records
    })
}

#[test]
fn listing_filters_by_section_subject_and_date() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, "campusd-admin-listing");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "attendance.record",
        batch(
            "2025-01-15",
            "Data Structures",
            "A",
            json!([
                { "studentId": "S1", "status": "Present" },
                { "studentId": "S2", "status": "Absent" }
            ]),
        ),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "attendance.record",
        batch(
            "2025-01-16",
            "Data Structures",
            "A",
            json!([{ "studentId": "S1", "status": "Present" }]),
        ),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "attendance.record",
        batch(
            "2025-01-15",
            "Operating Systems",
            "B",
            json!([{ "studentId": "S3", "status": "Present" }]),
        ),
    );

    // Unfiltered: every stored event, newest date first.
    let all = request_ok(&mut stdin, &mut reader, "4", "attendance.all", json!({}));
    let rows = all
        .get("records")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert_eq!(rows.len(), 4);
    assert_eq!(
        rows[0].get("date").and_then(|v| v.as_str()),
        Some("2025-01-16")
    );

    // Section filter.
    let section_b = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "attendance.all",
        json!({ "section": "B" }),
    );
    let rows = section_b
        .get("records")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert_eq!(rows.len(), 1);
    assert_eq!(
        rows[0].get("studentId").and_then(|v| v.as_str()),
        Some("S3")
    );

    // Subject plus date narrows to one session's roster.
    let narrowed = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "attendance.all",
        json!({ "subject": "Data Structures", "date": "2025-01-15" }),
    );
    let rows = narrowed
        .get("records")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert_eq!(rows.len(), 2);
    for row in &rows {
        assert_eq!(
            row.get("subject").and_then(|v| v.as_str()),
            Some("Data Structures")
        );
        assert_eq!(
            row.get("facultyId").and_then(|v| v.as_str()),
            Some("FAC001")
        );
    }

    // A date that does not parse is rejected, not treated as no-match.
    let code = request_err(
        &mut stdin,
        &mut reader,
        "7",
        "attendance.all",
        json!({ "date": "15-01-2025" }),
    );
    assert_eq!(code, "bad_params");
}
