
use serde_json::json;
use test_support::{request_ok, select_workspace, spawn_sidecar};

#[test]
fn faculty_feed_returns_own_events_newest_date_first() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, "campusd-faculty-feed");

    for (i, (date, fid)) in [
        ("2025-01-15", "FAC001"),
        ("2025-01-16", "FAC001"),
        ("2025-01-16", "FAC002"),
    ]
    .iter()
    .enumerate()
    {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("b{}", i),
            "attendance.record",
            json!({
                "date": date,
                "subject": "Data Structures",
                "year": "2",
                "branch": "CSE",
                "section": "A",
                "facultyId": fid,
                "records": [{ "studentId": "S30", "status": "Present" }]
            }),
        );
    }

    let feed = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "attendance.faculty",
        json!({ "facultyId": "FAC001" }),
    );
    let records = feed
        .get("records")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert_eq!(records.len(), 2);
    assert_eq!(
        records[0].get("date").and_then(|v| v.as_str()),
        Some("2025-01-16")
    );
    assert_eq!(
        records[1].get("date").and_then(|v| v.as_str()),
        Some("2025-01-15")
    );
    assert!(records
        .iter()
        .all(|r| r.get("studentId").and_then(|v| v.as_str()) == Some("S30")));
}

#[test]
fn roster_listing_filters_by_year_section_branch() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, "campusd-roster");

    for (i, (sid, year)) in [("S31", "2"), ("S32", "3")].iter().enumerate() {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("s{}", i),
            "students.create",
            json!({
                "sid": sid,
                "name": format!("Student {}", sid),
                "year": year,
                "branch": "CSE",
                "section": "A"
            }),
        );
    }

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "students.list",
        json!({ "year": "2", "section": "A", "branch": "CSE" }),
    );
    let students = listed
        .get("students")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert_eq!(students.len(), 1);
    assert_eq!(
        students[0].get("sid").and_then(|v| v.as_str()),
        Some("S31")
    );
}
