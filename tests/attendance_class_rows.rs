
use serde_json::json;
use test_support::{request_ok, select_workspace, spawn_sidecar};

#[test]
fn class_view_aggregates_each_rostered_student_separately() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, "campusd-class-rows");

    for (i, (sid, section)) in [("S20", "A"), ("S21", "A"), ("S22", "B")].iter().enumerate() {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("s{}", i),
            "students.create",
            json!({
                "sid": sid,
                "name": format!("Student {}", sid),
                "year": "2",
                "branch": "CSE",
                "section": section
            }),
        );
    }

    for (i, date) in ["2025-01-15", "2025-01-16"].iter().enumerate() {
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
                "facultyId": "FAC001",
                "records": [
                    { "studentId": "S20", "status": "Present" },
                    { "studentId": "S21", "status": if i == 0 { "Present" } else { "Absent" } }
                ]
            }),
        );
    }

    let class = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "attendance.class",
        json!({ "year": "2", "section": "A", "branch": "CSE" }),
    );
    let rows = class
        .get("students")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert_eq!(rows.len(), 2, "section B student excluded from the roster");

    let by_sid = |sid: &str| {
        rows.iter()
            .find(|r| r.get("studentId").and_then(|v| v.as_str()) == Some(sid))
            .cloned()
            .expect("roster row")
    };
    let s20 = by_sid("S20");
    assert_eq!(
        s20.get("overallPercentage").and_then(|v| v.as_i64()),
        Some(100)
    );
    let s21 = by_sid("S21");
    assert_eq!(
        s21.get("overallPercentage").and_then(|v| v.as_i64()),
        Some(50)
    );
    let per_subject = s21
        .get("perSubject")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert_eq!(per_subject.len(), 1);
    assert_eq!(
        per_subject[0].get("totalClasses").and_then(|v| v.as_i64()),
        Some(2)
    );
}
