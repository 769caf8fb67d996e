
use serde_json::json;
use test_support::{request_ok, select_workspace, spawn_sidecar};

fn hourly_batch(student_id: &str, present_hours: i64, total_hours: i64) -> serde_json::Value {
    let records: Vec<serde_json::Value> = (0..total_hours)
        .map(|h| {
            json!({
                "studentId": student_id,
                "status": if h < present_hours { "Present" } else { "Absent" },
                "hour": h
            })
        })
        .collect();
    json!({
        "date": "2025-01-15",
        "subject": "Data Structures",
        "year": "2",
        "branch": "CSE",
        "section": "A",
        "facultyId": "FAC001",
        "facultyName": "Dr. Rao",
        "records": records
    })
}

fn daily_for(
    stdin: &mut std::process::ChildStdin,
    reader: &mut std::io::BufReader<std::process::ChildStdout>,
    id: &str,
    student_id: &str,
) -> serde_json::Value {
    let result = request_ok(
        stdin,
        reader,
        id,
        "attendance.recomputeStudent",
        json!({ "studentId": student_id }),
    );
    let daily = result
        .get("daily")
        .and_then(|v| v.as_array())
        .cloned()
        .expect("daily classification present");
    assert_eq!(daily.len(), 1);
    daily[0].clone()
}

#[test]
fn six_of_eight_hours_is_regular_at_exactly_75() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, "campusd-tier-regular");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "attendance.record",
        hourly_batch("S2", 6, 8),
    );
    let day = daily_for(&mut stdin, &mut reader, "2", "S2");
    assert_eq!(day.get("totalHours").and_then(|v| v.as_i64()), Some(8));
    assert_eq!(day.get("presentHours").and_then(|v| v.as_i64()), Some(6));
    assert_eq!(day.get("percentage").and_then(|v| v.as_i64()), Some(75));
    assert_eq!(
        day.get("classification").and_then(|v| v.as_str()),
        Some("Regular")
    );
}

#[test]
fn four_of_eight_hours_is_irregular() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, "campusd-tier-irregular");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "attendance.record",
        hourly_batch("S3", 4, 8),
    );
    let day = daily_for(&mut stdin, &mut reader, "2", "S3");
    assert_eq!(day.get("percentage").and_then(|v| v.as_i64()), Some(50));
    assert_eq!(
        day.get("classification").and_then(|v| v.as_str()),
        Some("Irregular")
    );
}

#[test]
fn one_of_eight_hours_is_absent() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, "campusd-tier-absent");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "attendance.record",
        hourly_batch("S4", 1, 8),
    );
    let day = daily_for(&mut stdin, &mut reader, "2", "S4");
    // 12.5 rounds half away from zero
    assert_eq!(day.get("percentage").and_then(|v| v.as_i64()), Some(13));
    assert_eq!(
        day.get("classification").and_then(|v| v.as_str()),
        Some("Absent")
    );
}

#[test]
fn whole_day_batches_produce_no_daily_classification() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, "campusd-tier-wholeday");

    let _ = request_ok(
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
            "records": [{ "studentId": "S5", "status": "Present" }]
        }),
    );
    let result = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "attendance.recomputeStudent",
        json!({ "studentId": "S5" }),
    );
    assert!(result.get("daily").is_none());
    let overall = result.get("overall").cloned().unwrap_or_default();
    assert_eq!(overall.get("totalClasses").and_then(|v| v.as_i64()), Some(1));
}
