use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::notify::{ChangeEvent, EventQueue, Notifier};
use crate::recorder::{self, AttendanceBatch, BatchRecord, RecordError};
use crate::rollup::{self, AttendanceStatus};
use crate::sync::{self, SyncReport};
use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use serde_json::json;
use std::collections::BTreeMap;

struct HandlerErr {
    code: &'static str,
    message: String,
    details: Option<serde_json::Value>,
}

impl HandlerErr {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<RecordError> for HandlerErr {
    fn from(e: RecordError) -> Self {
        match e {
            RecordError::InvalidBatch(msg) => HandlerErr::new("invalid_batch", msg),
            RecordError::NotFound(msg) => HandlerErr::new("not_found", msg),
            RecordError::Store(e) => HandlerErr::new("store_unavailable", e.to_string()),
        }
    }
}

impl From<rusqlite::Error> for HandlerErr {
    fn from(e: rusqlite::Error) -> Self {
        HandlerErr::new("store_unavailable", e.to_string())
    }
}

fn get_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn required(params: &serde_json::Value, key: &str, code: &'static str) -> Result<String, HandlerErr> {
    get_str(params, key).ok_or_else(|| HandlerErr::new(code, format!("missing {}", key)))
}

fn parse_batch(params: &serde_json::Value) -> Result<AttendanceBatch, HandlerErr> {
    let date = required(params, "date", "invalid_batch")?;
    let subject = required(params, "subject", "invalid_batch")?;
    let year = required(params, "year", "invalid_batch")?;
    let branch = required(params, "branch", "invalid_batch")?;
    let section = required(params, "section", "invalid_batch")?;
    let faculty_id = required(params, "facultyId", "invalid_batch")?;
    let faculty_name = get_str(params, "facultyName").unwrap_or_else(|| faculty_id.clone());

    let Some(raw_records) = params.get("records").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::new("invalid_batch", "missing records"));
    };

    let mut records = Vec::with_capacity(raw_records.len());
    for raw in raw_records {
        let student_id = get_str(raw, "studentId")
            .ok_or_else(|| HandlerErr::new("invalid_batch", "record missing studentId"))?;
        let student_name = get_str(raw, "studentName").unwrap_or_else(|| student_id.clone());
        let status = match raw.get("status").and_then(|v| v.as_str()) {
            None => AttendanceStatus::Present,
            Some(s) => AttendanceStatus::parse(s)
                .ok_or_else(|| HandlerErr::new("invalid_batch", format!("unknown status {:?}", s)))?,
        };
        records.push(BatchRecord {
            student_id,
            student_name,
            status,
            remarks: get_str(raw, "remarks"),
            hour: raw.get("hour").and_then(|v| v.as_i64()),
        });
    }

    Ok(AttendanceBatch {
        date,
        subject,
        year,
        branch,
        section,
        faculty_id,
        faculty_name,
        records,
    })
}

fn sync_and_notify(
    conn: &Connection,
    events: &mut EventQueue,
    student_id: &str,
    subjects: &[String],
    now: &str,
) -> Result<SyncReport, HandlerErr> {
    let report = sync::sync_student(conn, student_id, subjects, now)?;
    if let Some(summary) = &report.dashboard_summary {
        events.publish(ChangeEvent::student_data(student_id, summary));
    }
    Ok(report)
}

fn attendance_record(
    conn: &Connection,
    events: &mut EventQueue,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let batch = parse_batch(params)?;
    let now = Utc::now().to_rfc3339();
    let outcome = recorder::record_batch(conn, &batch, &now)?;

    let mut affected_students: Vec<String> = Vec::new();
    for (student_id, _) in &outcome.touched {
        if !affected_students.contains(student_id) {
            affected_students.push(student_id.clone());
        }
    }

    let mut reports = Vec::with_capacity(affected_students.len());
    for student_id in &affected_students {
        let subjects: Vec<String> = outcome
            .touched
            .iter()
            .filter(|(sid, _)| sid == student_id)
            .map(|(_, subject)| subject.clone())
            .collect();
        reports.push(sync::sync_student(conn, student_id, &subjects, &now)?);
    }

    // Nothing is published until every projection pass has finished; a
    // request that errors out leaves the event queue untouched.
    events.publish(ChangeEvent::AttendanceBulkUpdate {
        date: batch.date.clone(),
        subject: batch.subject.clone(),
        section: batch.section.clone(),
        branch: batch.branch.clone(),
        record_count: outcome.record_count,
        affected_students: affected_students.clone(),
    });
    let mut projections = Vec::with_capacity(reports.len());
    for report in &reports {
        if let Some(summary) = &report.dashboard_summary {
            events.publish(ChangeEvent::student_data(&report.student_id, summary));
        }
        projections.push(report.to_json());
    }

    Ok(json!({
        "recordCount": outcome.record_count,
        "affectedStudents": affected_students,
        "projections": projections
    }))
}

fn attendance_recompute_student(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = required(params, "studentId", "bad_params")?;
    let events = db::load_student_events(conn, &student_id)?;

    let overall = rollup::overall_rollup(&events);
    let subjects = rollup::subject_rollups(&events);
    let days = rollup::day_rollups(&events);

    let mut result = json!({
        "studentId": student_id,
        "overall": rollup::overall_json(&overall),
        "perSubject": rollup::subjects_json(&subjects)
    });
    if !days.is_empty() {
        result["daily"] = rollup::daily_json(&days);
    }
    Ok(result)
}

fn attendance_student(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = required(params, "studentId", "bad_params")?;
    let events = db::load_student_events(conn, &student_id)?;
    let overall = rollup::overall_rollup(&events);
    let days = rollup::day_rollups(&events);

    Ok(json!({
        "studentId": student_id,
        "totalRecords": overall.total,
        "overallPercentage": overall.percentage(),
        "daily": rollup::daily_json(&days)
    }))
}

fn attendance_class(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let year = required(params, "year", "bad_params")?;
    let section = required(params, "section", "bad_params")?;
    let branch = required(params, "branch", "bad_params")?;

    let mut stmt = conn.prepare(
        "SELECT sid, name FROM students
         WHERE year = ? AND section = ? AND branch = ?
         ORDER BY sid",
    )?;
    let roster: Vec<(String, String)> = stmt
        .query_map((&year, &section, &branch), |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut rows = Vec::with_capacity(roster.len());
    for (sid, name) in roster {
        let events = db::load_student_events(conn, &sid)?;
        let overall = rollup::overall_rollup(&events);
        let subjects = rollup::subject_rollups(&events);
        rows.push(json!({
            "studentId": sid,
            "name": name,
            "totalClasses": overall.total,
            "overallPercentage": overall.percentage(),
            "perSubject": rollup::subjects_json(&subjects)
        }));
    }

    Ok(json!({ "students": rows }))
}

fn attendance_recompute_all(
    conn: &Connection,
    events: &mut EventQueue,
    _params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let mut stmt =
        conn.prepare("SELECT DISTINCT student_id FROM attendance_events ORDER BY student_id")?;
    let student_ids: Vec<String> = stmt
        .query_map([], |r| r.get(0))?
        .collect::<Result<Vec<_>, _>>()?;

    let now = Utc::now().to_rfc3339();
    let mut updated = 0usize;
    for student_id in &student_ids {
        let mut subj_stmt = conn.prepare(
            "SELECT DISTINCT subject FROM attendance_events WHERE student_id = ? ORDER BY subject",
        )?;
        let subjects: Vec<String> = subj_stmt
            .query_map([student_id], |r| r.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        sync_and_notify(conn, events, student_id, &subjects, &now)?;
        updated += 1;
    }

    Ok(json!({ "studentsUpdated": updated }))
}

fn attendance_correct_hour(
    conn: &Connection,
    events: &mut EventQueue,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let date = required(params, "date", "bad_params")?;
    let student_id = required(params, "studentId", "bad_params")?;
    let subject = required(params, "subject", "bad_params")?;
    let from_hour = params.get("fromHour").and_then(|v| v.as_i64());
    let to_hour = params.get("toHour").and_then(|v| v.as_i64());

    recorder::correct_hour(conn, &date, &student_id, &subject, from_hour, to_hour)?;

    let now = Utc::now().to_rfc3339();
    let report = sync_and_notify(conn, events, &student_id, &[subject], &now)?;

    Ok(json!({ "moved": true, "projections": report.to_json() }))
}

fn attendance_all(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let mut sql = String::from(
        "SELECT date, student_id, student_name, subject, year, branch, section,
                status, faculty_id, faculty_name, hour, remarks, marked_at
         FROM attendance_events WHERE 1=1",
    );
    let mut binds: Vec<String> = Vec::new();
    for key in ["year", "branch", "section", "subject"] {
        if let Some(v) = get_str(params, key) {
            sql.push_str(&format!(" AND {} = ?", key));
            binds.push(v);
        }
    }
    if let Some(date) = get_str(params, "date") {
        if NaiveDate::parse_from_str(&date, "%Y-%m-%d").is_err() {
            return Err(HandlerErr::new(
                "bad_params",
                format!("date must be YYYY-MM-DD, got {:?}", date),
            ));
        }
        sql.push_str(" AND date = ?");
        binds.push(date);
    }
    sql.push_str(" ORDER BY date DESC, marked_at DESC");

    let mut stmt = conn.prepare(&sql)?;
    let rows: Vec<serde_json::Value> = stmt
        .query_map(rusqlite::params_from_iter(binds.iter()), |r| {
            Ok(json!({
                "date": r.get::<_, String>(0)?,
                "studentId": r.get::<_, String>(1)?,
                "studentName": r.get::<_, String>(2)?,
                "subject": r.get::<_, String>(3)?,
                "year": r.get::<_, String>(4)?,
                "branch": r.get::<_, String>(5)?,
                "section": r.get::<_, String>(6)?,
                "status": r.get::<_, String>(7)?,
                "facultyId": r.get::<_, String>(8)?,
                "facultyName": r.get::<_, String>(9)?,
                "hour": r.get::<_, Option<i64>>(10)?,
                "remarks": r.get::<_, Option<String>>(11)?,
                "markedAt": r.get::<_, String>(12)?
            }))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(json!({ "records": rows }))
}

fn attendance_faculty_stats(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let faculty_id = required(params, "facultyId", "bad_params")?;
    let mut stmt = conn.prepare(
        "SELECT subject, section, year, date, hour, status
         FROM attendance_events
         WHERE faculty_id = ?",
    )?;
    let rows: Vec<(String, String, String, String, Option<i64>, String)> = stmt
        .query_map([&faculty_id], |r| {
            Ok((
                r.get(0)?,
                r.get(1)?,
                r.get(2)?,
                r.get(3)?,
                r.get(4)?,
                r.get(5)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    // One class session is one (date, hour-or-null) sitting of a taught
    // group; its attendance is the present share of that sitting's roster.
    type SessionKey = (String, Option<i64>);
    let mut groups: BTreeMap<(String, String, String), BTreeMap<SessionKey, (i64, i64)>> =
        BTreeMap::new();
    for (subject, section, year, date, hour, status) in rows {
        let sessions = groups.entry((subject, section, year)).or_default();
        let counts = sessions.entry((date, hour)).or_insert((0, 0));
        counts.0 += 1;
        if status == AttendanceStatus::Present.as_str() {
            counts.1 += 1;
        }
    }

    let stats: Vec<serde_json::Value> = groups
        .into_iter()
        .map(|((subject, section, year), sessions)| {
            let classes_taken = sessions.len() as i64;
            let pct_sum: f64 = sessions
                .values()
                .map(|(total, present)| 100.0 * *present as f64 / *total as f64)
                .sum();
            let avg = (pct_sum / classes_taken as f64).round() as i64;
            json!({
                "subject": subject,
                "section": section,
                "year": year,
                "classesTaken": classes_taken,
                "avgAttendance": avg
            })
        })
        .collect();

    Ok(json!({ "stats": stats }))
}

fn attendance_faculty(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let faculty_id = required(params, "facultyId", "bad_params")?;
    let mut stmt = conn.prepare(
        "SELECT date, student_id, student_name, subject, year, branch, section,
                status, hour, remarks, marked_at
         FROM attendance_events
         WHERE faculty_id = ?
         ORDER BY date DESC, marked_at DESC",
    )?;
    let rows: Vec<serde_json::Value> = stmt
        .query_map([&faculty_id], |r| {
            Ok(json!({
                "date": r.get::<_, String>(0)?,
                "studentId": r.get::<_, String>(1)?,
                "studentName": r.get::<_, String>(2)?,
                "subject": r.get::<_, String>(3)?,
                "year": r.get::<_, String>(4)?,
                "branch": r.get::<_, String>(5)?,
                "section": r.get::<_, String>(6)?,
                "status": r.get::<_, String>(7)?,
                "hour": r.get::<_, Option<i64>>(8)?,
                "remarks": r.get::<_, Option<String>>(9)?,
                "markedAt": r.get::<_, String>(10)?
            }))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(json!({ "records": rows }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    if !req.method.starts_with("attendance.") {
        return None;
    }

    let AppState { db, events, .. } = state;
    let Some(conn) = db.as_ref() else {
        return Some(err(
            &req.id,
            "store_unavailable",
            "select a workspace first",
            None,
        ));
    };
    let result = match req.method.as_str() {
        "attendance.record" => attendance_record(conn, events, &req.params),
        "attendance.recomputeStudent" => attendance_recompute_student(conn, &req.params),
        "attendance.student" => attendance_student(conn, &req.params),
        "attendance.class" => attendance_class(conn, &req.params),
        "attendance.recomputeAll" => attendance_recompute_all(conn, events, &req.params),
        "attendance.correctHour" => attendance_correct_hour(conn, events, &req.params),
        "attendance.all" => attendance_all(conn, &req.params),
        "attendance.faculty" => attendance_faculty(conn, &req.params),
        "attendance.facultyStats" => attendance_faculty_stats(conn, &req.params),
        _ => return None,
    };
    Some(match result {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    })
}
