use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

fn required_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn lookup_student_name(conn: &Connection, sid: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row("SELECT name FROM students WHERE sid = ?", [sid], |r| {
        r.get(0)
    })
    .optional()
}

fn lookup_faculty_name(conn: &Connection, faculty_id: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT name FROM faculty WHERE faculty_id = ?",
        [faculty_id],
        |r| r.get(0),
    )
    .optional()
}

fn handle_enrollments_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "store_unavailable", "select a workspace first", None);
    };
    let Some(student_id) = required_str(&req.params, "studentId") else {
        return err(&req.id, "bad_params", "missing studentId", None);
    };
    let Some(faculty_id) = required_str(&req.params, "facultyId") else {
        return err(&req.id, "bad_params", "missing facultyId", None);
    };
    let Some(subject) = required_str(&req.params, "subject") else {
        return err(&req.id, "bad_params", "missing subject", None);
    };

    // Names are denormalized snapshots: take them from the request, or fall
    // back to the profile rows when they exist.
    let student_name = match required_str(&req.params, "studentName") {
        Some(n) => n,
        None => match lookup_student_name(conn, &student_id) {
            Ok(Some(n)) => n,
            Ok(None) => student_id.clone(),
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        },
    };
    let faculty_name = match required_str(&req.params, "facultyName") {
        Some(n) => n,
        None => match lookup_faculty_name(conn, &faculty_id) {
            Ok(Some(n)) => n,
            Ok(None) => faculty_id.clone(),
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        },
    };

    let year = required_str(&req.params, "year");
    let branch = required_str(&req.params, "branch");
    let section = required_str(&req.params, "section");

    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();
    if let Err(e) = conn.execute(
        "INSERT INTO enrollments(
           id, student_id, student_name, faculty_id, faculty_name,
           subject, year, branch, section, status, last_activity_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, 'active', ?)",
        rusqlite::params![
            id,
            student_id,
            student_name,
            faculty_id,
            faculty_name,
            subject,
            year,
            branch,
            section,
            now,
        ],
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "enrollments" })),
        );
    }

    ok(
        &req.id,
        json!({
            "id": id,
            "studentId": student_id,
            "facultyId": faculty_id,
            "subject": subject
        }),
    )
}

fn handle_enrollments_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "enrollments": [] }));
    };

    let student_id = required_str(&req.params, "studentId");
    let faculty_id = required_str(&req.params, "facultyId");

    let mut sql = String::from(
        "SELECT id, student_id, student_name, faculty_id, faculty_name, subject,
                year, branch, section, status, attendance_percentage,
                total_classes, total_present, last_activity_at
         FROM enrollments WHERE 1=1",
    );
    let mut binds: Vec<String> = Vec::new();
    if let Some(s) = student_id {
        sql.push_str(" AND student_id = ?");
        binds.push(s);
    }
    if let Some(f) = faculty_id {
        sql.push_str(" AND faculty_id = ?");
        binds.push(f);
    }
    sql.push_str(" ORDER BY student_id, subject, faculty_id");

    let mut stmt = match conn.prepare(&sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map(rusqlite::params_from_iter(binds.iter()), |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "studentId": r.get::<_, String>(1)?,
                "studentName": r.get::<_, String>(2)?,
                "facultyId": r.get::<_, String>(3)?,
                "facultyName": r.get::<_, String>(4)?,
                "subject": r.get::<_, String>(5)?,
                "year": r.get::<_, Option<String>>(6)?,
                "branch": r.get::<_, Option<String>>(7)?,
                "section": r.get::<_, Option<String>>(8)?,
                "status": r.get::<_, String>(9)?,
                "attendancePercentage": r.get::<_, i64>(10)?,
                "totalClasses": r.get::<_, i64>(11)?,
                "totalPresent": r.get::<_, i64>(12)?,
                "lastActivityAt": r.get::<_, Option<String>>(13)?
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(enrollments) => ok(&req.id, json!({ "enrollments": enrollments })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "enrollments.create" => Some(handle_enrollments_create(state, req)),
        "enrollments.list" => Some(handle_enrollments_list(state, req)),
        _ => None,
    }
}
