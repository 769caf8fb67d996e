use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use chrono::Utc;
use rusqlite::OptionalExtension;
use serde_json::json;
use uuid::Uuid;

fn required_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "store_unavailable", "select a workspace first", None);
    };

    let Some(sid) = required_str(&req.params, "sid") else {
        return err(&req.id, "bad_params", "missing sid", None);
    };
    let Some(name) = required_str(&req.params, "name") else {
        return err(&req.id, "bad_params", "missing name", None);
    };
    let Some(year) = required_str(&req.params, "year") else {
        return err(&req.id, "bad_params", "missing year", None);
    };
    let Some(branch) = required_str(&req.params, "branch") else {
        return err(&req.id, "bad_params", "missing branch", None);
    };
    let Some(section) = required_str(&req.params, "section") else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let email = required_str(&req.params, "email");

    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();
    if let Err(e) = conn.execute(
        "INSERT INTO students(id, sid, name, year, branch, section, email, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![id, sid, name, year, branch, section, email, now],
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "students" })),
        );
    }

    ok(&req.id, json!({ "id": id, "sid": sid, "name": name }))
}

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "students": [] }));
    };

    let year = required_str(&req.params, "year");
    let branch = required_str(&req.params, "branch");
    let section = required_str(&req.params, "section");

    let mut sql = String::from(
        "SELECT sid, name, year, branch, section, total_classes, total_present
         FROM students WHERE 1=1",
    );
    let mut binds: Vec<String> = Vec::new();
    if let Some(y) = year {
        sql.push_str(" AND year = ?");
        binds.push(y);
    }
    if let Some(b) = branch {
        sql.push_str(" AND branch = ?");
        binds.push(b);
    }
    if let Some(s) = section {
        sql.push_str(" AND section = ?");
        binds.push(s);
    }
    sql.push_str(" ORDER BY sid");

    let mut stmt = match conn.prepare(&sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map(rusqlite::params_from_iter(binds.iter()), |r| {
            let total: i64 = r.get(5)?;
            let present: i64 = r.get(6)?;
            Ok(json!({
                "sid": r.get::<_, String>(0)?,
                "name": r.get::<_, String>(1)?,
                "year": r.get::<_, String>(2)?,
                "branch": r.get::<_, String>(3)?,
                "section": r.get::<_, String>(4)?,
                "totalClasses": total,
                "totalPresent": present
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(students) => ok(&req.id, json!({ "students": students })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_students_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "store_unavailable", "select a workspace first", None);
    };
    let Some(sid) = required_str(&req.params, "sid") else {
        return err(&req.id, "bad_params", "missing sid", None);
    };

    let profile = conn
        .query_row(
            "SELECT sid, name, year, branch, section, email, total_classes, total_present
             FROM students WHERE sid = ?",
            [&sid],
            |r| {
                let total: i64 = r.get(6)?;
                let present: i64 = r.get(7)?;
                Ok(json!({
                    "sid": r.get::<_, String>(0)?,
                    "name": r.get::<_, String>(1)?,
                    "year": r.get::<_, String>(2)?,
                    "branch": r.get::<_, String>(3)?,
                    "section": r.get::<_, String>(4)?,
                    "email": r.get::<_, Option<String>>(5)?,
                    "attendance": {
                        "totalClasses": total,
                        "totalPresent": present
                    }
                }))
            },
        )
        .optional();

    let mut profile = match profile {
        Ok(Some(p)) => p,
        Ok(None) => return err(&req.id, "not_found", "student not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    // Attach the dashboard attendance section when one has been synced.
    let dashboard = conn
        .query_row(
            "SELECT total_classes, total_present, total_absent,
                    attendance_percentage, details, last_updated
             FROM student_dashboards WHERE student_id = ?",
            [&sid],
            |r| {
                let details_raw: String = r.get(4)?;
                let details: serde_json::Value =
                    serde_json::from_str(&details_raw).unwrap_or_else(|_| json!([]));
                Ok(json!({
                    "totalClasses": r.get::<_, i64>(0)?,
                    "totalPresent": r.get::<_, i64>(1)?,
                    "totalAbsent": r.get::<_, i64>(2)?,
                    "attendancePercentage": r.get::<_, i64>(3)?,
                    "attendanceRecords": details,
                    "lastUpdated": r.get::<_, Option<String>>(5)?
                }))
            },
        )
        .optional();

    match dashboard {
        Ok(Some(d)) => {
            profile["dashboard"] = d;
        }
        Ok(None) => {}
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }

    ok(&req.id, profile)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.create" => Some(handle_students_create(state, req)),
        "students.list" => Some(handle_students_list(state, req)),
        "students.get" => Some(handle_students_get(state, req)),
        _ => None,
    }
}
