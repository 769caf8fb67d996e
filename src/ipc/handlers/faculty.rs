use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use uuid::Uuid;

fn required_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn handle_faculty_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "store_unavailable", "select a workspace first", None);
    };
    let Some(faculty_id) = required_str(&req.params, "facultyId") else {
        return err(&req.id, "bad_params", "missing facultyId", None);
    };
    let Some(name) = required_str(&req.params, "name") else {
        return err(&req.id, "bad_params", "missing name", None);
    };
    let email = required_str(&req.params, "email");

    let id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO faculty(id, faculty_id, name, email) VALUES(?, ?, ?, ?)",
        rusqlite::params![id, faculty_id, name, email],
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "faculty" })),
        );
    }

    ok(&req.id, json!({ "id": id, "facultyId": faculty_id, "name": name }))
}

fn handle_faculty_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "faculty": [] }));
    };

    let mut stmt = match conn.prepare(
        "SELECT f.faculty_id, f.name, f.email,
           (SELECT COUNT(*) FROM enrollments e WHERE e.faculty_id = f.faculty_id) AS enrollment_count
         FROM faculty f
         ORDER BY f.faculty_id",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([], |r| {
            Ok(json!({
                "facultyId": r.get::<_, String>(0)?,
                "name": r.get::<_, String>(1)?,
                "email": r.get::<_, Option<String>>(2)?,
                "enrollmentCount": r.get::<_, i64>(3)?
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(faculty) => ok(&req.id, json!({ "faculty": faculty })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "faculty.create" => Some(handle_faculty_create(state, req)),
        "faculty.list" => Some(handle_faculty_list(state, req)),
        _ => None,
    }
}
