use crate::rollup::{AttendanceStatus, EventRow};
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("campus.sqlite3");
    let conn = Connection::open(db_path)?;
    // Another process holding the file surfaces as a bounded error instead
    // of an indefinite wait.
    conn.busy_timeout(Duration::from_secs(5))?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            sid TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            year TEXT NOT NULL,
            branch TEXT NOT NULL,
            section TEXT NOT NULL,
            email TEXT,
            total_classes INTEGER NOT NULL DEFAULT 0,
            total_present INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_roster ON students(year, section, branch)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS faculty(
            id TEXT PRIMARY KEY,
            faculty_id TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            email TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS enrollments(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            student_name TEXT NOT NULL,
            faculty_id TEXT NOT NULL,
            faculty_name TEXT NOT NULL,
            subject TEXT NOT NULL,
            year TEXT,
            branch TEXT,
            section TEXT,
            status TEXT NOT NULL DEFAULT 'active',
            attendance_percentage INTEGER NOT NULL DEFAULT 0,
            total_classes INTEGER NOT NULL DEFAULT 0,
            total_present INTEGER NOT NULL DEFAULT 0,
            last_activity_at TEXT,
            UNIQUE(student_id, faculty_id, subject)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_enrollments_student ON enrollments(student_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_enrollments_faculty ON enrollments(faculty_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_enrollments_student_subject
         ON enrollments(student_id, subject)",
        [],
    )?;

    // One row per attendance fact. The logical upsert key is
    // (date, student_id, subject, hour-or-null); the recorder enforces it
    // with a select-then-write inside a transaction, since a NULL hour does
    // not dedupe under a plain unique index.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance_events(
            id TEXT PRIMARY KEY,
            date TEXT NOT NULL,
            student_id TEXT NOT NULL,
            student_name TEXT NOT NULL,
            subject TEXT NOT NULL,
            year TEXT NOT NULL,
            branch TEXT NOT NULL,
            section TEXT NOT NULL,
            status TEXT NOT NULL,
            faculty_id TEXT NOT NULL,
            faculty_name TEXT NOT NULL,
            hour INTEGER,
            remarks TEXT,
            marked_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_events_student
         ON attendance_events(student_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_events_key
         ON attendance_events(date, student_id, subject)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_events_faculty
         ON attendance_events(faculty_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS student_dashboards(
            student_id TEXT PRIMARY KEY,
            total_classes INTEGER NOT NULL DEFAULT 0,
            total_present INTEGER NOT NULL DEFAULT 0,
            total_absent INTEGER NOT NULL DEFAULT 0,
            attendance_percentage INTEGER NOT NULL DEFAULT 0,
            details TEXT NOT NULL DEFAULT '[]',
            last_updated TEXT
        )",
        [],
    )?;

    Ok(conn)
}

/// All stored events for one student, in the stable detail-list order:
/// date, then hour slot, then subject.
pub fn load_student_events(
    conn: &Connection,
    student_id: &str,
) -> rusqlite::Result<Vec<EventRow>> {
    let mut stmt = conn.prepare(
        "SELECT date, subject, status, hour, faculty_name, marked_at, remarks
         FROM attendance_events
         WHERE student_id = ?
         ORDER BY date, hour, subject",
    )?;
    let rows = stmt.query_map([student_id], |r| {
        let status_raw: String = r.get(2)?;
        Ok(EventRow {
            date: r.get(0)?,
            subject: r.get(1)?,
            status: AttendanceStatus::parse(&status_raw).unwrap_or(AttendanceStatus::Absent),
            hour: r.get(3)?,
            faculty_name: r.get(4)?,
            marked_at: r.get(5)?,
            remarks: r.get(6)?,
        })
    })?;
    rows.collect()
}
