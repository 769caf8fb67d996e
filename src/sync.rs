use crate::db;
use crate::rollup::{self, EventRow};
use log::warn;
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;

/// Outcome of one projection write. Failures are recorded here (and logged)
/// instead of raised, so one broken projection never rolls back its siblings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectionStatus {
    Applied,
    Skipped(String),
    Failed(String),
}

impl ProjectionStatus {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Applied => json!("applied"),
            Self::Skipped(reason) => json!({ "skipped": reason }),
            Self::Failed(message) => json!({ "failed": message }),
        }
    }
}

/// Compact numbers handed to the change notifier after a dashboard write.
#[derive(Debug, Clone)]
pub struct DashboardSummary {
    pub total_classes: i64,
    pub total_present: i64,
    pub percentage: i64,
}

#[derive(Debug)]
pub struct SyncReport {
    pub student_id: String,
    pub summary: ProjectionStatus,
    pub dashboard: ProjectionStatus,
    pub enrollments: ProjectionStatus,
    pub dashboard_summary: Option<DashboardSummary>,
}

impl SyncReport {
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "studentId": self.student_id,
            "summary": self.summary.to_json(),
            "dashboard": self.dashboard.to_json(),
            "enrollments": self.enrollments.to_json()
        })
    }
}

fn details_json(events: &[EventRow]) -> serde_json::Value {
    let rows: Vec<serde_json::Value> = events
        .iter()
        .map(|e| {
            let mut row = json!({
                "courseName": e.subject,
                "date": e.date,
                "status": e.status.as_str(),
                "markedBy": e.faculty_name,
                "markedAt": e.marked_at
            });
            if let Some(h) = e.hour {
                row["hour"] = json!(h);
            }
            if let Some(remarks) = &e.remarks {
                row["remarks"] = json!(remarks);
            }
            row
        })
        .collect();
    json!(rows)
}

fn write_summary(
    conn: &Connection,
    student_id: &str,
    overall: &rollup::OverallRollup,
    now: &str,
) -> ProjectionStatus {
    match conn.execute(
        "UPDATE students SET total_classes = ?, total_present = ?, updated_at = ?
         WHERE sid = ?",
        (overall.total, overall.present, now, student_id),
    ) {
        Ok(0) => ProjectionStatus::Skipped("student profile not found".to_string()),
        Ok(_) => ProjectionStatus::Applied,
        Err(e) => {
            warn!("summary sync failed for {}: {}", student_id, e);
            ProjectionStatus::Failed(e.to_string())
        }
    }
}

fn write_dashboard(
    conn: &Connection,
    student_id: &str,
    events: &[EventRow],
    overall: &rollup::OverallRollup,
    now: &str,
) -> ProjectionStatus {
    // The dashboard hangs off the student profile; without the profile row
    // there is nothing to attach it to. Skip and let the next sync heal it.
    let profile: Result<Option<String>, _> = conn
        .query_row("SELECT id FROM students WHERE sid = ?", [student_id], |r| {
            r.get(0)
        })
        .optional();
    match profile {
        Ok(Some(_)) => {}
        Ok(None) => {
            warn!(
                "dashboard sync skipped for {}: student profile not found",
                student_id
            );
            return ProjectionStatus::Skipped("student profile not found".to_string());
        }
        Err(e) => {
            warn!("dashboard profile lookup failed for {}: {}", student_id, e);
            return ProjectionStatus::Failed(e.to_string());
        }
    }

    let details = details_json(events).to_string();
    match conn.execute(
        "INSERT INTO student_dashboards(
           student_id, total_classes, total_present, total_absent,
           attendance_percentage, details, last_updated)
         VALUES(?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(student_id) DO UPDATE SET
           total_classes = excluded.total_classes,
           total_present = excluded.total_present,
           total_absent = excluded.total_absent,
           attendance_percentage = excluded.attendance_percentage,
           details = excluded.details,
           last_updated = excluded.last_updated",
        rusqlite::params![
            student_id,
            overall.total,
            overall.present,
            overall.absent,
            overall.percentage(),
            details,
            now,
        ],
    ) {
        Ok(_) => ProjectionStatus::Applied,
        Err(e) => {
            warn!("dashboard sync failed for {}: {}", student_id, e);
            ProjectionStatus::Failed(e.to_string())
        }
    }
}

fn write_enrollments(
    conn: &Connection,
    student_id: &str,
    events: &[EventRow],
    subjects: &[String],
    now: &str,
) -> ProjectionStatus {
    let per_subject = rollup::subject_rollups(events);
    for subject in subjects {
        let (total, present) = per_subject
            .iter()
            .find(|s| &s.subject == subject)
            .map(|s| (s.total, s.present))
            .unwrap_or((0, 0));
        // Every enrollment link on (student, subject) gets the same numbers,
        // including links through different faculty.
        let result = conn.execute(
            "UPDATE enrollments SET
               attendance_percentage = ?, total_classes = ?, total_present = ?,
               last_activity_at = ?
             WHERE student_id = ? AND subject = ?",
            rusqlite::params![
                rollup::percent(present, total),
                total,
                present,
                now,
                student_id,
                subject,
            ],
        );
        if let Err(e) = result {
            warn!(
                "enrollment sync failed for ({}, {}): {}",
                student_id, subject, e
            );
            return ProjectionStatus::Failed(e.to_string());
        }
    }
    ProjectionStatus::Applied
}

/// Rewrites all three derived projections for one student from current event
/// store state. Always a full rewrite, never an incremental patch; each
/// projection is best-effort relative to the others. Only the initial event
/// load is fatal (the store itself is unreachable).
pub fn sync_student(
    conn: &Connection,
    student_id: &str,
    subjects: &[String],
    now: &str,
) -> rusqlite::Result<SyncReport> {
    let events = db::load_student_events(conn, student_id)?;
    let overall = rollup::overall_rollup(&events);

    let summary = write_summary(conn, student_id, &overall, now);
    let dashboard = write_dashboard(conn, student_id, &events, &overall, now);
    let enrollments = write_enrollments(conn, student_id, &events, subjects, now);

    let dashboard_summary = if dashboard == ProjectionStatus::Applied {
        Some(DashboardSummary {
            total_classes: overall.total,
            total_present: overall.present,
            percentage: overall.percentage(),
        })
    } else {
        None
    };

    Ok(SyncReport {
        student_id: student_id.to_string(),
        summary,
        dashboard,
        enrollments,
        dashboard_summary,
    })
}
