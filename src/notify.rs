use crate::sync::DashboardSummary;
use serde_json::json;
use std::collections::VecDeque;

/// Change events fanned out after a sync pass. Best-effort: no replay, no
/// ordering guarantee across students within one batch.
#[derive(Debug, Clone)]
pub enum ChangeEvent {
    AttendanceBulkUpdate {
        date: String,
        subject: String,
        section: String,
        branch: String,
        record_count: usize,
        affected_students: Vec<String>,
    },
    StudentDataUpdate {
        student_id: String,
        total_classes: i64,
        total_present: i64,
        percentage: i64,
    },
}

impl ChangeEvent {
    pub fn student_data(student_id: &str, summary: &DashboardSummary) -> Self {
        Self::StudentDataUpdate {
            student_id: student_id.to_string(),
            total_classes: summary.total_classes,
            total_present: summary.total_present,
            percentage: summary.percentage,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::AttendanceBulkUpdate {
                date,
                subject,
                section,
                branch,
                record_count,
                affected_students,
            } => json!({
                "resource": "attendance",
                "action": "bulk-update",
                "date": date,
                "subject": subject,
                "section": section,
                "branch": branch,
                "recordCount": record_count,
                "affectedStudents": affected_students
            }),
            Self::StudentDataUpdate {
                student_id,
                total_classes,
                total_present,
                percentage,
            } => json!({
                "resource": "studentData",
                "action": "update",
                "studentId": student_id,
                "attendanceSummary": {
                    "totalClasses": total_classes,
                    "totalPresent": total_present,
                    "percentage": percentage
                }
            }),
        }
    }
}

pub trait Notifier {
    fn publish(&mut self, event: ChangeEvent);
}

/// In-process stand-in for the subscriber connection registry: events queue
/// up and connected front-ends drain them via `events.poll`. Fire-and-forget;
/// nothing is retried or replayed.
pub struct EventQueue {
    queue: VecDeque<ChangeEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    pub fn drain_json(&mut self) -> Vec<serde_json::Value> {
        self.queue.drain(..).map(|e| e.to_json()).collect()
    }
}

impl Notifier for EventQueue {
    fn publish(&mut self, event: ChangeEvent) {
        self.queue.push_back(event);
    }
}
