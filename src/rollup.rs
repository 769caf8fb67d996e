use serde_json::json;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceStatus {
    Present,
    Absent,
    Leave,
    Late,
}

impl AttendanceStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Present" => Some(Self::Present),
            "Absent" => Some(Self::Absent),
            "Leave" => Some(Self::Leave),
            "Late" => Some(Self::Late),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Present => "Present",
            Self::Absent => "Absent",
            Self::Leave => "Leave",
            Self::Late => "Late",
        }
    }
}

/// One stored attendance fact, as loaded from the event store.
#[derive(Debug, Clone)]
pub struct EventRow {
    pub date: String,
    pub subject: String,
    pub status: AttendanceStatus,
    pub hour: Option<i64>,
    pub faculty_name: String,
    pub marked_at: String,
    pub remarks: Option<String>,
}

/// `round(100 * present / total)`, 0 when total is 0. Rounding is half away
/// from zero on the non-negative ratio, matching the source system.
pub fn percent(present: i64, total: i64) -> i64 {
    if total <= 0 {
        0
    } else {
        ((present as f64 / total as f64) * 100.0).round() as i64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverallRollup {
    pub total: i64,
    pub present: i64,
    pub absent: i64,
}

impl OverallRollup {
    pub fn percentage(&self) -> i64 {
        percent(self.present, self.total)
    }
}

pub fn overall_rollup(events: &[EventRow]) -> OverallRollup {
    let mut out = OverallRollup {
        total: 0,
        present: 0,
        absent: 0,
    };
    for e in events {
        out.total += 1;
        match e.status {
            AttendanceStatus::Present => out.present += 1,
            AttendanceStatus::Absent => out.absent += 1,
            _ => {}
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectRollup {
    pub subject: String,
    pub total: i64,
    pub present: i64,
    pub absent: i64,
}

impl SubjectRollup {
    pub fn percentage(&self) -> i64 {
        percent(self.present, self.total)
    }
}

/// Per-subject rollups, sorted by subject name for stable output.
pub fn subject_rollups(events: &[EventRow]) -> Vec<SubjectRollup> {
    let mut by_subject: BTreeMap<&str, (i64, i64, i64)> = BTreeMap::new();
    for e in events {
        let entry = by_subject.entry(e.subject.as_str()).or_insert((0, 0, 0));
        entry.0 += 1;
        match e.status {
            AttendanceStatus::Present => entry.1 += 1,
            AttendanceStatus::Absent => entry.2 += 1,
            _ => {}
        }
    }
    by_subject
        .into_iter()
        .map(|(subject, (total, present, absent))| SubjectRollup {
            subject: subject.to_string(),
            total,
            present,
            absent,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayTier {
    Regular,
    Irregular,
    Absent,
}

impl DayTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Regular => "Regular",
            Self::Irregular => "Irregular",
            Self::Absent => "Absent",
        }
    }
}

/// Fixed business rule: >=75 Regular, 40-74 Irregular, below 40 Absent.
/// Classified on the already-rounded day percentage.
pub fn classify_day(percentage: i64) -> DayTier {
    if percentage >= 75 {
        DayTier::Regular
    } else if percentage >= 40 {
        DayTier::Irregular
    } else {
        DayTier::Absent
    }
}

#[derive(Debug, Clone)]
pub struct HourDetail {
    pub hour: i64,
    pub subject: String,
    pub status: AttendanceStatus,
    pub faculty_name: String,
}

#[derive(Debug, Clone)]
pub struct DayRollup {
    pub date: String,
    pub total_hours: i64,
    pub present_hours: i64,
    pub hours: Vec<HourDetail>,
}

impl DayRollup {
    pub fn percentage(&self) -> i64 {
        percent(self.present_hours, self.total_hours)
    }

    pub fn tier(&self) -> DayTier {
        classify_day(self.percentage())
    }
}

/// Per-day classification over hour-slot events. Whole-day events (no hour)
/// belong to the other tracking mode and are ignored here; an empty result
/// means the student has no hourly data at all.
pub fn day_rollups(events: &[EventRow]) -> Vec<DayRollup> {
    let mut by_date: BTreeMap<&str, Vec<&EventRow>> = BTreeMap::new();
    for e in events {
        if e.hour.is_some() {
            by_date.entry(e.date.as_str()).or_default().push(e);
        }
    }
    by_date
        .into_iter()
        .map(|(date, rows)| {
            let mut hours: Vec<HourDetail> = rows
                .iter()
                .map(|e| HourDetail {
                    hour: e.hour.unwrap_or(0),
                    subject: e.subject.clone(),
                    status: e.status,
                    faculty_name: e.faculty_name.clone(),
                })
                .collect();
            hours.sort_by_key(|h| h.hour);
            let total_hours = hours.len() as i64;
            let present_hours = hours
                .iter()
                .filter(|h| h.status == AttendanceStatus::Present)
                .count() as i64;
            DayRollup {
                date: date.to_string(),
                total_hours,
                present_hours,
                hours,
            }
        })
        .collect()
}

pub fn overall_json(overall: &OverallRollup) -> serde_json::Value {
    json!({
        "totalClasses": overall.total,
        "totalPresent": overall.present,
        "totalAbsent": overall.absent,
        "percentage": overall.percentage()
    })
}

pub fn subjects_json(subjects: &[SubjectRollup]) -> serde_json::Value {
    let rows: Vec<serde_json::Value> = subjects
        .iter()
        .map(|s| {
            json!({
                "subject": s.subject,
                "totalClasses": s.total,
                "totalPresent": s.present,
                "totalAbsent": s.absent,
                "percentage": s.percentage()
            })
        })
        .collect();
    json!(rows)
}

pub fn daily_json(days: &[DayRollup]) -> serde_json::Value {
    let rows: Vec<serde_json::Value> = days
        .iter()
        .map(|d| {
            let hours: Vec<serde_json::Value> = d
                .hours
                .iter()
                .map(|h| {
                    json!({
                        "hour": h.hour,
                        "subject": h.subject,
                        "status": h.status.as_str(),
                        "facultyName": h.faculty_name
                    })
                })
                .collect();
            json!({
                "date": d.date,
                "totalHours": d.total_hours,
                "presentHours": d.present_hours,
                "percentage": d.percentage(),
                "classification": d.tier().as_str(),
                "hours": hours
            })
        })
        .collect();
    json!(rows)
}
