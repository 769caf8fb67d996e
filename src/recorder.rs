use crate::rollup::AttendanceStatus;
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct BatchRecord {
    pub student_id: String,
    pub student_name: String,
    pub status: AttendanceStatus,
    pub remarks: Option<String>,
    pub hour: Option<i64>,
}

/// One submitted class session: a roster of per-student marks for a single
/// (date, subject, section).
#[derive(Debug, Clone)]
pub struct AttendanceBatch {
    pub date: String,
    pub subject: String,
    pub year: String,
    pub branch: String,
    pub section: String,
    pub faculty_id: String,
    pub faculty_name: String,
    pub records: Vec<BatchRecord>,
}

#[derive(Debug)]
pub enum RecordError {
    InvalidBatch(String),
    NotFound(String),
    Store(rusqlite::Error),
}

impl From<rusqlite::Error> for RecordError {
    fn from(e: rusqlite::Error) -> Self {
        RecordError::Store(e)
    }
}

#[derive(Debug)]
pub struct BatchOutcome {
    pub record_count: usize,
    /// Distinct (student_id, subject) pairs touched; the sync work list.
    pub touched: Vec<(String, String)>,
}

fn validate(batch: &AttendanceBatch) -> Result<(), RecordError> {
    if batch.records.is_empty() {
        return Err(RecordError::InvalidBatch(
            "records must not be empty".to_string(),
        ));
    }
    if NaiveDate::parse_from_str(&batch.date, "%Y-%m-%d").is_err() {
        return Err(RecordError::InvalidBatch(format!(
            "date must be YYYY-MM-DD, got {:?}",
            batch.date
        )));
    }
    // A batch is either hourly (every record slotted) or whole-day; the two
    // tracking modes never mix within one session.
    let with_hour = batch.records.iter().filter(|r| r.hour.is_some()).count();
    if with_hour != 0 && with_hour != batch.records.len() {
        return Err(RecordError::InvalidBatch(
            "hour must be set on all records or none".to_string(),
        ));
    }
    for r in &batch.records {
        if r.student_id.trim().is_empty() {
            return Err(RecordError::InvalidBatch(
                "record missing studentId".to_string(),
            ));
        }
        if let Some(h) = r.hour {
            if !(0..24).contains(&h) {
                return Err(RecordError::InvalidBatch(format!(
                    "hour out of range: {}",
                    h
                )));
            }
        }
    }
    Ok(())
}

fn find_event_id(
    conn: &Connection,
    date: &str,
    student_id: &str,
    subject: &str,
    hour: Option<i64>,
) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT id FROM attendance_events
         WHERE date = ? AND student_id = ? AND subject = ? AND hour IS ?",
        (date, student_id, subject, hour),
        |r| r.get(0),
    )
    .optional()
}

/// Idempotent bulk upsert: resubmitting a corrected roster replaces the
/// stored events under the same keys instead of accumulating duplicates.
/// All writes happen in one transaction; on failure nothing is written.
pub fn record_batch(
    conn: &Connection,
    batch: &AttendanceBatch,
    marked_at: &str,
) -> Result<BatchOutcome, RecordError> {
    validate(batch)?;

    let tx = conn.unchecked_transaction()?;
    let mut touched: Vec<(String, String)> = Vec::new();
    for rec in &batch.records {
        let existing = find_event_id(&tx, &batch.date, &rec.student_id, &batch.subject, rec.hour)?;
        match existing {
            Some(id) => {
                tx.execute(
                    "UPDATE attendance_events SET
                       student_name = ?, year = ?, branch = ?, section = ?,
                       status = ?, faculty_id = ?, faculty_name = ?,
                       remarks = ?, marked_at = ?
                     WHERE id = ?",
                    rusqlite::params![
                        rec.student_name,
                        batch.year,
                        batch.branch,
                        batch.section,
                        rec.status.as_str(),
                        batch.faculty_id,
                        batch.faculty_name,
                        rec.remarks,
                        marked_at,
                        id,
                    ],
                )?;
            }
            None => {
                tx.execute(
                    "INSERT INTO attendance_events(
                       id, date, student_id, student_name, subject, year, branch,
                       section, status, faculty_id, faculty_name, hour, remarks, marked_at)
                     VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                    rusqlite::params![
                        Uuid::new_v4().to_string(),
                        batch.date,
                        rec.student_id,
                        rec.student_name,
                        batch.subject,
                        batch.year,
                        batch.branch,
                        batch.section,
                        rec.status.as_str(),
                        batch.faculty_id,
                        batch.faculty_name,
                        rec.hour,
                        rec.remarks,
                        marked_at,
                    ],
                )?;
            }
        }
        let pair = (rec.student_id.clone(), batch.subject.clone());
        if !touched.contains(&pair) {
            touched.push(pair);
        }
    }
    tx.commit()?;

    Ok(BatchOutcome {
        record_count: batch.records.len(),
        touched,
    })
}

/// Moves one event to a different hour slot. Changing the hour changes the
/// upsert key, so this is an explicit move: the source row is re-keyed and
/// any event already sitting at the target slot is replaced, never leaving
/// two rows on one key or an orphan on the old one.
pub fn correct_hour(
    conn: &Connection,
    date: &str,
    student_id: &str,
    subject: &str,
    from_hour: Option<i64>,
    to_hour: Option<i64>,
) -> Result<(), RecordError> {
    if from_hour == to_hour {
        return Err(RecordError::InvalidBatch(
            "fromHour and toHour are the same slot".to_string(),
        ));
    }
    let tx = conn.unchecked_transaction()?;
    let source = find_event_id(&tx, date, student_id, subject, from_hour)?;
    let Some(source_id) = source else {
        return Err(RecordError::NotFound(format!(
            "no event at ({}, {}, {}, hour {:?})",
            date, student_id, subject, from_hour
        )));
    };
    if let Some(target_id) = find_event_id(&tx, date, student_id, subject, to_hour)? {
        tx.execute("DELETE FROM attendance_events WHERE id = ?", [&target_id])?;
    }
    tx.execute(
        "UPDATE attendance_events SET hour = ? WHERE id = ?",
        (to_hour, &source_id),
    )?;
    tx.commit()?;
    Ok(())
}
