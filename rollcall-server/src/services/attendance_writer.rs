//! Attendance writer
//!
//! The only producer of attendance entries. Recognition batches are resolved
//! against the student table up front, then written in a single transaction
//! so a batch is all-or-nothing. At most one entry exists per
//! (student, class, day); what happens on a repeat is governed by
//! [`DuplicatePolicy`].

use chrono::{DateTime, Utc};
use rollcall_common::config::DuplicatePolicy;
use rollcall_common::db::{
    AttendanceRecord, AttendanceStatus, MarkMethod, NewAttendanceRecord, Student,
};
use rollcall_common::time::attendance_day;
use rollcall_common::{Error, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::config::ServiceSettings;
use crate::db::{attendance, classes, students};
use crate::services::recognizer::Recognition;

/// Writer policy knobs
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WriterOptions {
    pub duplicate_policy: DuplicatePolicy,
    /// Matches below this confidence are dropped before writing
    pub min_confidence: Option<f64>,
}

impl From<&ServiceSettings> for WriterOptions {
    fn from(settings: &ServiceSettings) -> Self {
        Self {
            duplicate_policy: settings.duplicate_policy,
            min_confidence: settings.min_confidence,
        }
    }
}

/// Recognized identities to record for one class
#[derive(Debug, Clone)]
pub struct RecognitionBatch<'a> {
    pub class_id: i64,
    /// Marking actor; `None` when the caller is anonymous
    pub marked_by: Option<i64>,
    pub marked_at: DateTime<Utc>,
    pub recognitions: &'a [Recognition],
}

/// A created entry and the student it belongs to
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkedAttendance {
    #[serde(flatten)]
    pub record: AttendanceRecord,
    pub student: Student,
}

/// Result of writing one recognition batch
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// Number of recognitions received (N)
    pub recognized: usize,
    /// Entries created by this batch (M of them)
    pub marked: Vec<MarkedAttendance>,
    /// Identities that matched no active student
    pub unresolved: Vec<String>,
    /// Student codes that already had an entry for the class and day
    pub already_marked: Vec<String>,
    /// Recognitions dropped by the confidence floor
    pub below_threshold: usize,
}

impl BatchOutcome {
    pub fn marked_count(&self) -> usize {
        self.marked.len()
    }
}

/// Best confidence per identity, in first-seen order
fn collapse_by_identity<'a>(
    recognitions: impl Iterator<Item = &'a Recognition>,
) -> Vec<(String, f64)> {
    let mut order: Vec<(String, f64)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for recognition in recognitions {
        match index.get(&recognition.identity_id) {
            Some(&i) => {
                if recognition.confidence > order[i].1 {
                    order[i].1 = recognition.confidence;
                }
            }
            None => {
                index.insert(recognition.identity_id.clone(), order.len());
                order.push((recognition.identity_id.clone(), recognition.confidence));
            }
        }
    }

    order
}

/// Record attendance for every resolvable identity in `batch`
///
/// Unresolved identities are counted, never fatal. Under
/// [`DuplicatePolicy::Reject`] an existing entry fails the whole batch with
/// [`Error::Conflict`] and nothing is written.
pub async fn mark_recognized(
    pool: &SqlitePool,
    batch: &RecognitionBatch<'_>,
    options: WriterOptions,
) -> Result<BatchOutcome> {
    let class = classes::get_class(pool, batch.class_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Class not found: {}", batch.class_id)))?;

    let mut outcome = BatchOutcome {
        recognized: batch.recognitions.len(),
        ..Default::default()
    };

    let accepted = batch.recognitions.iter().filter(|r| match options.min_confidence {
        Some(floor) if r.confidence < floor => {
            outcome.below_threshold += 1;
            false
        }
        _ => true,
    });
    let identities = collapse_by_identity(accepted);

    // Resolve before opening the transaction; distinct identities naming the
    // same student (code and numeric id) also collapse here
    let mut resolved: Vec<(Student, f64)> = Vec::new();
    for (identity, confidence) in identities {
        match students::resolve_identity(pool, &identity).await? {
            Some(student) => match resolved.iter_mut().find(|(s, _)| s.id == student.id) {
                Some(existing) => existing.1 = existing.1.max(confidence),
                None => resolved.push((student, confidence)),
            },
            None => {
                debug!(identity = %identity, "Recognized identity has no active student");
                outcome.unresolved.push(identity);
            }
        }
    }

    let day = attendance_day(batch.marked_at);
    let mut tx = pool.begin().await?;

    for (student, confidence) in resolved {
        let entry = NewAttendanceRecord {
            student_id: student.id,
            class_id: class.id,
            attendance_date: day,
            status: AttendanceStatus::Present,
            marked_at: batch.marked_at,
            recognition_confidence: Some(confidence),
            notes: None,
            marked_by: batch.marked_by,
            method: MarkMethod::FacialRecognition,
        };

        match options.duplicate_policy {
            DuplicatePolicy::Skip => {
                match attendance::insert_record_if_absent(&mut tx, &entry).await? {
                    Some(record) => outcome.marked.push(MarkedAttendance { record, student }),
                    None => outcome.already_marked.push(student.student_code),
                }
            }
            DuplicatePolicy::Reject => match attendance::insert_record(&mut tx, &entry).await {
                Ok(record) => outcome.marked.push(MarkedAttendance { record, student }),
                // Dropping `tx` rolls back everything written so far
                Err(e) if e.is_unique_violation() => {
                    return Err(Error::Conflict(format!(
                        "Attendance already marked for {} in class {} on {}",
                        student.student_code, class.id, day
                    )));
                }
                Err(e) => return Err(e),
            },
        }
    }

    tx.commit().await?;

    info!(
        class_id = class.id,
        %day,
        recognized = outcome.recognized,
        marked = outcome.marked_count(),
        already_marked = outcome.already_marked.len(),
        unresolved = outcome.unresolved.len(),
        below_threshold = outcome.below_threshold,
        "Recorded recognition attendance"
    );

    Ok(outcome)
}

/// A single teacher-entered attendance mark
#[derive(Debug, Clone)]
pub struct ManualMark {
    pub student_id: i64,
    pub class_id: i64,
    pub status: AttendanceStatus,
    pub notes: Option<String>,
    pub marked_by: Option<i64>,
    pub marked_at: DateTime<Utc>,
}

/// Record one manual entry; a repeat for the same day is a conflict
pub async fn mark_manual(pool: &SqlitePool, mark: &ManualMark) -> Result<AttendanceRecord> {
    let student = students::get_student(pool, mark.student_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Student not found: {}", mark.student_id)))?;
    if !student.is_active {
        return Err(Error::InvalidInput(format!(
            "Student {} is deactivated",
            student.student_code
        )));
    }
    classes::get_class(pool, mark.class_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Class not found: {}", mark.class_id)))?;

    let day = attendance_day(mark.marked_at);
    let entry = NewAttendanceRecord {
        student_id: student.id,
        class_id: mark.class_id,
        attendance_date: day,
        status: mark.status,
        marked_at: mark.marked_at,
        recognition_confidence: None,
        notes: mark.notes.clone(),
        marked_by: mark.marked_by,
        method: MarkMethod::Manual,
    };

    let mut conn = pool.acquire().await?;
    let record = attendance::insert_record(&mut conn, &entry)
        .await
        .map_err(|e| {
            if e.is_unique_violation() {
                Error::Conflict(format!(
                    "Attendance already marked for {} in class {} on {}",
                    student.student_code, mark.class_id, day
                ))
            } else {
                e
            }
        })?;

    info!(
        student_id = student.id,
        class_id = mark.class_id,
        status = %mark.status,
        "Recorded manual attendance"
    );

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recognition(identity: &str, confidence: f64) -> Recognition {
        Recognition {
            identity_id: identity.to_string(),
            confidence,
            bounding_box: None,
        }
    }

    #[test]
    fn test_collapse_keeps_highest_confidence_in_order() {
        let input = [
            recognition("STU002", 80.0),
            recognition("STU001", 70.0),
            recognition("STU002", 94.2),
            recognition("STU002", 90.0),
        ];

        let collapsed = collapse_by_identity(input.iter());
        assert_eq!(
            collapsed,
            vec![("STU002".to_string(), 94.2), ("STU001".to_string(), 70.0)]
        );
    }

    #[test]
    fn test_options_follow_settings() {
        let mut settings = ServiceSettings::with_upload_dir("/tmp/uploads");
        settings.duplicate_policy = DuplicatePolicy::Reject;
        settings.min_confidence = Some(60.0);

        let options = WriterOptions::from(&settings);
        assert_eq!(options.duplicate_policy, DuplicatePolicy::Reject);
        assert_eq!(options.min_confidence, Some(60.0));
    }
}
