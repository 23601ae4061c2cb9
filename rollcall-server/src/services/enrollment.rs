//! Background enrollment of a registration photo
//!
//! Registration responds immediately; the recognizer is asked to enroll the
//! photo afterwards and the returned template is attached to the student.

use rollcall_common::db::Student;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::db::students;
use crate::services::recognizer::EnrollmentOutcome;
use crate::services::upload::TempUpload;
use crate::AppState;

/// Enroll `photo` for `student` on a background task
///
/// The photo is removed when the task finishes, whatever the outcome.
pub fn spawn_enrollment(state: &AppState, student: Student, photo: TempUpload) -> JoinHandle<()> {
    let state = state.clone();
    tokio::spawn(async move {
        enroll(&state, &student, &photo).await;
        photo.cleanup().await;
    })
}

async fn enroll(state: &AppState, student: &Student, photo: &TempUpload) {
    let outcome = state
        .recognizer
        .register(photo.path(), &student.student_code)
        .await;

    let failure = match outcome {
        Ok(EnrollmentOutcome::Enrolled {
            template: Some(template),
            ..
        }) => match students::set_face_template(&state.db, student.id, &template).await {
            Ok(true) => {
                info!(student_id = student.id, bytes = template.len(), "Face template enrolled");
                return;
            }
            Ok(false) => format!("Student {} vanished before enrollment finished", student.id),
            Err(e) => format!("Failed to store face template for {}: {}", student.student_code, e),
        },
        Ok(EnrollmentOutcome::Enrolled { template: None, .. }) => {
            info!(student_id = student.id, "Recognizer enrolled face without returning a template");
            return;
        }
        Ok(EnrollmentOutcome::Rejected { message }) => {
            format!("Enrollment rejected for {}: {}", student.student_code, message)
        }
        Err(e) => format!("Enrollment failed for {}: {}", student.student_code, e),
    };

    warn!(student_id = student.id, "{}", failure);
    state.record_error(failure).await;
}
