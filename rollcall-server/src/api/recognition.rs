//! Facial-recognition attendance intake
//!
//! Upload → recognizer → attendance writer → guardian notices.

use axum::{
    extract::State,
    routing::post,
    Json, Router,
};
use rollcall_common::time::now;
use serde::Serialize;
use tracing::info;

use crate::api::caller::Caller;
use crate::api::extract::ApiMultipart;
use crate::api::multipart::UploadForm;
use crate::db::classes;
use crate::services::attendance_writer::{mark_recognized, MarkedAttendance, RecognitionBatch, WriterOptions};
use crate::services::notification_dispatcher::dispatch_recognition_notices;
use crate::services::recognizer::{Recognition, RecognitionOutcome};
use crate::services::upload::{validate_image, TempUpload, UploadError};
use crate::{ApiError, ApiResult, AppState};

/// Recognition intake response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionResponse {
    pub success: bool,
    pub message: String,
    /// Recognitions returned by the engine (N)
    pub recognized_students: usize,
    /// Entries created (M)
    pub attendance_marked: usize,
    pub already_marked: usize,
    pub unresolved: usize,
    pub below_threshold: usize,
    pub total_faces: u32,
    pub notifications_sent: usize,
    pub already_marked_students: Vec<String>,
    pub unresolved_identities: Vec<String>,
    pub recognitions: Vec<Recognition>,
    pub records: Vec<MarkedAttendance>,
}

/// POST /api/attendance/facial-recognition
///
/// Multipart fields: `image` (file) and `classId`.
pub async fn recognize_attendance(
    State(state): State<AppState>,
    caller: Caller,
    ApiMultipart(multipart): ApiMultipart,
) -> ApiResult<Json<RecognitionResponse>> {
    let max_bytes = state.settings.max_upload_bytes;
    let mut form = UploadForm::read(multipart, "image", max_bytes).await?;

    let image = form.take_file().ok_or(UploadError::Missing("image"))?;
    let class_id = form.require_i64("classId")?;
    let extension = validate_image(&image, max_bytes)?;

    if classes::get_class(&state.db, class_id).await?.is_none() {
        return Err(ApiError::NotFound(format!("Class not found: {}", class_id)));
    }

    let upload = TempUpload::persist(&state.settings.upload_dir, &image, extension).await?;
    let outcome = state.recognizer.recognize(upload.path()).await;
    upload.cleanup().await;

    let result = match outcome? {
        RecognitionOutcome::Recognized(result) => result,
        RecognitionOutcome::Rejected { message } => {
            info!(class_id, message = %message, "Recognizer rejected image");
            return Err(ApiError::RecognitionRejected(message));
        }
    };

    let batch = RecognitionBatch {
        class_id,
        marked_by: caller.user_id(),
        marked_at: now(),
        recognitions: &result.recognitions,
    };
    let written = mark_recognized(&state.db, &batch, WriterOptions::from(state.settings.as_ref())).await?;

    let report = dispatch_recognition_notices(&state.db, &written.marked).await;
    if report.failed > 0 {
        state
            .record_error(format!("{} attendance notification(s) failed to send", report.failed))
            .await;
    }

    Ok(Json(RecognitionResponse {
        success: true,
        message: format!(
            "Successfully marked attendance for {} students",
            written.marked_count()
        ),
        recognized_students: written.recognized,
        attendance_marked: written.marked_count(),
        already_marked: written.already_marked.len(),
        unresolved: written.unresolved.len(),
        below_threshold: written.below_threshold,
        total_faces: result.total_faces,
        notifications_sent: report.sent,
        already_marked_students: written.already_marked,
        unresolved_identities: written.unresolved,
        recognitions: result.recognitions,
        records: written.marked,
    }))
}

pub fn recognition_routes() -> Router<AppState> {
    Router::new().route("/api/attendance/facial-recognition", post(recognize_attendance))
}
