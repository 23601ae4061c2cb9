//! Manual attendance and per-class/per-student views

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use rollcall_common::db::{AttendanceRecord, AttendanceStatus};
use rollcall_common::time::{now, parse_day};
use serde::Deserialize;

use crate::api::caller::Caller;
use crate::api::extract::{ApiJson, ApiPath};
use crate::db::attendance::{self, ClassAttendanceEntry};
use crate::db::classes;
use crate::services::attendance_writer::{mark_manual, ManualMark};
use crate::services::statistics::{student_stats, AttendanceStats};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualMarkRequest {
    pub student_id: i64,
    pub class_id: i64,
    pub status: AttendanceStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

/// POST /api/attendance
pub async fn create_attendance(
    State(state): State<AppState>,
    caller: Caller,
    ApiJson(request): ApiJson<ManualMarkRequest>,
) -> ApiResult<(StatusCode, Json<AttendanceRecord>)> {
    let mark = ManualMark {
        student_id: request.student_id,
        class_id: request.class_id,
        status: request.status,
        notes: request.notes.filter(|notes| !notes.trim().is_empty()),
        marked_by: caller.user_id(),
        marked_at: now(),
    };

    let record = mark_manual(&state.db, &mark).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /api/attendance/class/:class_id/date/:date
pub async fn class_attendance(
    State(state): State<AppState>,
    ApiPath((class_id, date)): ApiPath<(i64, String)>,
) -> ApiResult<Json<Vec<ClassAttendanceEntry>>> {
    let day = parse_day(&date)?;

    if classes::get_class(&state.db, class_id).await?.is_none() {
        return Err(ApiError::NotFound(format!("Class not found: {}", class_id)));
    }

    let entries = attendance::list_by_class_and_day(&state.db, class_id, day).await?;
    Ok(Json(entries))
}

/// GET /api/attendance/student/:student_id
pub async fn student_attendance(
    State(state): State<AppState>,
    ApiPath(student_id): ApiPath<i64>,
) -> ApiResult<Json<AttendanceStats>> {
    Ok(Json(student_stats(&state.db, student_id).await?))
}

pub fn attendance_routes() -> Router<AppState> {
    Router::new()
        .route("/api/attendance", post(create_attendance))
        .route("/api/attendance/class/:class_id/date/:date", get(class_attendance))
        .route("/api/attendance/student/:student_id", get(student_attendance))
}
