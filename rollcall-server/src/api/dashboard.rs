//! Dashboard statistics endpoints

use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use rollcall_common::time::today;

use crate::api::extract::ApiPath;
use crate::services::statistics::{self, AttendanceStats, ChildStats, TeacherStats};
use crate::{ApiResult, AppState};

/// GET /api/dashboard/teacher/:teacher_id
pub async fn teacher_dashboard(
    State(state): State<AppState>,
    ApiPath(teacher_id): ApiPath<i64>,
) -> ApiResult<Json<TeacherStats>> {
    Ok(Json(statistics::teacher_stats(&state.db, teacher_id, today()).await?))
}

/// GET /api/dashboard/student/:student_id
pub async fn student_dashboard(
    State(state): State<AppState>,
    ApiPath(student_id): ApiPath<i64>,
) -> ApiResult<Json<AttendanceStats>> {
    Ok(Json(statistics::student_stats(&state.db, student_id).await?))
}

/// GET /api/dashboard/parent/:parent_id
pub async fn parent_dashboard(
    State(state): State<AppState>,
    ApiPath(parent_id): ApiPath<i64>,
) -> ApiResult<Json<Vec<ChildStats>>> {
    Ok(Json(statistics::parent_stats(&state.db, parent_id).await?))
}

pub fn dashboard_routes() -> Router<AppState> {
    Router::new()
        .route("/api/dashboard/teacher/:teacher_id", get(teacher_dashboard))
        .route("/api/dashboard/student/:student_id", get(student_dashboard))
        .route("/api/dashboard/parent/:parent_id", get(parent_dashboard))
}
