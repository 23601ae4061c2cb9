//! Student registration and roster endpoints

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use rollcall_common::db::{Role, Student};
use serde::Serialize;
use tracing::info;

use crate::api::extract::{ApiMultipart, ApiPath};
use crate::api::multipart::UploadForm;
use crate::db::students::{self, NewStudent};
use crate::db::users;
use crate::services::enrollment::spawn_enrollment;
use crate::services::upload::{validate_image, TempUpload};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponse {
    pub student: Student,
    /// A photo was accepted and is being enrolled in the background
    pub enrollment_pending: bool,
}

/// GET /api/students
pub async fn list_students(State(state): State<AppState>) -> ApiResult<Json<Vec<Student>>> {
    Ok(Json(students::list_active_students(&state.db).await?))
}

/// POST /api/students
///
/// Multipart fields: `studentCode`, `firstName`, `lastName`, `grade`,
/// `section`, optional `parentId`, `userId`, `profileImage` and `photo`.
pub async fn register_student(
    State(state): State<AppState>,
    ApiMultipart(multipart): ApiMultipart,
) -> ApiResult<(StatusCode, Json<RegistrationResponse>)> {
    let max_bytes = state.settings.max_upload_bytes;
    let mut form = UploadForm::read(multipart, "photo", max_bytes).await?;

    let new_student = NewStudent {
        student_code: form.require_text("studentCode")?.to_string(),
        user_id: form.optional_i64("userId")?,
        first_name: form.require_text("firstName")?.to_string(),
        last_name: form.require_text("lastName")?.to_string(),
        grade: form.require_text("grade")?.to_string(),
        section: form.require_text("section")?.to_string(),
        parent_id: form.optional_i64("parentId")?,
        profile_image: form.text("profileImage").map(str::to_string),
    };

    if let Some(parent_id) = new_student.parent_id {
        match users::get_user(&state.db, parent_id).await? {
            Some(user) if user.role == Role::Parent => {}
            Some(_) => {
                return Err(ApiError::BadRequest(format!("User {} is not a parent", parent_id)));
            }
            None => return Err(ApiError::BadRequest(format!("Unknown parent: {}", parent_id))),
        }
    }

    // Validate and store the photo before the student row is written; if
    // the insert fails the upload is dropped and removed
    let upload = match form.take_file() {
        Some(bytes) => {
            let extension = validate_image(&bytes, max_bytes)?;
            Some(TempUpload::persist(&state.settings.upload_dir, &bytes, extension).await?)
        }
        None => None,
    };

    let student = students::create_student(&state.db, &new_student).await?;
    info!(student_id = student.id, code = %student.student_code, "Registered student");

    let enrollment_pending = match upload {
        Some(upload) => {
            spawn_enrollment(&state, student.clone(), upload);
            true
        }
        None => false,
    };

    Ok((
        StatusCode::CREATED,
        Json(RegistrationResponse {
            student,
            enrollment_pending,
        }),
    ))
}

/// PATCH /api/students/:id/deactivate
pub async fn deactivate_student(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Student>> {
    let student = students::deactivate_student(&state.db, id).await?;
    info!(student_id = id, "Deactivated student");
    Ok(Json(student))
}

pub fn student_routes() -> Router<AppState> {
    Router::new()
        .route("/api/students", get(list_students).post(register_student))
        .route("/api/students/:id/deactivate", patch(deactivate_student))
}
