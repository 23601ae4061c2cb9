//! Demo data seeding

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use rollcall_common::db::{Class, Role, Student, User};
use serde::Serialize;
use tracing::info;

use crate::db::classes::{self, NewClass};
use crate::db::students::{self, NewStudent};
use crate::db::users::{self, NewUser};
use crate::{ApiError, ApiResult, AppState};

const SAMPLE_TEACHER: &str = "prof.johnson";

/// (code, first name, last name, profile image)
const SAMPLE_STUDENTS: &[(&str, &str, &str, &str)] = &[
    ("STU001", "Alex", "Johnson", "https://images.unsplash.com/photo-1507003211169-0a1dd7228f2d"),
    ("STU002", "Sarah", "Chen", "https://images.unsplash.com/photo-1494790108377-be9c29b29330"),
    ("STU003", "Marcus", "Williams", "https://images.unsplash.com/photo-1472099645785-5658abf4ff4e"),
    ("STU004", "Emma", "Davis", "https://images.unsplash.com/photo-1438761681033-6461ffad8d80"),
    ("STU005", "Michael", "Brown", "https://images.unsplash.com/photo-1500648767791-00dcc994a43e"),
];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleData {
    pub message: String,
    pub teacher: User,
    pub parent: User,
    pub class: Class,
    pub students: Vec<Student>,
}

/// POST /api/init-sample-data
///
/// Seeds one teacher, one parent, a grade 10A mathematics class and five
/// students guarded by the parent. Seeding twice is a conflict. All rows
/// are written in one transaction; a failure leaves nothing behind.
pub async fn init_sample_data(State(state): State<AppState>) -> ApiResult<(StatusCode, Json<SampleData>)> {
    if users::get_user_by_username(&state.db, SAMPLE_TEACHER).await?.is_some() {
        return Err(ApiError::Conflict("Sample data already initialized".to_string()));
    }

    let mut tx = state.db.begin().await.map_err(rollcall_common::Error::from)?;

    let teacher = users::create_user(
        &mut *tx,
        &NewUser {
            username: SAMPLE_TEACHER.to_string(),
            role: Role::Teacher,
            first_name: "John".to_string(),
            last_name: "Johnson".to_string(),
            email: "prof.johnson@school.edu".to_string(),
        },
    )
    .await?;

    let parent = users::create_user(
        &mut *tx,
        &NewUser {
            username: "parent1".to_string(),
            role: Role::Parent,
            first_name: "Mary".to_string(),
            last_name: "Chen".to_string(),
            email: "mary.chen@email.com".to_string(),
        },
    )
    .await?;

    let class = classes::create_class(
        &mut *tx,
        &NewClass {
            name: "Mathematics".to_string(),
            subject: "Mathematics".to_string(),
            teacher_id: teacher.id,
            grade: "10".to_string(),
            section: "A".to_string(),
            schedule: Some(
                serde_json::json!({ "time": "09:00", "days": ["Monday", "Wednesday", "Friday"] })
                    .to_string(),
            ),
        },
    )
    .await?;

    let mut created = Vec::with_capacity(SAMPLE_STUDENTS.len());
    for (code, first_name, last_name, image) in SAMPLE_STUDENTS {
        let student = students::create_student(
            &mut *tx,
            &NewStudent {
                student_code: code.to_string(),
                user_id: None,
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                grade: "10".to_string(),
                section: "A".to_string(),
                parent_id: Some(parent.id),
                profile_image: Some(image.to_string()),
            },
        )
        .await?;
        created.push(student);
    }

    tx.commit().await.map_err(rollcall_common::Error::from)?;

    info!(teacher_id = teacher.id, class_id = class.id, students = created.len(), "Seeded sample data");

    Ok((
        StatusCode::CREATED,
        Json(SampleData {
            message: "Sample data initialized successfully".to_string(),
            teacher,
            parent,
            class,
            students: created,
        }),
    ))
}

pub fn sample_data_routes() -> Router<AppState> {
    Router::new().route("/api/init-sample-data", post(init_sample_data))
}
