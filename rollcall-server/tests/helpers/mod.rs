//! Shared utilities for rollcall-server integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use rollcall_common::db::{init_memory_database, Role, Student};
use rollcall_server::config::ServiceSettings;
use rollcall_server::db::classes::{create_class, NewClass};
use rollcall_server::db::students::{create_student, NewStudent};
use rollcall_server::db::users::{create_user, NewUser};
use rollcall_server::services::recognizer::{
    EnrollmentOutcome, FaceRecognizer, Recognition, RecognitionOutcome, RecognitionResult,
    RecognizerError,
};
use rollcall_server::{build_router, AppState};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tower::ServiceExt;

/// Smallest byte sequence `infer` recognizes as PNG
pub const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D, b'I', b'H', b'D', b'R'];

/// What the stub engine does when asked to recognize
#[derive(Debug, Clone)]
pub enum StubBehavior {
    Match(Vec<(String, f64)>),
    Reject(String),
    Crash,
}

/// Recognizer double that records the image paths it was given
pub struct StubRecognizer {
    behavior: Mutex<StubBehavior>,
    enroll_fails: bool,
    /// (path, existed when called)
    pub seen: Mutex<Vec<(PathBuf, bool)>>,
}

impl StubRecognizer {
    pub fn new(behavior: StubBehavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            enroll_fails: false,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_enrollment() -> Self {
        Self {
            enroll_fails: true,
            ..Self::new(StubBehavior::Match(Vec::new()))
        }
    }

    pub fn set_behavior(&self, behavior: StubBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn seen_paths(&self) -> Vec<(PathBuf, bool)> {
        self.seen.lock().unwrap().clone()
    }

    fn record(&self, image: &Path) {
        self.seen
            .lock()
            .unwrap()
            .push((image.to_path_buf(), image.exists()));
    }
}

#[async_trait]
impl FaceRecognizer for StubRecognizer {
    async fn recognize(&self, image: &Path) -> Result<RecognitionOutcome, RecognizerError> {
        self.record(image);
        let behavior = self.behavior.lock().unwrap().clone();
        match behavior {
            StubBehavior::Match(matches) => {
                let recognitions: Vec<Recognition> = matches
                    .into_iter()
                    .map(|(identity_id, confidence)| Recognition {
                        identity_id,
                        confidence,
                        bounding_box: None,
                    })
                    .collect();
                Ok(RecognitionOutcome::Recognized(RecognitionResult {
                    total_faces: recognitions.len() as u32,
                    recognitions,
                    message: None,
                }))
            }
            StubBehavior::Reject(message) => Ok(RecognitionOutcome::Rejected { message }),
            StubBehavior::Crash => Err(RecognizerError::Exit {
                code: Some(1),
                stderr: "segmentation fault".to_string(),
            }),
        }
    }

    async fn register(&self, image: &Path, identity: &str) -> Result<EnrollmentOutcome, RecognizerError> {
        self.record(image);
        if self.enroll_fails {
            return Ok(EnrollmentOutcome::Rejected {
                message: "No faces detected in image".to_string(),
            });
        }
        Ok(EnrollmentOutcome::Enrolled {
            template: Some(format!("template-{}", identity).into_bytes()),
            message: None,
        })
    }
}

/// Seeded identifiers
#[derive(Debug, Clone)]
pub struct Seed {
    pub teacher_id: i64,
    pub parent_id: i64,
    pub class_id: i64,
    /// S001 and S002 have the parent as guardian, S003 has none
    pub students: Vec<Student>,
}

impl Seed {
    pub fn student(&self, code: &str) -> &Student {
        self.students
            .iter()
            .find(|s| s.student_code == code)
            .unwrap_or_else(|| panic!("no seeded student {}", code))
    }
}

pub struct TestApp {
    pub state: AppState,
    pub recognizer: Arc<StubRecognizer>,
    pub upload_dir: TempDir,
}

impl TestApp {
    pub async fn new(behavior: StubBehavior) -> Self {
        Self::with_recognizer(StubRecognizer::new(behavior), |_| {}).await
    }

    pub async fn with_settings(behavior: StubBehavior, adjust: impl FnOnce(&mut ServiceSettings)) -> Self {
        Self::with_recognizer(StubRecognizer::new(behavior), adjust).await
    }

    pub async fn with_recognizer(recognizer: StubRecognizer, adjust: impl FnOnce(&mut ServiceSettings)) -> Self {
        let db = init_memory_database().await.unwrap();
        let upload_dir = TempDir::new().unwrap();
        let mut settings = ServiceSettings::with_upload_dir(upload_dir.path().join("uploads"));
        adjust(&mut settings);

        let recognizer = Arc::new(recognizer);
        let state = AppState::new(db, recognizer.clone(), settings);

        Self {
            state,
            recognizer,
            upload_dir,
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn json(&self, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// POST a recognition request for `class_id` with a PNG image
    pub async fn submit_photo(&self, class_id: i64, caller: Option<i64>) -> (StatusCode, Value) {
        let (content_type, body) = multipart_body(
            &[("classId", class_id.to_string().as_str())],
            Some(("image", "class.png", PNG_BYTES)),
        );
        let mut request = Request::builder()
            .method("POST")
            .uri("/api/attendance/facial-recognition")
            .header("content-type", content_type);
        if let Some(user_id) = caller {
            request = request.header("x-rollcall-user", user_id.to_string());
        }
        self.send(request.body(Body::from(body)).unwrap()).await
    }

    /// Files currently in the upload directory
    pub fn uploads_on_disk(&self) -> usize {
        match std::fs::read_dir(self.upload_dir.path().join("uploads")) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }

    pub async fn attendance_rows(&self) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM attendance_records")
            .fetch_one(&self.state.db)
            .await
            .unwrap()
    }

    pub async fn notification_rows(&self) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM notifications")
            .fetch_one(&self.state.db)
            .await
            .unwrap()
    }

    /// Teacher, guardian, one grade 10A class and three students
    pub async fn seed(&self) -> Seed {
        let pool = &self.state.db;
        let teacher = create_user(
            pool,
            &NewUser {
                username: "prof.johnson".to_string(),
                role: Role::Teacher,
                first_name: "John".to_string(),
                last_name: "Johnson".to_string(),
                email: "prof.johnson@school.edu".to_string(),
            },
        )
        .await
        .unwrap();
        let parent = create_user(
            pool,
            &NewUser {
                username: "parent1".to_string(),
                role: Role::Parent,
                first_name: "Mary".to_string(),
                last_name: "Chen".to_string(),
                email: "mary.chen@email.com".to_string(),
            },
        )
        .await
        .unwrap();
        let class = create_class(
            pool,
            &NewClass {
                name: "Mathematics".to_string(),
                subject: "Mathematics".to_string(),
                teacher_id: teacher.id,
                grade: "10".to_string(),
                section: "A".to_string(),
                schedule: None,
            },
        )
        .await
        .unwrap();

        let mut students = Vec::new();
        for (code, first, last, guardian) in [
            ("S001", "Alex", "Johnson", Some(parent.id)),
            ("S002", "Sarah", "Chen", Some(parent.id)),
            ("S003", "Marcus", "Williams", None),
        ] {
            students.push(
                create_student(
                    pool,
                    &NewStudent {
                        student_code: code.to_string(),
                        first_name: first.to_string(),
                        last_name: last.to_string(),
                        grade: "10".to_string(),
                        section: "A".to_string(),
                        parent_id: guardian,
                        ..Default::default()
                    },
                )
                .await
                .unwrap(),
            );
        }

        Seed {
            teacher_id: teacher.id,
            parent_id: parent.id,
            class_id: class.id,
            students,
        }
    }
}

/// Build a multipart/form-data body; returns (content type, body)
pub fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &str, &[u8])>) -> (String, Vec<u8>) {
    let boundary = "rollcall-test-boundary";
    let mut body = Vec::new();

    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                boundary, name, value
            )
            .as_bytes(),
        );
    }

    if let Some((name, filename, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                boundary, name, filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());

    (format!("multipart/form-data; boundary={}", boundary), body)
}
