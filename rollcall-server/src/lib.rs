//! rollcall-server library interface
//!
//! Attendance tracking service: facial-recognition intake, attendance
//! writes, dashboard statistics and guardian notifications.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use crate::config::ServiceSettings;
use crate::services::recognizer::FaceRecognizer;

/// Room for multipart framing and text fields on top of the image ceiling
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// External face-recognition engine
    pub recognizer: Arc<dyn FaceRecognizer>,
    /// Upload and attendance policy settings
    pub settings: Arc<ServiceSettings>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last background error, reported by /health
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(db: SqlitePool, recognizer: Arc<dyn FaceRecognizer>, settings: ServiceSettings) -> Self {
        Self {
            db,
            recognizer,
            settings: Arc::new(settings),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Record a failure that happened outside a request
    pub async fn record_error(&self, message: impl Into<String>) {
        *self.last_error.write().await = Some(message.into());
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.settings.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .merge(api::student_routes())
        .merge(api::recognition_routes())
        .merge(api::attendance_routes())
        .merge(api::dashboard_routes())
        .merge(api::notification_routes())
        .merge(api::sample_data_routes())
        .merge(api::health_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
