//! HTTP API handlers for rollcall-server

pub mod attendance;
pub mod caller;
pub mod dashboard;
pub mod extract;
pub mod health;
pub mod multipart;
pub mod notifications;
pub mod recognition;
pub mod sample_data;
pub mod students;

pub use attendance::attendance_routes;
pub use caller::{Caller, CALLER_HEADER};
pub use dashboard::dashboard_routes;
pub use extract::{ApiJson, ApiMultipart, ApiPath};
pub use health::health_routes;
pub use notifications::notification_routes;
pub use recognition::{recognition_routes, RecognitionResponse};
pub use sample_data::sample_data_routes;
pub use students::student_routes;
