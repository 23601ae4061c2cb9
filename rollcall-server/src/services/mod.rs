//! Business logic for rollcall-server
//!
//! Handlers in `api` stay thin; everything that decides what gets written
//! lives here.

pub mod attendance_writer;
pub mod enrollment;
pub mod notification_dispatcher;
pub mod recognizer;
pub mod statistics;
pub mod upload;

pub use attendance_writer::{
    mark_manual, mark_recognized, BatchOutcome, ManualMark, MarkedAttendance, RecognitionBatch,
    WriterOptions,
};
pub use notification_dispatcher::{dispatch_recognition_notices, DispatchReport};
pub use recognizer::{
    FaceRecognizer, Recognition, RecognitionOutcome, RecognitionResult, RecognizerError,
    SubprocessRecognizer,
};
pub use upload::{validate_image, TempUpload, UploadError};
