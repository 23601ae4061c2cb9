//! External face-recognition engine adapter
//!
//! The engine is a separate executable invoked as
//! `<program> [args...] recognize <image>` or
//! `<program> [args...] register <image> <identity>`.
//! It must print exactly one JSON document on stdout; stderr is diagnostics.
//! Exit code 0 means the document is authoritative, anything else is an
//! infrastructure failure.

use async_trait::async_trait;
use rollcall_common::config::RecognizerConfig;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Longest stderr excerpt carried in an error
const STDERR_TAIL_CHARS: usize = 512;

/// Recognizer infrastructure errors
///
/// These are distinct from an engine that ran and reported failure, which is
/// [`RecognitionOutcome::Rejected`].
#[derive(Debug, Error)]
pub enum RecognizerError {
    /// Executable could not be started or awaited
    #[error("Failed to launch recognizer: {0}")]
    Launch(#[source] std::io::Error),

    /// Engine exited non-zero
    #[error("Recognizer exited with {}: {stderr}", exit_label(.code))]
    Exit { code: Option<i32>, stderr: String },

    /// Engine did not finish in time and was killed
    #[error("Recognizer timed out after {0:?}")]
    Timeout(Duration),

    /// Output was not a single well-formed result document
    #[error("Malformed recognizer output: {0}")]
    Malformed(String),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "a signal".to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

/// One candidate identity match
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recognition {
    /// Engine identity, normalized to text
    pub identity_id: String,
    /// Percentage in [0, 100]
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
}

/// Successful recognition run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionResult {
    pub recognitions: Vec<Recognition>,
    pub total_faces: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionOutcome {
    Recognized(RecognitionResult),
    /// Engine ran and reported `success: false` (e.g. no faces found)
    Rejected { message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnrollmentOutcome {
    Enrolled {
        /// Opaque template bytes, if the engine returned one
        template: Option<Vec<u8>>,
        message: Option<String>,
    },
    Rejected { message: String },
}

/// Face recognition engine seam
#[async_trait]
pub trait FaceRecognizer: Send + Sync {
    /// Match the faces in `image` against enrolled identities
    async fn recognize(&self, image: &Path) -> Result<RecognitionOutcome, RecognizerError>;

    /// Enroll the face in `image` under `identity`
    async fn register(&self, image: &Path, identity: &str)
        -> Result<EnrollmentOutcome, RecognizerError>;
}

/// Identity ids arrive as strings or integers depending on the engine
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IdentityValue {
    Text(String),
    Number(i64),
}

impl IdentityValue {
    fn normalize(self) -> String {
        match self {
            IdentityValue::Text(text) => text.trim().to_string(),
            IdentityValue::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EngineRecognition {
    #[serde(alias = "studentId")]
    identity_id: IdentityValue,
    confidence: f64,
    #[serde(default)]
    bounding_box: Option<BoundingBox>,
}

/// Raw engine document for both modes
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EngineReport {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    recognitions: Vec<EngineRecognition>,
    #[serde(default, alias = "totalFacesDetected")]
    total_faces: Option<u32>,
    #[serde(default)]
    template: Option<serde_json::Value>,
    #[serde(default)]
    encodings: Option<serde_json::Value>,
}

impl EngineReport {
    fn parse(stdout: &[u8]) -> Result<Self, RecognizerError> {
        serde_json::from_slice(stdout).map_err(|e| {
            RecognizerError::Malformed(format!(
                "{} (stdout: {:?})",
                e,
                tail(&String::from_utf8_lossy(stdout), 120)
            ))
        })
    }

    fn failure_message(&mut self) -> String {
        self.error
            .take()
            .or_else(|| self.message.take())
            .unwrap_or_else(|| "Recognizer reported failure".to_string())
    }

    fn into_recognition(mut self) -> Result<RecognitionOutcome, RecognizerError> {
        if !self.success {
            return Ok(RecognitionOutcome::Rejected {
                message: self.failure_message(),
            });
        }

        let recognitions = self
            .recognitions
            .into_iter()
            .map(|raw| {
                if !raw.confidence.is_finite() || !(0.0..=100.0).contains(&raw.confidence) {
                    return Err(RecognizerError::Malformed(format!(
                        "confidence {} outside 0-100",
                        raw.confidence
                    )));
                }
                Ok(Recognition {
                    identity_id: raw.identity_id.normalize(),
                    confidence: raw.confidence,
                    bounding_box: raw.bounding_box,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let total_faces = self
            .total_faces
            .unwrap_or(recognitions.len() as u32);

        Ok(RecognitionOutcome::Recognized(RecognitionResult {
            recognitions,
            total_faces,
            message: self.message,
        }))
    }

    fn into_enrollment(mut self) -> Result<EnrollmentOutcome, RecognizerError> {
        if !self.success {
            return Ok(EnrollmentOutcome::Rejected {
                message: self.failure_message(),
            });
        }

        let template = match self.template.take().or_else(|| self.encodings.take()) {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(text)) => Some(text.into_bytes()),
            Some(other) => Some(
                serde_json::to_vec(&other).map_err(|e| RecognizerError::Malformed(e.to_string()))?,
            ),
        };

        Ok(EnrollmentOutcome::Enrolled {
            template,
            message: self.message,
        })
    }
}

/// Last `max_chars` characters of `text`, trimmed
fn tail(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    match text.char_indices().rev().nth(max_chars.saturating_sub(1)) {
        Some((start, _)) if start > 0 => format!("...{}", &text[start..]),
        _ => text.to_string(),
    }
}

/// Runs the engine as a child process per request
#[derive(Debug, Clone)]
pub struct SubprocessRecognizer {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl SubprocessRecognizer {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    pub fn from_config(config: &RecognizerConfig) -> Self {
        Self::new(
            config.program.clone(),
            config.args.clone(),
            Duration::from_millis(config.timeout_ms),
        )
    }

    /// Run the engine with the mode arguments appended, returning stdout
    async fn run(&self, mode_args: &[&OsStr]) -> Result<Vec<u8>, RecognizerError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .args(mode_args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(program = %self.program, args = ?mode_args, "Invoking recognizer");

        let child = command.spawn().map_err(RecognizerError::Launch)?;

        // Dropping the wait future on timeout drops the child, which kills it
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(RecognizerError::Launch)?,
            Err(_) => {
                tracing::warn!(program = %self.program, timeout = ?self.timeout, "Recognizer timed out");
                return Err(RecognizerError::Timeout(self.timeout));
            }
        };

        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            return Err(RecognizerError::Exit {
                code: output.status.code(),
                stderr: tail(&stderr, STDERR_TAIL_CHARS),
            });
        }

        if !stderr.trim().is_empty() {
            tracing::debug!(stderr = %tail(&stderr, STDERR_TAIL_CHARS), "Recognizer diagnostics");
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl FaceRecognizer for SubprocessRecognizer {
    async fn recognize(&self, image: &Path) -> Result<RecognitionOutcome, RecognizerError> {
        let stdout = self.run(&[OsStr::new("recognize"), image.as_os_str()]).await?;
        EngineReport::parse(&stdout)?.into_recognition()
    }

    async fn register(
        &self,
        image: &Path,
        identity: &str,
    ) -> Result<EnrollmentOutcome, RecognizerError> {
        let stdout = self
            .run(&[OsStr::new("register"), image.as_os_str(), OsStr::new(identity)])
            .await?;
        EngineReport::parse(&stdout)?.into_enrollment()
    }
}
