//! Multipart form reading shared by the upload endpoints

use axum::body::Bytes;
use axum::extract::Multipart;
use std::collections::HashMap;

use crate::services::upload::UploadError;
use crate::{ApiError, ApiResult};

/// Text fields plus at most one file field
#[derive(Debug, Default)]
pub struct UploadForm {
    fields: HashMap<String, String>,
    file: Option<Bytes>,
}

impl UploadForm {
    /// Drain `multipart`, keeping `file_field` as bytes and the rest as text
    ///
    /// A file above `max_bytes` fails immediately with a 413.
    pub async fn read(mut multipart: Multipart, file_field: &str, max_bytes: usize) -> ApiResult<Self> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();

            if name == file_field {
                let bytes = field.bytes().await?;
                if bytes.len() > max_bytes {
                    return Err(UploadError::TooLarge {
                        size: bytes.len(),
                        limit: max_bytes,
                    }
                    .into());
                }
                form.file = Some(bytes);
            } else if !name.is_empty() {
                let value = field.text().await?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }

    /// Trimmed, non-empty text field
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    pub fn require_text(&self, name: &str) -> ApiResult<&str> {
        self.text(name)
            .ok_or_else(|| ApiError::BadRequest(format!("Missing field '{}'", name)))
    }

    pub fn optional_i64(&self, name: &str) -> ApiResult<Option<i64>> {
        self.text(name)
            .map(|value| {
                value
                    .parse()
                    .map_err(|_| ApiError::BadRequest(format!("Field '{}' must be an integer", name)))
            })
            .transpose()
    }

    pub fn require_i64(&self, name: &str) -> ApiResult<i64> {
        self.optional_i64(name)?
            .ok_or_else(|| ApiError::BadRequest(format!("Missing field '{}'", name)))
    }

    pub fn take_file(&mut self) -> Option<Bytes> {
        self.file.take()
    }
}
