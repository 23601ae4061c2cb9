//! Marking-actor extraction
//!
//! The caller identifies itself with a numeric user id in the
//! `X-Rollcall-User` header. No header means an anonymous caller.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use rollcall_common::db::User;

use crate::db::users;
use crate::{ApiError, AppState};

pub const CALLER_HEADER: &str = "x-rollcall-user";

/// The user making the request, if one was named
#[derive(Debug, Clone)]
pub struct Caller(pub Option<User>);

impl Caller {
    pub fn user_id(&self) -> Option<i64> {
        self.0.as_ref().map(|user| user.id)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(CALLER_HEADER) else {
            return Ok(Caller(None));
        };

        let id: i64 = value
            .to_str()
            .ok()
            .and_then(|text| text.trim().parse().ok())
            .ok_or_else(|| ApiError::BadRequest(format!("{} must be a numeric user id", CALLER_HEADER)))?;

        let user = users::get_user(&state.db, id)
            .await?
            .ok_or_else(|| ApiError::BadRequest(format!("Unknown user in {}: {}", CALLER_HEADER, id)))?;

        Ok(Caller(Some(user)))
    }
}
