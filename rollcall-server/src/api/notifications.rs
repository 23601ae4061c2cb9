//! Notification endpoints

use axum::{
    extract::State,
    routing::{get, patch},
    Json, Router,
};
use rollcall_common::db::Notification;

use crate::api::extract::ApiPath;
use crate::services::notification_dispatcher;
use crate::{ApiResult, AppState};

/// GET /api/notifications/:id
///
/// `id` is the recipient user; newest first.
pub async fn list_notifications(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<i64>,
) -> ApiResult<Json<Vec<Notification>>> {
    Ok(Json(notification_dispatcher::list_for_user(&state.db, user_id).await?))
}

/// PATCH /api/notifications/:id/read
pub async fn mark_notification_read(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Notification>> {
    Ok(Json(notification_dispatcher::mark_read(&state.db, id).await?))
}

pub fn notification_routes() -> Router<AppState> {
    // Both routes share the `:id` segment name; the router requires it
    Router::new()
        .route("/api/notifications/:id", get(list_notifications))
        .route("/api/notifications/:id/read", patch(mark_notification_read))
}
