use axum::extract::{Path, Query, State};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::notify::{Notification, NotificationId};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(list))
        .route("/notifications/unread-count", get(unread_count))
        .route("/notifications/{id}/read", post(mark_read))
        .route("/notifications/{id}", delete(remove))
}

#[derive(Deserialize)]
struct PageParams {
    page: Option<u32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NotificationPage {
    notifications: Vec<Notification>,
    page: u32,
    per_page: u32,
    total: i64,
}

async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(params): Query<PageParams>,
) -> AppResult<Json<NotificationPage>> {
    let page = params.page.unwrap_or(1).max(1);
    let per_page = state.config.notifications.per_page;

    let notifications = state
        .notifications
        .page_for_recipient(user.id, page, per_page)
        .await?;
    let total = state.notifications.count_for_recipient(user.id).await?;

    Ok(Json(NotificationPage {
        notifications,
        page,
        per_page,
        total,
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UnreadCount {
    unread_count: i64,
}

async fn unread_count(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<UnreadCount>> {
    let unread_count = state.notifications.count_unread(user.id).await?;
    Ok(Json(UnreadCount { unread_count }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MarkReadResponse {
    read: bool,
    unread_count: i64,
}

/// Someone else's notification is left untouched but still answers 200
async fn mark_read(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<MarkReadResponse>> {
    let notification = state.notifications.get(NotificationId(id)).await?;
    state.notifications.mark_read(&notification, user.id).await?;

    let unread_count = state.notifications.count_unread(user.id).await?;
    Ok(Json(MarkReadResponse {
        read: true,
        unread_count,
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteResponse {
    remaining_count: i64,
    unread_count: i64,
}

async fn remove(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<DeleteResponse>> {
    let notification = state.notifications.get(NotificationId(id)).await?;
    state.notifications.delete(&notification, user.id).await?;

    let remaining_count = state.notifications.count_for_recipient(user.id).await?;
    let unread_count = state.notifications.count_unread(user.id).await?;
    Ok(Json(DeleteResponse {
        remaining_count,
        unread_count,
    }))
}
