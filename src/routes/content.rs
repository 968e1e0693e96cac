use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::content::FollowOutcome;
use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::notify::UserId;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts", post(create_post))
        .route("/posts/{id}", delete(delete_post))
        .route("/images/{id}", delete(delete_image))
        .route("/users/{id}", delete(delete_user))
        .route("/users/{id}/follow", post(follow))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewPostRequest {
    content: String,
    #[serde(default)]
    image_count: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewPostResponse {
    id: i64,
    image_ids: Vec<i64>,
}

async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<NewPostRequest>,
) -> AppResult<(StatusCode, Json<NewPostResponse>)> {
    let created = state
        .feed
        .create_post(user.id, &req.content, req.image_count)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(NewPostResponse {
            id: created.post.id,
            image_ids: created.images.iter().map(|image| image.id).collect(),
        }),
    ))
}

async fn delete_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    state.feed.delete_post(id, user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_image(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    state.feed.delete_image(id, user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_user(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    state.feed.delete_user(UserId(id), user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn follow(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<FollowOutcome>> {
    let outcome = state.feed.toggle_follow(user.id, UserId(id)).await?;
    Ok(Json(outcome))
}
