use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};

use crate::engagement::ToggleOutcome;
use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::notify::TargetRef;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts/{id}/like", post(like_post))
        .route("/images/{id}/like", post(like_image))
}

async fn like_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<ToggleOutcome>> {
    toggle(&state, user, TargetRef::post(id)).await
}

async fn like_image(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<ToggleOutcome>> {
    toggle(&state, user, TargetRef::image(id)).await
}

async fn toggle(
    state: &AppState,
    user: CurrentUser,
    target: TargetRef,
) -> AppResult<Json<ToggleOutcome>> {
    let likeable = state.engagement.resolve(target).await?;
    let outcome = state.engagement.toggle(&likeable, user.id).await?;
    Ok(Json(outcome))
}
