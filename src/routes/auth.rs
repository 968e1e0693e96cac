use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;

use crate::auth::session;
use crate::error::AppResult;
use crate::extractors::SessionToken;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/auth/logout", post(logout))
}

/// Only merged when the test seed flag is set
pub fn seed_router() -> Router<AppState> {
    Router::new().route("/test/seed", post(test_seed))
}

async fn logout(
    State(state): State<AppState>,
    SessionToken(token): SessionToken,
) -> AppResult<Response> {
    if let Some(token) = token {
        session::delete_session(&state.db, &token)?;
    }

    let cookie = format!(
        "{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0",
        state.config.auth.cookie_name
    );
    Ok((StatusCode::NO_CONTENT, [(header::SET_COOKIE, cookie)]).into_response())
}

#[derive(Deserialize)]
struct SeedRequest {
    username: String,
}

/// Create a user plus a session and hand back the session cookie.
async fn test_seed(
    State(state): State<AppState>,
    Json(req): Json<SeedRequest>,
) -> AppResult<Response> {
    let user = state.feed.create_user(&req.username).await?;
    let hours = state.config.auth.session_hours;
    let token = session::create_session(&state.db, user.id, hours)?;
    let cookie = session::session_cookie(&state.config.auth.cookie_name, &token, hours);

    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(user)).into_response())
}
