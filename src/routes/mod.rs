pub mod auth;
pub mod content;
pub mod likes;
pub mod notifications;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// The full application router. `test_seed` mounts the seeding endpoint
/// used by end-to-end tests; never enable it in production.
pub fn build_router(state: AppState, test_seed: bool) -> Router {
    let mut app = Router::new()
        .merge(notifications::router())
        .merge(likes::router())
        .merge(content::router())
        .merge(auth::router());

    if test_seed {
        app = app.merge(auth::seed_router());
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}
