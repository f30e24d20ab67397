pub mod bake;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api` route tree.
///
/// ```text
/// POST   /bake           submit a bake, returns {id}
/// GET    /stream/{id}    replay + live progress as text/event-stream
/// GET    /index          catalog of finished bakes
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().merge(bake::router())
}
