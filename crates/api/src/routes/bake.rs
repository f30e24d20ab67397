use axum::routing::{get, post};
use axum::Router;

use crate::handlers::bake;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/bake", post(bake::submit_bake))
        .route("/stream/{id}", get(bake::stream_task))
        .route("/index", get(bake::bake_index))
}
