//! The hourglass service router.
//!
//! [`build_app_router`] is shared by `main.rs` and the integration tests so
//! both run behind identical middleware.

use std::time::Duration;

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, Method, StatusCode};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::config::ServerConfig;
use crate::routes;
use crate::state::AppState;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Assemble routes, bake/static file serving and middleware.
///
/// | Path              | Served by                          |
/// |-------------------|------------------------------------|
/// | `/health`         | [`routes::health`]                 |
/// | `/api/*`          | [`routes::api_routes`]             |
/// | `/bakes/*`        | files in `config.bakes_dir`        |
/// | anything else     | files in `config.public_dir`       |
///
/// The timeout only bounds the time to response headers; progress streams
/// keep flowing after that.
pub fn build_app_router(state: AppState, config: &ServerConfig) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);
    let timeout = Duration::from_secs(config.request_timeout_secs);

    let trace = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    with_static_files(Router::new(), config)
        .merge(routes::health::router())
        .nest("/api", routes::api_routes())
        // The last layer added sees the request first.
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout))
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(trace)
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .layer(build_cors_layer(config))
        .with_state(state)
}

fn with_static_files(router: Router<AppState>, config: &ServerConfig) -> Router<AppState> {
    router
        .nest_service("/bakes", ServeDir::new(&config.bakes_dir))
        .fallback_service(ServeDir::new(&config.public_dir))
}

/// CORS for the configured origins. The front end only reads and submits.
///
/// Panics on an unparsable origin so misconfiguration fails at startup.
pub fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<_> = config
        .cors_origins
        .iter()
        .map(|o| {
            o.parse()
                .unwrap_or_else(|e| panic!("Invalid CORS origin '{o}': {e}"))
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(3600))
}
