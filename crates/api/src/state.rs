use std::sync::Arc;

use hourglass_core::catalog::CatalogIndex;
use hourglass_events::TaskRegistry;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Submitted bakes, their event logs and subscribers.
    pub registry: Arc<TaskRegistry>,
    /// Catalog of finished bakes in the bakes directory.
    pub catalog: Arc<CatalogIndex>,
}
