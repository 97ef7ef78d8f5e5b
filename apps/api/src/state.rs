use std::sync::Arc;

use crate::comparison::engine::ComparisonEngine;
use crate::config::Config;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Owns the rating store and the per-project critical sections.
    pub engine: Arc<ComparisonEngine>,
    pub config: Config,
}
