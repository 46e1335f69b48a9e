//! Plain-text HTTP API over the ledger.

pub mod body;
pub mod error;
pub mod routes;

use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::ledger::Ledger;

/// State shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<Ledger>,
}

pub fn create_router(state: AppState) -> Router {
    routes::routes()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
