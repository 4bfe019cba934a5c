//! shelf-ingest library interface
//!
//! Evidence sources, fusion engine and reconciliation orchestrator, plus the
//! HTTP routes served by the `shelf-ingest` binary.

pub mod api;
pub mod config;
pub mod error;
pub mod fusion;
pub mod reconcile;
pub mod sources;

pub use crate::error::{ApiError, ApiResult, ReconcileError};
pub use crate::reconcile::{reconcile, Reconciler, Reconciliation};

use axum::Router;
use chrono::{DateTime, Utc};
use shelf_common::BookStore;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Orchestrator with the configured sources
    pub reconciler: Arc<Reconciler>,
    /// Library the reconciled records are saved to
    pub store: Arc<BookStore>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last library write failure, reported by /health
    pub last_error: Arc<RwLock<Option<String>>>,
    /// Serializes load-modify-write cycles on the library file
    pub library_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(reconciler: Reconciler, store: BookStore) -> Self {
        Self {
            reconciler: Arc::new(reconciler),
            store: Arc::new(store),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
            library_lock: Arc::new(Mutex::new(())),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::reconcile_routes())
        .merge(api::book_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
