//! Reconciliation endpoint
//!
//! POST /reconcile takes a partial record and returns the `Reconciliation`.
//! With `?save=true` the finished record is also upserted into the library.

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use shelf_common::BookRecord;
use tracing::{error, info};

use crate::reconcile::{Outcome, Reconciliation};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct ReconcileParams {
    #[serde(default)]
    pub save: bool,
}

/// POST /reconcile
pub async fn reconcile_record(
    State(state): State<AppState>,
    Query(params): Query<ReconcileParams>,
    body: Result<Json<BookRecord>, JsonRejection>,
) -> ApiResult<Json<Reconciliation>> {
    let Json(record) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let mut result = state.reconciler.reconcile(record).await;

    if params.save && result.outcome == Outcome::Completed {
        result.record.processed_at = Some(Utc::now());

        let _guard = state.library_lock.lock().await;
        let store = state.store.clone();
        let record = result.record.clone();
        let saved = tokio::task::spawn_blocking(move || store.upsert([record]))
            .await
            .map_err(|e| ApiError::Internal(format!("Library write task failed: {}", e)))?;

        match saved {
            Ok(_) => {
                info!(id = %result.record.id(), "Reconciled record saved to library");
                *state.last_error.write().await = None;
            }
            Err(e) => {
                error!(error = %e, "Failed to save reconciled record");
                *state.last_error.write().await = Some(e.to_string());
                return Err(e.into());
            }
        }
    }

    Ok(Json(result))
}

/// Build reconciliation routes
pub fn reconcile_routes() -> Router<AppState> {
    Router::new().route("/reconcile", post(reconcile_record))
}
