//! Library and gazetteer lookups

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use shelf_common::BookRecord;

use crate::fusion::resolve_location;
use crate::{ApiError, ApiResult, AppState};

/// GET /books
///
/// Library contents in stored order; an absent library file is an empty list.
pub async fn list_books(State(state): State<AppState>) -> ApiResult<Json<Vec<BookRecord>>> {
    let store = state.store.clone();
    let books = tokio::task::spawn_blocking(move || store.load())
        .await
        .map_err(|e| ApiError::Internal(format!("Library read task failed: {}", e)))??;

    Ok(Json(books))
}

#[derive(Debug, Deserialize)]
pub struct LocateParams {
    pub name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct LocateResponse {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// GET /locate?name=
pub async fn locate(Query(params): Query<LocateParams>) -> ApiResult<Json<LocateResponse>> {
    let name = params
        .name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing 'name' parameter".to_string()))?;

    let (latitude, longitude) = resolve_location(&name);

    Ok(Json(LocateResponse {
        name,
        latitude,
        longitude,
    }))
}

/// Build library routes
pub fn book_routes() -> Router<AppState> {
    Router::new()
        .route("/books", get(list_books))
        .route("/locate", get(locate))
}
