//! `GET /health`: liveness, build stamp and the configured source order

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct SourceStatus {
    pub name: String,
    pub tier: String,
}

#[derive(Debug, Serialize)]
pub struct BuildStamp {
    pub git_hash: &'static str,
    pub built_at: &'static str,
    pub profile: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok", or "degraded" while the last library write has failed
    pub status: &'static str,
    pub module: &'static str,
    pub version: &'static str,
    pub build: BuildStamp,
    pub uptime_seconds: u64,
    /// Priority order
    pub sources: Vec<SourceStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

const BUILD: BuildStamp = BuildStamp {
    git_hash: env!("GIT_HASH"),
    built_at: env!("BUILD_TIMESTAMP"),
    profile: env!("BUILD_PROFILE"),
};

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime_seconds = Utc::now()
        .signed_duration_since(state.startup_time)
        .num_seconds()
        .max(0) as u64;
    let last_error = state.last_error.read().await.clone();

    let sources = state
        .reconciler
        .sources()
        .iter()
        .map(|source| SourceStatus {
            name: source.name().to_string(),
            tier: source.tier().to_string(),
        })
        .collect();

    Json(HealthResponse {
        status: match last_error {
            Some(_) => "degraded",
            None => "ok",
        },
        module: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        build: BUILD,
        uptime_seconds,
        sources,
        last_error,
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
