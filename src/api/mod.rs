//! HTTP surface over the event store.
//!
//! Every handler reads a snapshot and never mutates shared state. None of
//! them returns an error status for pipeline failures.

use crate::analysis::{self, RecentSnapshot, Summary};
use crate::models::Event;
use crate::pipeline::EventStore;
use crate::report::NarrativeReporter;
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// Shared handles passed to every handler.
pub struct AppState {
    pub store: Arc<EventStore>,
    pub reporter: NarrativeReporter,
    /// Number of recent events used for `/summary/recent` and the SITREP.
    pub recent_window: usize,
}

#[derive(Debug, Serialize)]
pub struct EventStream {
    pub events: Vec<Event>,
}

#[derive(Debug, Serialize)]
pub struct Analysis {
    pub analysis: String,
}

/// Build the router with CORS and request tracing.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/events/stream", get(events_stream))
        .route("/summary", get(summary))
        .route("/summary/recent", get(recent_summary))
        .route("/ai/analyze", get(ai_analyze))
        .with_state(state)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        )
}

async fn health() -> Json<Value> {
    Json(json!({ "msg": "threatglobe is running" }))
}

async fn events_stream(State(state): State<Arc<AppState>>) -> Json<EventStream> {
    Json(EventStream {
        events: state.store.snapshot(),
    })
}

async fn summary(State(state): State<Arc<AppState>>) -> Json<Summary> {
    Json(analysis::summarize(&state.store.snapshot()))
}

async fn recent_summary(State(state): State<Arc<AppState>>) -> Json<RecentSnapshot> {
    Json(analysis::recent_window(
        &state.store.snapshot(),
        state.recent_window,
    ))
}

async fn ai_analyze(State(state): State<Arc<AppState>>) -> Json<Analysis> {
    let snapshot = analysis::recent_window(&state.store.snapshot(), state.recent_window);
    Json(Analysis {
        analysis: state.reporter.generate_report(&snapshot).await,
    })
}
