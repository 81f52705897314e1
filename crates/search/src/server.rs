//! HTTP search API
//!
//! Read-only JSON endpoints over a built index:
//!
//! | Method | Path      | Description                          |
//! |--------|-----------|--------------------------------------|
//! | `GET`  | `/health` | Liveness check                       |
//! | `GET`  | `/stats`  | Index-wide counters                  |
//! | `GET`  | `/search` | Ranked hits for `q`, with `lang`, `limit`, `min_score` |
//!
//! A missing `q` is a 400; any unknown path is a JSON 404. CORS is
//! permissive so browser clients can call the API directly.

use crate::error::Result;
use crate::query::QueryEngine;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    q: Option<String>,
    lang: Option<String>,
    limit: Option<usize>,
    min_score: Option<f64>,
}

/// Build the router over a shared query engine.
pub fn app(engine: Arc<QueryEngine>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/stats", get(handle_stats))
        .route("/search", get(handle_search))
        .fallback(handle_not_found)
        .layer(cors)
        .with_state(engine)
}

/// Bind and serve until the process is terminated.
pub async fn serve(engine: QueryEngine, bind_addr: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(%bind_addr, "search API listening");
    axum::serve(listener, app(Arc::new(engine))).await?;
    Ok(())
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

async fn handle_stats(State(engine): State<Arc<QueryEngine>>) -> Json<serde_json::Value> {
    Json(json!(engine.stats()))
}

pub(crate) async fn handle_search(
    State(engine): State<Arc<QueryEngine>>,
    Query(params): Query<SearchParams>,
) -> Response {
    let query = params.q.as_deref().unwrap_or("").trim();
    if query.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "missing query parameter 'q'"})),
        )
            .into_response();
    }
    let hits = engine.search(
        query,
        params.lang.as_deref(),
        params.limit.unwrap_or(10),
        params.min_score.unwrap_or(0.0),
    );
    Json(json!({"hits": hits, "stats": engine.stats()})).into_response()
}

async fn handle_not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({"error": "not found"}))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use notemill_core::entities::{
        ContentVariant, Extraction, IngestSource, Note, ProcessingJournalEntry, VariantType,
    };
    use notemill_store::NoteStore;

    fn engine_with_note(dir: &std::path::Path) -> Arc<QueryEngine> {
        let store = NoteStore::new(dir).expect("store");
        let source = IngestSource::new("evernote_html", "/exports/x.html");
        let note = Note::new(source.id, "Search me", "en");
        let clean = ContentVariant::new(note.id, VariantType::CleanText, "test")
            .with_content("findable content");
        let extraction = Extraction::new(
            note.id,
            "llm_enhance:v0#m",
            json!({"summary": "findable", "keywords": ["findable"]}),
        );
        let journal = ProcessingJournalEntry::new(Some(note.id), "ingest", "test", "success");
        store
            .save_note_bundle(&source, &note, &[clean], &[extraction], &journal)
            .expect("save");
        Arc::new(
            QueryEngine::open_or_build(NoteStore::new(dir).expect("store"), dir).expect("engine"),
        )
    }

    fn params(q: Option<&str>) -> Query<SearchParams> {
        Query(SearchParams {
            q: q.map(str::to_string),
            lang: None,
            limit: None,
            min_score: None,
        })
    }

    #[tokio::test]
    async fn test_search_returns_hits() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = engine_with_note(dir.path());

        let response = handle_search(State(engine), params(Some("findable"))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let payload: serde_json::Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(payload["hits"][0]["title"], "Search me");
        assert_eq!(payload["stats"]["notes_indexed"], 1);
    }

    #[tokio::test]
    async fn test_missing_query_is_bad_request() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = engine_with_note(dir.path());

        let response = handle_search(State(engine.clone()), params(None)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = handle_search(State(engine), params(Some("  "))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_path_is_json_404() {
        let response = handle_not_found().await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
