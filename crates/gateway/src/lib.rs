//! HTTP API gateway for packrat.
//!
//! Thin JSON layer over the engine bundle:
//!
//! - `GET  /health`                        — liveness
//! - `POST /chat`                          — run one turn, return answer + trace
//! - `GET  /conversations/{id}`            — stored conversation
//! - `GET  /memory/{user_id}`              — user facts
//! - `DELETE /memory/{user_id}/{fact_id}`  — forget one fact
//! - `POST /documents/ingest`              — index documents by path
//!
//! Built on Axum; turn failures surface as 500s with the collaborator's
//! error text, ingest problems as 400s.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
};
use packrat_config::PackratConfig;
use packrat_core::error::StoreError;
use packrat_core::message::ConversationId;
use packrat_engine::{EngineBundle, TurnTrace};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub bundle: EngineBundle,
}

type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/chat", post(chat_handler))
        .route("/conversations/{id}", get(get_conversation_handler))
        .route("/memory/{user_id}", get(get_memory_handler))
        .route("/memory/{user_id}/{fact_id}", delete(delete_fact_handler))
        .route("/documents/ingest", post(ingest_handler))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway HTTP server.
pub async fn start(config: PackratConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let bundle = EngineBundle::from_config(&config, "default")?;
    let state = Arc::new(GatewayState { bundle });

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Gateway listening");
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}

fn internal(e: impl std::fmt::Display) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}

#[derive(Deserialize)]
struct ChatRequest {
    conversation_id: String,
    #[serde(default = "default_user_id")]
    user_id: String,
    message: String,
}

fn default_user_id() -> String {
    "default".into()
}

#[derive(Serialize)]
struct ChatResponse {
    answer: String,
    trace: TurnTrace,
}

async fn chat_handler(
    State(state): State<SharedState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, String)> {
    let engine = if req.user_id == "default" {
        state.bundle.engine.clone()
    } else {
        state.bundle.engine_for_user(&req.user_id).map_err(internal)?
    };

    let (answer, trace) = engine
        .handle_turn(&req.conversation_id, &req.message)
        .await
        .map_err(internal)?;

    info!(
        conversation_id = %req.conversation_id,
        trace = %serde_json::to_string(&trace).unwrap_or_default(),
        "chat"
    );
    Ok(Json(ChatResponse { answer, trace }))
}

async fn get_conversation_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let convo = state
        .bundle
        .load_conversation(&ConversationId::from(&id))
        .await
        .map_err(internal)?;

    Ok(Json(serde_json::json!({
        "conversation_id": convo.id.to_string(),
        "messages": convo.messages,
        "settings": {
            "max_context_tokens": convo.max_context_tokens,
            "reserve_output_tokens": convo.reserve_output_tokens,
        },
    })))
}

async fn get_memory_handler(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let mut facts = state
        .bundle
        .memory_store
        .get_facts(&user_id)
        .await
        .map_err(internal)?;

    facts.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.updated_at.cmp(&a.updated_at))
    });

    Ok(Json(serde_json::json!(facts)))
}

async fn delete_fact_handler(
    State(state): State<SharedState>,
    Path((user_id, fact_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let deleted = state
        .bundle
        .memory_store
        .delete_fact(&user_id, &fact_id)
        .await
        .map_err(internal)?;
    Ok(Json(serde_json::json!({ "deleted": deleted })))
}

#[derive(Deserialize)]
struct IngestRequest {
    paths: Vec<String>,
    #[serde(default = "default_replace")]
    replace: bool,
}

fn default_replace() -> bool {
    true
}

async fn ingest_handler(
    State(state): State<SharedState>,
    Json(req): Json<IngestRequest>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    if req.paths.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "no paths given".into()));
    }

    if req.replace {
        for p in &req.paths {
            state
                .bundle
                .rag_store
                .delete_by_source(p)
                .await
                .map_err(internal)?;
        }
    }

    let paths: Vec<PathBuf> = req.paths.iter().map(PathBuf::from).collect();
    let ingested = state
        .bundle
        .indexer
        .ingest_paths(&paths)
        .await
        .map_err(|e| match e {
            StoreError::UnsupportedDocument(_) | StoreError::Storage(_) => {
                (StatusCode::BAD_REQUEST, e.to_string())
            }
            other => internal(other),
        })?;

    let store_size = state.bundle.rag_store.count().await.map_err(internal)?;
    Ok(Json(serde_json::json!({
        "ingested_chunks": ingested,
        "store_size": store_size,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tempfile::TempDir;
    use tower::util::ServiceExt;

    fn router_in(dir: &TempDir) -> Router {
        let mut config = PackratConfig::default();
        config.storage.data_dir = dir.path().join("data").display().to_string();
        config.memory.store_path = dir.path().join("mem.json").display().to_string();
        config.rag.store_path = dir.path().join("rag.json").display().to_string();

        let bundle = EngineBundle::from_config(&config, "default").unwrap();
        build_router(Arc::new(GatewayState { bundle }))
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let dir = TempDir::new().unwrap();
        let response = router_in(&dir)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["ok"], true);
    }

    #[tokio::test]
    async fn chat_roundtrip_returns_answer_and_trace() {
        let dir = TempDir::new().unwrap();
        let request = Request::post("/chat")
            .header("content-type", "application/json")
            .body(Body::from(
                r#"{"conversation_id":"c1","message":"Hello"}"#,
            ))
            .unwrap();

        let response = router_in(&dir).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert!(json["answer"].as_str().unwrap().contains("[mock]"));
        assert_eq!(json["trace"]["conversation_id"], "c1");
    }

    #[tokio::test]
    async fn conversation_endpoint_shows_history() {
        let dir = TempDir::new().unwrap();
        let router = router_in(&dir);

        let request = Request::post("/chat")
            .header("content-type", "application/json")
            .body(Body::from(
                r#"{"conversation_id":"c9","message":"remember me"}"#,
            ))
            .unwrap();
        router.clone().oneshot(request).await.unwrap();

        let response = router
            .oneshot(
                Request::get("/conversations/c9")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["conversation_id"], "c9");
        assert!(json["messages"].as_array().unwrap().len() >= 3);
    }

    #[tokio::test]
    async fn ingest_rejects_empty_paths() {
        let dir = TempDir::new().unwrap();
        let request = Request::post("/documents/ingest")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"paths":[]}"#))
            .unwrap();

        let response = router_in(&dir).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn ingest_then_memory_endpoints() {
        let dir = TempDir::new().unwrap();
        let router = router_in(&dir);

        let doc = dir.path().join("doc.txt");
        std::fs::write(&doc, "France capital is Paris.").unwrap();

        let request = Request::post("/documents/ingest")
            .header("content-type", "application/json")
            .body(Body::from(format!(
                r#"{{"paths":["{}"]}}"#,
                doc.display()
            )))
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert!(json["ingested_chunks"].as_u64().unwrap() > 0);

        let response = router
            .oneshot(Request::get("/memory/nobody").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert!(json.as_array().unwrap().is_empty());
    }
}
