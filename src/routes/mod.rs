//! Router assembly: HTTP endpoints, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;

/// Build the application router with:
/// - JSON API under `/api/v1/...`
/// - CORS (allow any origin/method/headers), adjust for production if needed
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/focus", get(http::http_get_focus))
        .route("/api/v1/batches", post(http::http_post_batch).get(http::http_list_batches))
        .route("/api/v1/batches/vocabulary-list", post(http::http_post_vocabulary_list))
        .route("/api/v1/batches/grammar-list", post(http::http_post_grammar_list))
        .route("/api/v1/batches/:id", get(http::http_get_batch))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::bank::ExampleBanks;
    use crate::config::Prompts;
    use crate::domain::VocabularyEntry;
    use crate::llm::testing::ScriptedLlm;
    use crate::llm::MISSING_KEY_MESSAGE;

    const STAGE1: &str = r#"{"questions": [{"Item Number": "1", "Assessment Focus": "Past Simple", "Complete Sentence": "She went to the store.", "Correct Answer": "went"}]}"#;
    const STAGE2: &str = r#"{"candidates": [{"Item Number": "1", "Candidate A": "go", "Candidate B": "going", "Candidate C": "goes"}]}"#;
    const STAGE3: &str = r#"{"validated": [{"Item Number": "1", "Selected Distractor A": "go", "Selected Distractor B": "going", "Selected Distractor C": "goes"}]}"#;

    fn state_with(replies: &[&str], vocabulary: Vec<VocabularyEntry>) -> Arc<AppState> {
        let llm = Arc::new(ScriptedLlm::new(replies.iter().copied()));
        Arc::new(AppState::with_llm(llm, Prompts::default(), vocabulary, ExampleBanks::default()))
    }

    async fn call(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let req = Request::builder().method(method).uri(uri);
        let req = match body {
            Some(b) => req.header("content-type", "application/json").body(Body::from(b.to_string())),
            None => req.body(Body::empty()),
        }
        .unwrap();
        let res = app.oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    #[tokio::test]
    async fn health_and_focus() {
        let state = state_with(&[], Vec::new());
        let (status, body) = call(build_router(state.clone()), "GET", "/api/v1/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);

        let (status, body) = call(build_router(state), "GET", "/api/v1/focus?type=Grammar&cefr=B1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!body["focus"].as_array().unwrap().is_empty());
        assert_eq!(body["semantic_domains"].as_array().unwrap().len(), 12);
    }

    #[tokio::test]
    async fn sequential_batch_is_served_and_stored() {
        let state = state_with(&[STAGE1, STAGE2, STAGE3], Vec::new());
        let req = json!({"type": "Grammar", "cefr": "B1", "count": 1, "focus": ["Past Simple"]});
        let (status, body) = call(build_router(state.clone()), "POST", "/api/v1/batches", Some(req)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["mode"], "sequential_grammar");
        assert_eq!(body["questions"][0]["Question Prompt"], "She ____ to the store.");
        assert_eq!(body["questions"][0]["Correct Answer"], "A");

        let id = body["id"].as_str().unwrap().to_string();
        let (status, fetched) = call(build_router(state.clone()), "GET", &format!("/api/v1/batches/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["questions"], body["questions"]);

        let (_, list) = call(build_router(state), "GET", "/api/v1/batches", None).await;
        assert_eq!(list["batches"][0]["id"], id.as_str());
        assert_eq!(list["batches"][0]["assembled"], 1);
    }

    #[tokio::test]
    async fn pipeline_failure_is_bad_gateway_and_not_stored() {
        let state = state_with(&[MISSING_KEY_MESSAGE], Vec::new());
        let req = json!({"type": "Vocabulary", "cefr": "A2", "count": 2, "focus": ["Food"]});
        let (status, body) = call(build_router(state.clone()), "POST", "/api/v1/batches", Some(req)).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], format!("Stage 1 failed: {}", MISSING_KEY_MESSAGE));
        assert!(state.list_batches().await.is_empty());
    }

    #[tokio::test]
    async fn planning_errors_are_bad_requests() {
        let state = state_with(&[], Vec::new());
        let req = json!({"type": "Grammar", "cefr": "B1", "count": 3, "focus": []});
        let (status, _) = call(build_router(state.clone()), "POST", "/api/v1/batches", Some(req)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let req = json!({"type": "Grammar", "cefr": "B1", "count": 51, "focus": ["Past Simple"]});
        let (status, body) = call(build_router(state.clone()), "POST", "/api/v1/batches", Some(req)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Batch of 51 questions exceeds the limit of 50");

        let req = json!({"type": "Grammar", "cefr": "B1", "count": usize::MAX, "focus": ["Past Simple"]});
        let (status, _) = call(build_router(state.clone()), "POST", "/api/v1/batches", Some(req)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let req = json!({"cefr": "B1", "selection": {"first_n": 5}});
        let (status, body) = call(build_router(state.clone()), "POST", "/api/v1/batches/vocabulary-list", Some(req)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("no vocabulary table"));

        let req = json!({"cefr": "B1", "items": [{"Base Grammar Item": "  "}]});
        let (status, _) = call(build_router(state), "POST", "/api/v1/batches/grammar-list", Some(req)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn vocabulary_list_uses_loaded_table() {
        let table = vec![
            VocabularyEntry { concept_id: "C-1".into(), base_vocabulary_item: "borrow".into(), part_of_speech: "verb".into(), definition: "take for a while".into() },
            VocabularyEntry { concept_id: "C-2".into(), base_vocabulary_item: "lend".into(), part_of_speech: "verb".into(), definition: String::new() },
        ];
        let stage1 = r#"[{"Item Number": "1", "Complete Sentence": "Can I borrow your pen?", "Correct Answer": "borrow"}]"#;
        let stage2 = r#"[{"Item Number": "1", "Candidate A": "lend", "Candidate B": "keep", "Candidate C": "give"}]"#;
        let stage3 = r#"[{"Item Number": "1", "Selected Distractor A": "lend", "Selected Distractor B": "keep", "Selected Distractor C": "give"}]"#;
        let state = state_with(&[stage1, stage2, stage3], table);

        let req = json!({"cefr": "B1", "selection": {"concept_range": {"start": "C-1", "end": "C-1"}}});
        let (status, body) = call(build_router(state), "POST", "/api/v1/batches/vocabulary-list", Some(req)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["requested"], 1);
        assert_eq!(body["questions"][0]["ConceptID"], "C-1");
        assert_eq!(body["questions"][0]["Base Vocabulary Item"], "borrow");
        assert_eq!(body["questions"][0]["Question Prompt"], "Can I ____ your pen?");
    }

    #[tokio::test]
    async fn unknown_batch_is_not_found() {
        let state = state_with(&[], Vec::new());
        let (status, body) = call(build_router(state), "GET", "/api/v1/batches/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Not found: batch nope");
    }
}
