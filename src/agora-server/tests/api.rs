//! End-to-end API tests driving the router directly.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use futures::StreamExt;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use agora_core::{
    GenerateError, MemoryStore, RoundOrchestrator, SessionRegistry, SessionStore, SimulationError,
    SimulatorConfig, TextGenerator, Transcriber,
};
use agora_server::routes;
use agora_server::state::AppState;

#[derive(Default)]
struct CountingGenerator {
    calls: Mutex<u32>,
}

#[async_trait]
impl TextGenerator for CountingGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, GenerateError> {
        let mut calls = self.calls.lock().unwrap();
        *calls += 1;
        Ok(format!("utterance {}", calls))
    }
}

struct StubTranscriber;

#[async_trait]
impl Transcriber for StubTranscriber {
    async fn transcribe(&self, _audio: Vec<u8>, _filename: &str) -> Result<String, SimulationError> {
        Ok("transcribed speech".to_string())
    }
}

fn build_app() -> Router {
    let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::new());
    let config = Arc::new(SimulatorConfig::default());
    let generator = Arc::new(CountingGenerator::default());

    let state = Arc::new(AppState {
        registry: SessionRegistry::new(Arc::clone(&store), Arc::clone(&config)),
        orchestrator: RoundOrchestrator::new(store, generator, None, config),
        transcriber: Arc::new(StubTranscriber),
    });

    routes::router(state, &[])
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn multipart_text(uri: &str, text: &str) -> Request<Body> {
    let boundary = "agora-test-boundary";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"text\"\r\n\r\n{text}\r\n--{b}--\r\n",
        b = boundary,
        text = text
    );
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap()
}

fn sse_events(raw: &str) -> Vec<Value> {
    raw.lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .map(|data| serde_json::from_str(data).unwrap())
        .collect()
}

async fn start(app: &Router, body: Value) -> Value {
    let response = app
        .clone()
        .oneshot(post_json("/api/v1/simulations", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    json_body(response).await
}

#[tokio::test]
async fn test_full_round_without_human() {
    let app = build_app();

    let started = start(
        &app,
        json!({"topic": "X", "num_agents": 3, "rounds": 1, "human_participant": false}),
    )
    .await;
    let id = started["simulation_id"].as_str().unwrap().to_string();
    let agents = started["agents"].as_array().unwrap();
    assert_eq!(agents.len(), 3);
    assert_eq!(agents[0]["name"], "Agent 1");
    assert!(agents[0]["persona"].is_string());

    let response = app
        .clone()
        .oneshot(get(&format!("/api/v1/simulations/{}/advance", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream")
    );

    let raw = response.into_body().collect().await.unwrap().to_bytes();
    let events = sse_events(std::str::from_utf8(&raw).unwrap());
    assert_eq!(events.len(), 7);
    let responses = events.iter().filter(|e| e["type"] == "response").count();
    let thinking = events.iter().filter(|e| e["type"] == "thinking").count();
    assert_eq!(responses, 3);
    assert_eq!(thinking, 3);
    assert_eq!(events.last().unwrap()["type"], "complete");
    assert_eq!(events.last().unwrap()["round"], 1);

    let status = json_body(
        app.clone()
            .oneshot(get(&format!("/api/v1/simulations/{}/status", id)))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status["current_round"], 1);
    assert_eq!(status["total_rounds"], 1);
    assert_eq!(status["utterances_count"], 3);
    assert_eq!(status["awaiting_human"], false);

    // A terminal session yields a completed-status payload, not a stream.
    let response = app
        .clone()
        .oneshot(get(&format!("/api/v1/simulations/{}/advance", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "completed");
    assert_eq!(body["current_round"], 1);
}

#[tokio::test]
async fn test_human_round_over_http() {
    let app = build_app();

    let started = start(
        &app,
        json!({"topic": "X", "num_agents": 2, "rounds": 1, "human_participant": true}),
    )
    .await;
    let id = started["simulation_id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(get(&format!("/api/v1/simulations/{}/advance", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let mut raw = String::new();
    let mut stream = response.into_body().into_data_stream();
    let mut submitted = false;
    while let Some(chunk) = stream.next().await {
        raw.push_str(std::str::from_utf8(&chunk.unwrap()).unwrap());
        if !submitted && raw.contains(r#""type":"human_turn""#) {
            submitted = true;
            let response = app
                .clone()
                .oneshot(multipart_text(
                    &format!("/api/v1/simulations/{}/input", id),
                    "I think retraining matters most",
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let body = json_body(response).await;
            assert_eq!(body["success"], true);
            assert_eq!(body["transcribed_text"], "I think retraining matters most");
        }
    }
    assert!(submitted, "stream never reached the human slot");

    let events = sse_events(&raw);
    assert!(events.iter().any(|e| e["type"] == "human_response"
        && e["text"] == "I think retraining matters most"));
    assert_eq!(events.last().unwrap()["type"], "complete");

    // Two agents plus the human contribution.
    let status = json_body(
        app.clone()
            .oneshot(get(&format!("/api/v1/simulations/{}/status", id)))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status["utterances_count"], 3);
}

#[tokio::test]
async fn test_unknown_simulation_is_json_not_found() {
    let app = build_app();

    let response = app
        .clone()
        .oneshot(get("/api/v1/simulations/42/status"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains("42"));

    let response = app
        .clone()
        .oneshot(get("/api/v1/simulations/42/advance"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_input_rejected_when_not_awaiting() {
    let app = build_app();

    let started = start(
        &app,
        json!({"topic": "X", "num_agents": 2, "rounds": 1, "human_participant": true}),
    )
    .await;
    let id = started["simulation_id"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(multipart_text(
            &format!("/api/v1/simulations/{}/input", id),
            "too early",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains("not awaiting"));
}

#[tokio::test]
async fn test_input_without_text_or_audio_is_rejected() {
    let app = build_app();

    let started = start(&app, json!({"topic": "X"})).await;
    let id = started["simulation_id"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(multipart_text(
            &format!("/api/v1/simulations/{}/input", id),
            "   ",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_start_validates_agent_count() {
    let app = build_app();

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/v1/simulations",
            json!({"topic": "X", "num_agents": 7}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health() {
    let app = build_app();
    let response = app.clone().oneshot(get("/api/v1/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
