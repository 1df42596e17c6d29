//! Transcriber fallback behavior against a local stub endpoint.

use axum::Router;
use axum::extract::Multipart;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::post;
use serde_json::json;

use agora_core::{OpenAiTranscriber, Transcriber};

/// Stub `/audio/transcriptions`: fails for the primary model, answers for
/// the fallback.
async fn transcriptions(mut multipart: Multipart) -> Response {
    let mut model = String::new();
    let mut got_file = false;

    while let Some(field) = multipart.next_field().await.unwrap() {
        match field.name() {
            Some("model") => model = field.text().await.unwrap(),
            Some("file") => got_file = !field.bytes().await.unwrap().is_empty(),
            _ => {}
        }
    }

    assert!(got_file, "file part missing");

    if model == "flaky-primary" {
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    } else {
        Json(json!({ "text": "  hello from fallback  " })).into_response()
    }
}

async fn serve_stub() -> String {
    let app = Router::new().route("/audio/transcriptions", post(transcriptions));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_falls_back_to_secondary_engine() {
    let base = serve_stub().await;
    let transcriber = OpenAiTranscriber::with_engines(
        base,
        "test-key",
        vec!["flaky-primary".to_string(), "steady-fallback".to_string()],
    );

    let text = transcriber
        .transcribe(b"RIFF fake wav".to_vec(), "input.wav")
        .await
        .unwrap();
    assert_eq!(text, "hello from fallback");
}

#[tokio::test]
async fn test_reports_failure_when_all_engines_fail() {
    let base = serve_stub().await;
    let transcriber = OpenAiTranscriber::with_engines(
        base,
        "test-key",
        vec!["flaky-primary".to_string(), "flaky-primary".to_string()],
    );

    let err = transcriber
        .transcribe(b"RIFF fake wav".to_vec(), "input.wav")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("all engines failed"));
}
