//! REST + SSE API surface.
//!
//! One JSON object per streamed event; errors are always JSON payloads,
//! never transport faults.

use std::convert::Infallible;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use agora_core::{Agent, RoundAdvance, SessionStatus, SimulationError};

use crate::state::AppState;

/// JSON error envelope around the core error taxonomy.
pub struct ApiError(SimulationError);

impl From<SimulationError> for ApiError {
    fn from(err: SimulationError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            SimulationError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            SimulationError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            SimulationError::Transcription(_) => StatusCode::BAD_GATEWAY,
            SimulationError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            Json(serde_json::json!({ "error": self.0.to_string() })),
        )
            .into_response()
    }
}

#[derive(Deserialize)]
pub struct StartRequest {
    topic: String,
    #[serde(default = "default_num_agents")]
    num_agents: usize,
    #[serde(default = "default_rounds")]
    rounds: u32,
    #[serde(default = "default_human_participant")]
    human_participant: bool,
}

fn default_num_agents() -> usize {
    4
}

fn default_rounds() -> u32 {
    2
}

fn default_human_participant() -> bool {
    true
}

#[derive(Serialize)]
pub struct StartResponse {
    simulation_id: String,
    agents: Vec<Agent>,
}

async fn start_simulation(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StartRequest>,
) -> Result<Json<StartResponse>, ApiError> {
    let (simulation_id, agents) = state.registry.create(
        &req.topic,
        req.num_agents,
        req.rounds,
        req.human_participant,
    )?;
    Ok(Json(StartResponse {
        simulation_id,
        agents,
    }))
}

/// Stream one round as SSE, or report completed status for a terminal
/// session.
async fn advance_round(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    match state.orchestrator.advance_round(&id)? {
        RoundAdvance::AlreadyComplete(status) => Ok(Json(serde_json::json!({
            "status": "completed",
            "current_round": status.current_round,
            "total_rounds": status.total_rounds,
        }))
        .into_response()),
        RoundAdvance::Events(stream) => {
            let sse = stream.map(|event| {
                let data = serde_json::to_string(&event).unwrap_or_else(|e| {
                    tracing::error!(error = %e, "event serialization failed");
                    r#"{"type":"error","message":"event serialization failed"}"#.to_string()
                });
                Ok::<_, Infallible>(Event::default().data(data))
            });
            Ok(Sse::new(sse).keep_alive(KeepAlive::default()).into_response())
        }
    }
}

/// Accept human input as multipart: a `text` part, an `audio` part, or
/// both (text wins). Audio goes through the transcriber first.
async fn submit_human_input(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut text: Option<String> = None;
    let mut audio: Option<(Vec<u8>, String)> = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        match field.name() {
            Some("text") => {
                text = Some(field.text().await.map_err(bad_multipart)?);
            }
            Some("audio") => {
                let filename = field.file_name().unwrap_or("input.wav").to_string();
                let bytes = field.bytes().await.map_err(bad_multipart)?.to_vec();
                audio = Some((bytes, filename));
            }
            _ => {}
        }
    }

    let resolved = match (text, audio) {
        (Some(t), _) if !t.trim().is_empty() => t,
        (_, Some((bytes, filename))) if !bytes.is_empty() => {
            state.transcriber.transcribe(bytes, &filename).await?
        }
        _ => {
            return Err(SimulationError::InvalidInput(
                "provide a non-empty text or audio part".to_string(),
            )
            .into());
        }
    };

    let accepted = state.orchestrator.submit_human_input(&id, &resolved)?;
    Ok(Json(serde_json::json!({
        "success": true,
        "transcribed_text": accepted,
    })))
}

fn bad_multipart(err: axum::extract::multipart::MultipartError) -> ApiError {
    SimulationError::InvalidInput(format!("malformed multipart body: {}", err)).into()
}

async fn get_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionStatus>, ApiError> {
    Ok(Json(state.registry.status(&id)?))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}

/// Build the router. `cors_origins` lists the allowed frontend origins;
/// an empty list falls back to a permissive layer for local development.
pub fn router(state: Arc<AppState>, cors_origins: &[String]) -> Router {
    let cors = if cors_origins.is_empty() {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            .allow_credentials(true)
    };

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/simulations", post(start_simulation))
        .route("/api/v1/simulations/{id}/advance", get(advance_round))
        .route("/api/v1/simulations/{id}/input", post(submit_human_input))
        .route("/api/v1/simulations/{id}/status", get(get_status))
        .layer(cors)
        .with_state(state)
}
