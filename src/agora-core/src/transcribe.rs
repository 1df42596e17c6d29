//! Speech-to-text collaborator.
//!
//! Tries a configured engine list in order; the round is never affected by
//! a transcription failure since the human turn only resolves once text
//! actually arrives.

use async_trait::async_trait;

use crate::error::SimulationError;

/// Narrow contract: audio bytes in, transcribed text out.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: Vec<u8>, filename: &str) -> Result<String, SimulationError>;
}

/// Default engine order: primary first, fallback second.
pub const DEFAULT_ENGINES: [&str; 2] = ["gpt-4o-mini-transcribe", "whisper-1"];

#[derive(serde::Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Transcriber backed by an OpenAI-compatible `/audio/transcriptions`
/// endpoint, with a primary/fallback model order.
pub struct OpenAiTranscriber {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    engines: Vec<String>,
}

impl OpenAiTranscriber {
    pub fn new(api_base: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::with_engines(
            api_base,
            api_key,
            DEFAULT_ENGINES.iter().map(|e| e.to_string()).collect(),
        )
    }

    pub fn with_engines(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        engines: Vec<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into(),
            api_key: api_key.into(),
            engines,
        }
    }

    async fn transcribe_with(
        &self,
        engine: &str,
        audio: Vec<u8>,
        filename: &str,
    ) -> Result<String, String> {
        let part = reqwest::multipart::Part::bytes(audio)
            .file_name(filename.to_string())
            .mime_str("application/octet-stream")
            .map_err(|e| e.to_string())?;

        let form = reqwest::multipart::Form::new()
            .text("model", engine.to_string())
            .part("file", part);

        let response = self
            .http
            .post(format!("{}/audio/transcriptions", self.api_base))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("{} returned {}", engine, response.status()));
        }

        let body: TranscriptionResponse = response.json().await.map_err(|e| e.to_string())?;
        let text = body.text.trim().to_string();
        if text.is_empty() {
            return Err(format!("{} returned empty text", engine));
        }
        Ok(text)
    }
}

#[async_trait]
impl Transcriber for OpenAiTranscriber {
    async fn transcribe(&self, audio: Vec<u8>, filename: &str) -> Result<String, SimulationError> {
        let mut failures = Vec::new();

        for engine in &self.engines {
            match self.transcribe_with(engine, audio.clone(), filename).await {
                Ok(text) => {
                    tracing::debug!(engine = %engine, "transcription succeeded");
                    return Ok(text);
                }
                Err(e) => {
                    tracing::warn!(engine = %engine, error = %e, "transcription engine failed");
                    failures.push(format!("{}: {}", engine, e));
                }
            }
        }

        Err(SimulationError::Transcription(format!(
            "all engines failed ({})",
            failures.join("; ")
        )))
    }
}
