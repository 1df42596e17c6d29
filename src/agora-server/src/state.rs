//! Shared application state handed to every request handler.

use std::sync::Arc;

use agora_core::{RoundOrchestrator, SessionRegistry, Transcriber};

pub struct AppState {
    pub registry: SessionRegistry,
    pub orchestrator: RoundOrchestrator,
    pub transcriber: Arc<dyn Transcriber>,
}
