//! Error types for the discussion simulator.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimulationError {
    #[error("Unknown simulation: {0}")]
    SessionNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
